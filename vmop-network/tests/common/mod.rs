//! Shared fixture for vmop-network integration tests.
//!
//! Wires a reconciler to in-memory collaborators and simulates the external
//! network operators by writing object statuses directly.

#![allow(dead_code)]

use std::sync::{Arc, Once};
use std::time::Duration;

use vmop_network::clients::{MemoryInventory, MemoryStore, Portgroup};
use vmop_network::resources::{
    Condition, ConditionStatus, IpFamily, NetOpIpConfig, NetworkInterface, ObjectKey,
    VirtualNetworkInterface, VirtualNetworkInterfaceIp, VirtualNetworkInterfaceProviderStatus,
};
use vmop_network::{
    BackendClients, ClusterRef, InterfaceReconciler, ManagedObjectRef, NetworkEnvironment,
    ReconcilerConfig, VmContext,
};

pub const NAMESPACE: &str = "test-ns";
pub const VM_NAME: &str = "test-vm";
pub const VM_UID: &str = "3c3f0c5e-test-vm-uid";

pub const NAMED_NETWORK: &str = "DC0_DVPG0";
pub const PORTGROUP_ID: &str = "dvportgroup-11";
pub const CLUSTER_ID: &str = "domain-c1";
pub const LOGICAL_SWITCH_UUID: &str = "nsxt-dummy-ls-uuid";

pub const VDS_NETWORK: &str = "my-vds-network";
pub const NCP_NETWORK: &str = "my-ncp-network";

pub const MAC_ADDRESS: &str = "01-23-45-67-89-AB-CD-EF";
pub const INTERFACE_ID: &str = "my-interface-id";

pub const RETRY_TIMEOUT: Duration = Duration::from_secs(1);

static TRACING: Once = Once::new();

pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "vmop_network=debug".into()),
            )
            .with_test_writer()
            .try_init();
    });
}

pub struct Fixture {
    pub inventory: Arc<MemoryInventory>,
    pub network_interfaces: Arc<MemoryStore<NetworkInterface>>,
    pub virtual_network_interfaces: Arc<MemoryStore<VirtualNetworkInterface>>,
    pub vm: VmContext,
    pub cluster: ClusterRef,
}

impl Fixture {
    /// Inventory with one cluster holding a single portgroup that backs the
    /// NSX-T logical switch.
    pub async fn new() -> Self {
        init_tracing();

        let cluster = ClusterRef::new(ManagedObjectRef::CLUSTER, CLUSTER_ID);
        let inventory = MemoryInventory::new();
        inventory
            .add_portgroup(
                &cluster,
                Portgroup {
                    reference: ManagedObjectRef::portgroup(PORTGROUP_ID),
                    name: NAMED_NETWORK.to_string(),
                    logical_switch_uuid: Some(LOGICAL_SWITCH_UUID.to_string()),
                },
            )
            .await;

        Self {
            inventory: Arc::new(inventory),
            network_interfaces: Arc::new(MemoryStore::new()),
            virtual_network_interfaces: Arc::new(MemoryStore::new()),
            vm: VmContext::new(NAMESPACE, VM_NAME).with_uid(VM_UID),
            cluster,
        }
    }

    pub fn clients(&self) -> BackendClients {
        BackendClients {
            inventory: self.inventory.clone(),
            network_interfaces: self.network_interfaces.clone(),
            virtual_network_interfaces: self.virtual_network_interfaces.clone(),
        }
    }

    /// Reconciler with a short retry timeout.
    pub fn reconciler(&self, environment: NetworkEnvironment) -> InterfaceReconciler {
        self.reconciler_with_timeout(environment, RETRY_TIMEOUT)
    }

    pub fn reconciler_with_timeout(
        &self,
        environment: NetworkEnvironment,
        timeout: Duration,
    ) -> InterfaceReconciler {
        let config = ReconcilerConfig::new(environment).with_retry_timeout(timeout);
        InterfaceReconciler::new(config, self.clients())
    }

    pub fn key(&self, name: &str) -> ObjectKey {
        ObjectKey::new(NAMESPACE, name)
    }

    /// Acts as net-operator: marks a `NetworkInterface` ready with a
    /// dual-stack address assignment on the portgroup.
    pub async fn provision_network_interface(&self, name: &str) -> NetworkInterface {
        self.network_interfaces
            .update_status(&self.key(name), |netif| {
                netif.status.conditions = vec![Condition::ready(ConditionStatus::True)];
                netif.status.mac_address = MAC_ADDRESS.to_string();
                netif.status.external_id = INTERFACE_ID.to_string();
                netif.status.network_id = PORTGROUP_ID.to_string();
                netif.status.ip_configs = vec![
                    NetOpIpConfig {
                        ip: "192.168.1.110".to_string(),
                        ip_family: Some(IpFamily::Ipv4),
                        gateway: "192.168.1.1".to_string(),
                        subnet_mask: "255.255.255.0".to_string(),
                    },
                    NetOpIpConfig {
                        ip: "fd1a:6c85:79fe:7c98:0000:0000:0000:000f".to_string(),
                        ip_family: Some(IpFamily::Ipv6),
                        gateway: "fd1a:6c85:79fe:7c98:0000:0000:0000:0001".to_string(),
                        subnet_mask: "ffff:ffff:ffff:ff00:0000:0000:0000:0000".to_string(),
                    },
                ];
            })
            .await
            .unwrap()
    }

    /// Acts as NCP: marks a `VirtualNetworkInterface` ready on the logical
    /// switch.
    pub async fn provision_virtual_network_interface(&self, name: &str) -> VirtualNetworkInterface {
        self.virtual_network_interfaces
            .update_status(&self.key(name), |vnetif| {
                vnetif.status.conditions = vec![Condition::ready(ConditionStatus::True)];
                vnetif.status.mac_address = MAC_ADDRESS.to_string();
                vnetif.status.interface_id = INTERFACE_ID.to_string();
                vnetif.status.provider_status = Some(VirtualNetworkInterfaceProviderStatus {
                    nsx_logical_switch_id: LOGICAL_SWITCH_UUID.to_string(),
                });
                vnetif.status.ip_addresses = vec![VirtualNetworkInterfaceIp {
                    ip: "192.168.1.110".to_string(),
                    gateway: "192.168.1.1".to_string(),
                    subnet_mask: "255.255.255.0".to_string(),
                }];
            })
            .await
            .unwrap()
    }
}
