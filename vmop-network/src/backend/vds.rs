//! VDS backend - interfaces are provisioned by net-operator through
//! `NetworkInterface` objects.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::warn;

use super::{fetch, get_or_create, NetworkBackend, RequestRef};
use crate::cidr;
use crate::clients::{Inventory, ObjectStore};
use crate::error::{NetworkError, Result};
use crate::naming::{candidates, netop_name};
use crate::resources::{
    ready_state, BackendObject, NetworkInterface, NetworkInterfaceSpec, NetworkInterfaceType,
    ObjectMeta, ReadyState,
};
use crate::types::{Backing, ClusterRef, DesiredInterfaceSpec, NetworkInterfaceResult, VmContext};
use crate::waiter::Readiness;

/// Backend for VDS networking.
pub struct VdsBackend {
    store: Arc<dyn ObjectStore<NetworkInterface>>,
    inventory: Arc<dyn Inventory>,
}

impl VdsBackend {
    pub fn new(store: Arc<dyn ObjectStore<NetworkInterface>>, inventory: Arc<dyn Inventory>) -> Self {
        Self { store, inventory }
    }
}

/// Projects a `NetworkInterface` status into a result.
///
/// Pending until the `Ready` condition is `True`. The backing is left unset.
pub fn extract_result(
    interface: &str,
    netif: &NetworkInterface,
) -> Result<Readiness<NetworkInterfaceResult>> {
    if let ReadyState::Pending(reason) = ready_state(&netif.status.conditions) {
        return Ok(Readiness::Pending(reason));
    }

    let status = &netif.status;
    let ip_configs = status
        .ip_configs
        .iter()
        .map(|ip| cidr::normalize(&ip.ip, &ip.subnet_mask, &ip.gateway, ip.ip_family))
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| NetworkError::invalid_address(interface, e))?;

    Ok(Readiness::Ready(NetworkInterfaceResult {
        mac_address: status.mac_address.clone(),
        external_id: status.external_id.clone(),
        network_id: status.network_id.clone(),
        ip_configs,
        ..Default::default()
    }))
}

#[async_trait]
impl NetworkBackend for VdsBackend {
    async fn resolve(&self, vm: &VmContext, spec: &DesiredInterfaceSpec) -> Result<RequestRef> {
        let network = spec.network.name.as_str();
        let (generation, netif) = get_or_create(
            self.store.as_ref(),
            &spec.name,
            &vm.namespace,
            candidates(netop_name, &vm.name, network, &spec.name),
            |name| NetworkInterface {
                metadata: ObjectMeta::owned_by(vm, name),
                spec: NetworkInterfaceSpec {
                    network_name: network.to_string(),
                    type_: NetworkInterfaceType::Vmxnet3,
                },
                ..Default::default()
            },
        )
        .await?;

        if netif.spec.network_name != network {
            warn!(
                interface = %spec.name,
                object = %netif.key(),
                ?generation,
                existing = %netif.spec.network_name,
                desired = network,
                "NetworkInterface references a different network; leaving it unchanged"
            );
        }

        Ok(RequestRef::Object(netif.key()))
    }

    async fn check_ready(
        &self,
        spec: &DesiredInterfaceSpec,
        request: &RequestRef,
    ) -> Result<Readiness<NetworkInterfaceResult>> {
        match fetch(self.store.as_ref(), &spec.name, request).await? {
            Ok(netif) => extract_result(&spec.name, &netif),
            Err(reason) => Ok(Readiness::Pending(reason)),
        }
    }

    async fn resolve_backing(
        &self,
        interface: &str,
        result: &NetworkInterfaceResult,
        _cluster: Option<&ClusterRef>,
    ) -> Result<Option<Backing>> {
        if result.network_id.is_empty() {
            return Err(NetworkError::backing(
                interface,
                "NetworkInterface is ready but reports no network ID",
            ));
        }

        let backing = self
            .inventory
            .network_by_id(&result.network_id)
            .await
            .map_err(|e| NetworkError::inventory(interface, e))?
            .ok_or_else(|| {
                NetworkError::backing(
                    interface,
                    format!("no portgroup with ID {:?}", result.network_id),
                )
            })?;
        Ok(Some(backing))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::{MemoryInventory, MemoryStore};
    use crate::resources::{Condition, ConditionStatus, IpFamily, NetOpIpConfig, ObjectKey};
    use crate::types::ManagedObjectRef;

    fn ready_netif() -> NetworkInterface {
        let mut netif = NetworkInterface::default();
        netif.status.network_id = "dvportgroup-11".to_string();
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
        netif.status.conditions = vec![Condition::ready(ConditionStatus::True)];
        netif
    }

    #[test]
    fn test_extract_keeps_reported_order() {
        let result = match extract_result("eth0", &ready_netif()).unwrap() {
            Readiness::Ready(result) => result,
            Readiness::Pending(reason) => panic!("not ready: {reason}"),
        };
        assert_eq!(result.network_id, "dvportgroup-11");
        assert!(result.mac_address.is_empty());
        assert!(result.backing.is_none());
        assert_eq!(result.ip_configs.len(), 2);
        assert_eq!(result.ip_configs[0].ip_cidr, "192.168.1.110/24");
        assert!(result.ip_configs[0].is_ipv4);
        assert_eq!(result.ip_configs[1].ip_cidr, "fd1a:6c85:79fe:7c98::f/56");
        assert!(!result.ip_configs[1].is_ipv4);
    }

    #[test]
    fn test_extract_pending_until_ready_true() {
        let mut netif = ready_netif();
        netif.status.conditions =
            vec![Condition::ready(ConditionStatus::False).with_reason("PortAllocationFailed")];
        assert_eq!(
            extract_result("eth0", &netif).unwrap(),
            Readiness::Pending("PortAllocationFailed".to_string())
        );
    }

    #[test]
    fn test_extract_rejects_bad_mask() {
        let mut netif = ready_netif();
        netif.status.ip_configs[0].subnet_mask = "255.0.255.0".to_string();
        let err = extract_result("eth0", &netif).unwrap_err();
        assert!(matches!(err, NetworkError::InvalidAddress { .. }));
        assert_eq!(err.interface(), "eth0");
    }

    #[tokio::test]
    async fn test_resolve_creates_vmxnet3_object_owned_by_vm() {
        let store = Arc::new(MemoryStore::<NetworkInterface>::new());
        let backend = VdsBackend::new(store.clone(), Arc::new(MemoryInventory::new()));
        let vm = VmContext::new("ns", "vm").with_uid("vm-uid");
        let spec = DesiredInterfaceSpec::new("eth0", "my-vds-network");

        let request = backend.resolve(&vm, &spec).await.unwrap();
        let key = ObjectKey::new("ns", "vm-eth0");
        assert_eq!(request, RequestRef::Object(key.clone()));

        let netif = store.get(&key).await.unwrap().unwrap();
        assert_eq!(netif.spec.network_name, "my-vds-network");
        assert_eq!(netif.spec.type_, NetworkInterfaceType::Vmxnet3);
        assert_eq!(netif.metadata.owner_references[0].uid, "vm-uid");

        assert!(matches!(
            backend.check_ready(&spec, &request).await.unwrap(),
            Readiness::Pending(_)
        ));
    }

    #[tokio::test]
    async fn test_backing_is_looked_up_by_network_id() {
        let inventory = MemoryInventory::new();
        inventory
            .add_network("DC0_DVPG0", ManagedObjectRef::portgroup("dvportgroup-11"))
            .await;
        let backend = VdsBackend::new(
            Arc::new(MemoryStore::<NetworkInterface>::new()),
            Arc::new(inventory),
        );

        let mut result = NetworkInterfaceResult {
            network_id: "dvportgroup-11".to_string(),
            ..Default::default()
        };
        let backing = backend.resolve_backing("eth0", &result, None).await.unwrap();
        assert_eq!(backing, Some(ManagedObjectRef::portgroup("dvportgroup-11")));

        result.network_id = "dvportgroup-99".to_string();
        let err = backend.resolve_backing("eth0", &result, None).await.unwrap_err();
        assert!(matches!(err, NetworkError::BackingResolution { .. }));
    }
}
