//! NSX-T backend - interfaces are provisioned by NCP through
//! `VirtualNetworkInterface` objects and attach to logical switches.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use super::{fetch, get_or_create, NetworkBackend, RequestRef};
use crate::cidr;
use crate::clients::{Inventory, ObjectStore};
use crate::error::{NetworkError, Result};
use crate::naming::{candidates, ncp_name};
use crate::resources::{
    ready_state, BackendObject, ObjectMeta, ReadyState, VirtualNetworkInterface,
    VirtualNetworkInterfaceSpec,
};
use crate::types::{Backing, ClusterRef, DesiredInterfaceSpec, NetworkInterfaceResult, VmContext};
use crate::waiter::Readiness;

/// Backend for NSX-T overlay networking.
pub struct NsxtBackend {
    store: Arc<dyn ObjectStore<VirtualNetworkInterface>>,
    inventory: Arc<dyn Inventory>,
}

impl NsxtBackend {
    pub fn new(
        store: Arc<dyn ObjectStore<VirtualNetworkInterface>>,
        inventory: Arc<dyn Inventory>,
    ) -> Self {
        Self { store, inventory }
    }
}

/// Projects a `VirtualNetworkInterface` status into a result.
///
/// The network ID is the NSX logical switch UUID; the interface ID becomes
/// the external ID.
pub fn extract_result(
    interface: &str,
    vnetif: &VirtualNetworkInterface,
) -> Result<Readiness<NetworkInterfaceResult>> {
    if let ReadyState::Pending(reason) = ready_state(&vnetif.status.conditions) {
        return Ok(Readiness::Pending(reason));
    }

    let status = &vnetif.status;
    let ip_configs = status
        .ip_addresses
        .iter()
        .map(|ip| cidr::normalize(&ip.ip, &ip.subnet_mask, &ip.gateway, None))
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| NetworkError::invalid_address(interface, e))?;

    let network_id = status
        .provider_status
        .as_ref()
        .map(|p| p.nsx_logical_switch_id.clone())
        .unwrap_or_default();

    Ok(Readiness::Ready(NetworkInterfaceResult {
        mac_address: status.mac_address.clone(),
        external_id: status.interface_id.clone(),
        network_id,
        ip_configs,
        ..Default::default()
    }))
}

#[async_trait]
impl NetworkBackend for NsxtBackend {
    async fn resolve(&self, vm: &VmContext, spec: &DesiredInterfaceSpec) -> Result<RequestRef> {
        let network = spec.network.name.as_str();
        let (generation, vnetif) = get_or_create(
            self.store.as_ref(),
            &spec.name,
            &vm.namespace,
            candidates(ncp_name, &vm.name, network, &spec.name),
            |name| VirtualNetworkInterface {
                metadata: ObjectMeta::owned_by(vm, name),
                spec: VirtualNetworkInterfaceSpec {
                    virtual_network: network.to_string(),
                },
                ..Default::default()
            },
        )
        .await?;

        if vnetif.spec.virtual_network != network {
            warn!(
                interface = %spec.name,
                object = %vnetif.key(),
                ?generation,
                existing = %vnetif.spec.virtual_network,
                desired = network,
                "VirtualNetworkInterface references a different network; leaving it unchanged"
            );
        }

        Ok(RequestRef::Object(vnetif.key()))
    }

    async fn check_ready(
        &self,
        spec: &DesiredInterfaceSpec,
        request: &RequestRef,
    ) -> Result<Readiness<NetworkInterfaceResult>> {
        match fetch(self.store.as_ref(), &spec.name, request).await? {
            Ok(vnetif) => extract_result(&spec.name, &vnetif),
            Err(reason) => Ok(Readiness::Pending(reason)),
        }
    }

    /// Finds the portgroup backing the logical switch among the portgroups
    /// visible to `cluster`. Without a cluster the backing stays unresolved.
    async fn resolve_backing(
        &self,
        interface: &str,
        result: &NetworkInterfaceResult,
        cluster: Option<&ClusterRef>,
    ) -> Result<Option<Backing>> {
        let Some(cluster) = cluster else {
            debug!(interface, "No cluster scope yet, NSX-T backing left unresolved");
            return Ok(None);
        };

        let switch_id = &result.network_id;
        if switch_id.is_empty() {
            return Err(NetworkError::backing(
                interface,
                "VirtualNetworkInterface is ready but reports no logical switch ID",
            ));
        }

        let portgroups = self
            .inventory
            .cluster_portgroups(cluster)
            .await
            .map_err(|e| NetworkError::inventory(interface, e))?;

        let mut matches = portgroups
            .into_iter()
            .filter(|pg| pg.logical_switch_uuid.as_deref() == Some(switch_id.as_str()));

        match (matches.next(), matches.next()) {
            (Some(pg), None) => Ok(Some(pg.reference)),
            (None, _) => Err(NetworkError::backing(
                interface,
                format!("no portgroup for NSX-T logical switch {switch_id:?} in cluster {cluster}"),
            )),
            (Some(_), Some(_)) => Err(NetworkError::backing(
                interface,
                format!(
                    "multiple portgroups for NSX-T logical switch {switch_id:?} in cluster {cluster}"
                ),
            )),
        }
    }
}
