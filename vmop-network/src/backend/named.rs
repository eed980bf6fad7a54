//! Named network backend - interfaces attach directly to an existing network.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use super::{NetworkBackend, RequestRef};
use crate::clients::Inventory;
use crate::error::{NetworkError, Result};
use crate::types::{Backing, ClusterRef, DesiredInterfaceSpec, NetworkInterfaceResult, VmContext};
use crate::waiter::Readiness;

/// Backend for networks that exist in the inventory under a known name.
pub struct NamedBackend {
    inventory: Arc<dyn Inventory>,
}

impl NamedBackend {
    pub fn new(inventory: Arc<dyn Inventory>) -> Self {
        Self { inventory }
    }
}

#[async_trait]
impl NetworkBackend for NamedBackend {
    async fn resolve(&self, vm: &VmContext, spec: &DesiredInterfaceSpec) -> Result<RequestRef> {
        let network = &spec.network.name;
        let found = self
            .inventory
            .find_network(network)
            .await
            .map_err(|e| NetworkError::inventory(&spec.name, e))?;

        match found {
            Some(backing) => {
                debug!(vm = %vm.name, interface = %spec.name, network = %network, %backing, "Found named network");
                Ok(RequestRef::Named(backing))
            }
            None => Err(NetworkError::NetworkNotFound {
                interface: spec.name.clone(),
                network: network.clone(),
            }),
        }
    }

    async fn check_ready(
        &self,
        spec: &DesiredInterfaceSpec,
        request: &RequestRef,
    ) -> Result<Readiness<NetworkInterfaceResult>> {
        match request {
            RequestRef::Named(backing) => Ok(Readiness::Ready(NetworkInterfaceResult {
                network_id: backing.value.clone(),
                backing: Some(backing.clone()),
                ..Default::default()
            })),
            RequestRef::Object(key) => Err(NetworkError::backing(
                &spec.name,
                format!("named network backend has no request object {key}"),
            )),
        }
    }

    async fn resolve_backing(
        &self,
        _interface: &str,
        result: &NetworkInterfaceResult,
        _cluster: Option<&ClusterRef>,
    ) -> Result<Option<Backing>> {
        Ok(result.backing.clone())
    }
}
