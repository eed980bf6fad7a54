//! Network backends.
//!
//! Each backend turns a desired interface into a provisioning request,
//! reports when that request is ready, and maps the backend's network
//! identifier to an inventory backing:
//! - Named: the network already exists in the inventory, no request object
//! - VDS: one `NetworkInterface` per interface, provisioned by net-operator
//! - NSX-T: one `VirtualNetworkInterface` per interface, provisioned by NCP

pub mod named;
pub mod nsxt;
pub mod vds;

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info};

use crate::clients::{Inventory, ObjectStore, StoreError};
use crate::config::NetworkEnvironment;
use crate::error::{NetworkError, Result};
use crate::naming::Generation;
use crate::resources::{BackendObject, NetworkInterface, ObjectKey, VirtualNetworkInterface};
use crate::types::{Backing, ClusterRef, DesiredInterfaceSpec, NetworkInterfaceResult, VmContext};
use crate::waiter::Readiness;

pub use named::NamedBackend;
pub use nsxt::NsxtBackend;
pub use vds::VdsBackend;

/// What a backend resolved a desired interface to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestRef {
    /// Named networks need no request object; the backing is already known.
    Named(Backing),
    /// Request object in the object store.
    Object(ObjectKey),
}

/// Capability surface shared by all backends.
#[async_trait]
pub trait NetworkBackend: Send + Sync {
    /// Look up or create the provisioning request for `spec`.
    ///
    /// Idempotent: calling it again for the same VM and interface returns the
    /// same request without creating anything new.
    async fn resolve(&self, vm: &VmContext, spec: &DesiredInterfaceSpec) -> Result<RequestRef>;

    /// Read the request's current status and project it into a result.
    async fn check_ready(
        &self,
        spec: &DesiredInterfaceSpec,
        request: &RequestRef,
    ) -> Result<Readiness<NetworkInterfaceResult>>;

    /// Map the reported network to an inventory backing.
    ///
    /// `Ok(None)` means the backing cannot be resolved yet (NSX-T without a
    /// cluster scope) and is not an error.
    async fn resolve_backing(
        &self,
        interface: &str,
        result: &NetworkInterfaceResult,
        cluster: Option<&ClusterRef>,
    ) -> Result<Option<Backing>>;
}

/// Clients the backends are built from.
#[derive(Clone)]
pub struct BackendClients {
    pub inventory: Arc<dyn Inventory>,
    pub network_interfaces: Arc<dyn ObjectStore<NetworkInterface>>,
    pub virtual_network_interfaces: Arc<dyn ObjectStore<VirtualNetworkInterface>>,
}

/// The active backend, selected once from the network environment.
pub enum Backend {
    Named(NamedBackend),
    Vds(VdsBackend),
    Nsxt(NsxtBackend),
}

impl Backend {
    pub fn new(environment: NetworkEnvironment, clients: BackendClients) -> Self {
        match environment {
            NetworkEnvironment::Named => Backend::Named(NamedBackend::new(clients.inventory)),
            NetworkEnvironment::Vds => Backend::Vds(VdsBackend::new(
                clients.network_interfaces,
                clients.inventory,
            )),
            NetworkEnvironment::Nsxt => Backend::Nsxt(NsxtBackend::new(
                clients.virtual_network_interfaces,
                clients.inventory,
            )),
        }
    }

    pub fn environment(&self) -> NetworkEnvironment {
        match self {
            Backend::Named(_) => NetworkEnvironment::Named,
            Backend::Vds(_) => NetworkEnvironment::Vds,
            Backend::Nsxt(_) => NetworkEnvironment::Nsxt,
        }
    }

    fn inner(&self) -> &dyn NetworkBackend {
        match self {
            Backend::Named(b) => b,
            Backend::Vds(b) => b,
            Backend::Nsxt(b) => b,
        }
    }
}

#[async_trait]
impl NetworkBackend for Backend {
    async fn resolve(&self, vm: &VmContext, spec: &DesiredInterfaceSpec) -> Result<RequestRef> {
        self.inner().resolve(vm, spec).await
    }

    async fn check_ready(
        &self,
        spec: &DesiredInterfaceSpec,
        request: &RequestRef,
    ) -> Result<Readiness<NetworkInterfaceResult>> {
        self.inner().check_ready(spec, request).await
    }

    async fn resolve_backing(
        &self,
        interface: &str,
        result: &NetworkInterfaceResult,
        cluster: Option<&ClusterRef>,
    ) -> Result<Option<Backing>> {
        self.inner().resolve_backing(interface, result, cluster).await
    }
}

/// Returns the first existing object among `candidates`, or creates one under
/// the last candidate's name.
///
/// Candidates are looked up in order and the first hit wins, so an object of an
/// older naming generation is reused instead of being shadowed by a new one.
/// Losing a create race to another caller counts as success.
pub(crate) async fn get_or_create<K, F>(
    store: &dyn ObjectStore<K>,
    interface: &str,
    namespace: &str,
    candidates: [(Generation, String); 2],
    build: F,
) -> Result<(Generation, K)>
where
    K: BackendObject,
    F: FnOnce(String) -> K,
{
    for (generation, name) in &candidates {
        let key = ObjectKey::new(namespace, name);
        if let Some(obj) = store
            .get(&key)
            .await
            .map_err(|e| NetworkError::store(interface, e))?
        {
            debug!(interface, kind = K::KIND, object = %key, ?generation, "Found existing request object");
            return Ok((*generation, obj));
        }
    }

    let [_, (generation, name)] = candidates;
    let obj = build(name);
    let key = obj.key();
    match store.create(&obj).await {
        Ok(created) => {
            info!(interface, kind = K::KIND, object = %key, "Created request object");
            Ok((generation, created))
        }
        Err(StoreError::AlreadyExists { .. }) => {
            debug!(interface, kind = K::KIND, object = %key, "Request object created concurrently");
            let existing = store
                .get(&key)
                .await
                .map_err(|e| NetworkError::store(interface, e))?
                .ok_or_else(|| {
                    NetworkError::store(
                        interface,
                        StoreError::Conflict(format!("{} {key} deleted during create", K::KIND)),
                    )
                })?;
            Ok((generation, existing))
        }
        Err(e) => Err(NetworkError::store(interface, e)),
    }
}

/// Reads a request object back for a readiness check.
pub(crate) async fn fetch<K: BackendObject>(
    store: &dyn ObjectStore<K>,
    interface: &str,
    request: &RequestRef,
) -> Result<std::result::Result<K, String>> {
    let key = match request {
        RequestRef::Object(key) => key,
        RequestRef::Named(backing) => {
            return Err(NetworkError::backing(
                interface,
                format!("{} backend cannot use named network {backing}", K::KIND),
            ));
        }
    };

    let obj = store
        .get(key)
        .await
        .map_err(|e| NetworkError::store(interface, e))?;
    Ok(obj.ok_or_else(|| format!("{} {key} not found", K::KIND)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::MemoryStore;
    use crate::naming::{candidates, netop_name};
    use crate::resources::{NetworkInterfaceSpec, ObjectMeta};

    fn build(vm: &VmContext, network: &str) -> impl FnOnce(String) -> NetworkInterface {
        let vm = vm.clone();
        let network = network.to_string();
        move |name| NetworkInterface {
            metadata: ObjectMeta::owned_by(&vm, name),
            spec: NetworkInterfaceSpec {
                network_name: network,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    /// Store that reports a conflict on create, as if another caller won the race.
    struct RacingStore {
        inner: MemoryStore<NetworkInterface>,
        winner: NetworkInterface,
    }

    #[async_trait]
    impl ObjectStore<NetworkInterface> for RacingStore {
        async fn get(
            &self,
            key: &ObjectKey,
        ) -> std::result::Result<Option<NetworkInterface>, StoreError> {
            self.inner.get(key).await
        }

        async fn create(
            &self,
            obj: &NetworkInterface,
        ) -> std::result::Result<NetworkInterface, StoreError> {
            self.inner.insert(self.winner.clone()).await;
            Err(StoreError::AlreadyExists {
                kind: NetworkInterface::KIND,
                key: obj.key(),
            })
        }
    }

    #[tokio::test]
    async fn test_get_or_create_is_idempotent() {
        let vm = VmContext::new("ns", "vm");
        let store = MemoryStore::<NetworkInterface>::new();

        let (generation, first) = get_or_create(
            &store,
            "eth0",
            "ns",
            candidates(netop_name, "vm", "net", "eth0"),
            build(&vm, "net"),
        )
        .await
        .unwrap();
        assert_eq!(generation, Generation::Current);
        assert_eq!(first.metadata.name, "vm-eth0");

        let (_, second) = get_or_create(
            &store,
            "eth0",
            "ns",
            candidates(netop_name, "vm", "net", "eth0"),
            build(&vm, "net"),
        )
        .await
        .unwrap();
        assert_eq!(first.metadata.uid, second.metadata.uid);
        assert_eq!(store.create_count(), 1);
    }

    #[tokio::test]
    async fn test_get_or_create_prefers_legacy() {
        let vm = VmContext::new("ns", "vm");
        let store = MemoryStore::<NetworkInterface>::new();
        store.insert(build(&vm, "net")("net-vm".to_string())).await;

        let (generation, obj) = get_or_create(
            &store,
            "eth0",
            "ns",
            candidates(netop_name, "vm", "net", "eth0"),
            build(&vm, "net"),
        )
        .await
        .unwrap();
        assert_eq!(generation, Generation::Legacy);
        assert_eq!(obj.metadata.name, "net-vm");
        assert_eq!(store.create_count(), 0);
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_get_or_create_tolerates_create_race() {
        let vm = VmContext::new("ns", "vm");
        let mut winner = build(&vm, "net")("vm-eth0".to_string());
        winner.metadata.uid = "winner".to_string();
        let store = RacingStore {
            inner: MemoryStore::new(),
            winner,
        };

        let (_, obj) = get_or_create(
            &store,
            "eth0",
            "ns",
            candidates(netop_name, "vm", "net", "eth0"),
            build(&vm, "net"),
        )
        .await
        .unwrap();
        assert_eq!(obj.metadata.uid, "winner");
    }
}
