//! In-memory collaborators.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use super::inventory::{Inventory, InventoryError, Portgroup};
use super::store::{ObjectStore, StoreError};
use crate::resources::{BackendObject, ObjectKey};
use crate::types::{ClusterRef, ManagedObjectRef};

/// Object store keeping one kind of object in a map.
pub struct MemoryStore<K> {
    objects: RwLock<BTreeMap<ObjectKey, K>>,
    creates: AtomicUsize,
}

impl<K: BackendObject> Default for MemoryStore<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: BackendObject> MemoryStore<K> {
    pub fn new() -> Self {
        Self {
            objects: RwLock::new(BTreeMap::new()),
            creates: AtomicUsize::new(0),
        }
    }

    /// Seed an object as if it had been created earlier. Not counted as a create.
    pub async fn insert(&self, mut obj: K) {
        if obj.metadata().uid.is_empty() {
            obj.metadata_mut().uid = Uuid::new_v4().to_string();
        }
        self.objects.write().await.insert(obj.key(), obj);
    }

    /// Apply a status change the way the backend's reconciler would.
    pub async fn update_status<F>(&self, key: &ObjectKey, f: F) -> Result<K, StoreError>
    where
        F: FnOnce(&mut K),
    {
        let mut objects = self.objects.write().await;
        let obj = objects.get_mut(key).ok_or_else(|| StoreError::NotFound {
            kind: K::KIND,
            key: key.clone(),
        })?;
        let mut updated = obj.clone();
        f(&mut updated);
        obj.set_status_from(&updated);
        debug!(kind = K::KIND, object = %key, "Status updated");
        Ok(obj.clone())
    }

    pub async fn list(&self) -> Vec<K> {
        self.objects.read().await.values().cloned().collect()
    }

    pub async fn len(&self) -> usize {
        self.objects.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.objects.read().await.is_empty()
    }

    /// Number of successful `create` calls.
    pub fn create_count(&self) -> usize {
        self.creates.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl<K: BackendObject> ObjectStore<K> for MemoryStore<K> {
    async fn get(&self, key: &ObjectKey) -> Result<Option<K>, StoreError> {
        Ok(self.objects.read().await.get(key).cloned())
    }

    async fn create(&self, obj: &K) -> Result<K, StoreError> {
        let key = obj.key();
        let mut objects = self.objects.write().await;
        if objects.contains_key(&key) {
            return Err(StoreError::AlreadyExists { kind: K::KIND, key });
        }

        let mut created = obj.clone();
        created.metadata_mut().uid = Uuid::new_v4().to_string();
        objects.insert(key.clone(), created.clone());
        self.creates.fetch_add(1, Ordering::SeqCst);
        debug!(kind = K::KIND, object = %key, "Object created");
        Ok(created)
    }
}

/// Inventory held in memory.
#[derive(Default)]
pub struct MemoryInventory {
    networks: RwLock<BTreeMap<String, ManagedObjectRef>>,
    portgroups: RwLock<HashMap<ClusterRef, Vec<Portgroup>>>,
}

impl MemoryInventory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a network under its inventory name.
    pub async fn add_network(&self, name: impl Into<String>, reference: ManagedObjectRef) {
        self.networks.write().await.insert(name.into(), reference);
    }

    /// Make a portgroup visible to a cluster. Also registers it as a network.
    pub async fn add_portgroup(&self, cluster: &ClusterRef, portgroup: Portgroup) {
        self.add_network(portgroup.name.clone(), portgroup.reference.clone())
            .await;
        self.portgroups
            .write()
            .await
            .entry(cluster.clone())
            .or_default()
            .push(portgroup);
    }
}

#[async_trait]
impl Inventory for MemoryInventory {
    async fn find_network(&self, name: &str) -> Result<Option<ManagedObjectRef>, InventoryError> {
        Ok(self.networks.read().await.get(name).cloned())
    }

    async fn network_by_id(&self, id: &str) -> Result<Option<ManagedObjectRef>, InventoryError> {
        Ok(self
            .networks
            .read()
            .await
            .values()
            .find(|r| r.value == id)
            .cloned())
    }

    async fn cluster_portgroups(
        &self,
        cluster: &ClusterRef,
    ) -> Result<Vec<Portgroup>, InventoryError> {
        self.portgroups
            .read()
            .await
            .get(cluster)
            .cloned()
            .ok_or_else(|| InventoryError::NotFound(format!("cluster {cluster}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::{NetworkInterface, ObjectMeta};
    use crate::types::VmContext;

    fn netif(name: &str) -> NetworkInterface {
        NetworkInterface {
            metadata: ObjectMeta::owned_by(&VmContext::new("ns", "vm"), name),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_create_get_and_conflict() {
        let store = MemoryStore::<NetworkInterface>::new();
        let created = store.create(&netif("vm-eth0")).await.unwrap();
        assert!(!created.metadata.uid.is_empty());

        let fetched = store.get(&created.key()).await.unwrap().unwrap();
        assert_eq!(fetched, created);

        let err = store.create(&netif("vm-eth0")).await.unwrap_err();
        assert!(matches!(err, StoreError::AlreadyExists { .. }));
        assert_eq!(store.create_count(), 1);
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_update_status_only_touches_status() {
        let store = MemoryStore::<NetworkInterface>::new();
        store.insert(netif("vm-eth0")).await;
        let key = ObjectKey::new("ns", "vm-eth0");

        let updated = store
            .update_status(&key, |obj| {
                obj.spec.network_name = "changed".to_string();
                obj.status.network_id = "dvportgroup-1".to_string();
            })
            .await
            .unwrap();
        assert_eq!(updated.status.network_id, "dvportgroup-1");
        assert_eq!(updated.spec.network_name, "");
        assert_eq!(store.create_count(), 0);

        let missing = store
            .update_status(&ObjectKey::new("ns", "nope"), |_| {})
            .await
            .unwrap_err();
        assert!(matches!(missing, StoreError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_inventory_lookups() {
        let inventory = MemoryInventory::new();
        let cluster = ClusterRef::new(ManagedObjectRef::CLUSTER, "domain-c1");
        let pg = Portgroup {
            reference: ManagedObjectRef::portgroup("dvportgroup-11"),
            name: "DC0_DVPG0".to_string(),
            logical_switch_uuid: Some("ls-1".to_string()),
        };
        inventory.add_portgroup(&cluster, pg.clone()).await;

        assert_eq!(
            inventory.find_network("DC0_DVPG0").await.unwrap(),
            Some(pg.reference.clone())
        );
        assert_eq!(
            inventory.network_by_id("dvportgroup-11").await.unwrap(),
            Some(pg.reference.clone())
        );
        assert!(inventory.find_network("bogus").await.unwrap().is_none());
        assert_eq!(inventory.cluster_portgroups(&cluster).await.unwrap(), vec![pg]);

        let other = ClusterRef::new(ManagedObjectRef::CLUSTER, "domain-c2");
        assert!(inventory.cluster_portgroups(&other).await.is_err());
    }
}
