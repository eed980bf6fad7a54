//! Virtualization inventory abstraction.

use async_trait::async_trait;
use thiserror::Error;

use crate::types::{ClusterRef, ManagedObjectRef};

/// Errors from inventory lookups.
#[derive(Debug, Error)]
pub enum InventoryError {
    #[error("{0} not found")]
    NotFound(String),

    #[error("internal: {0}")]
    Internal(String),
}

/// A distributed portgroup visible to a cluster.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Portgroup {
    pub reference: ManagedObjectRef,
    pub name: String,
    /// Set when the portgroup backs an NSX-T logical switch.
    pub logical_switch_uuid: Option<String>,
}

/// Read-only view of the virtualization inventory.
#[async_trait]
pub trait Inventory: Send + Sync {
    /// Find a network by its inventory name.
    async fn find_network(&self, name: &str) -> Result<Option<ManagedObjectRef>, InventoryError>;

    /// Look up a network by its managed object id (e.g. `dvportgroup-42`).
    async fn network_by_id(&self, id: &str) -> Result<Option<ManagedObjectRef>, InventoryError>;

    /// Portgroups reachable from the hosts of `cluster`.
    async fn cluster_portgroups(
        &self,
        cluster: &ClusterRef,
    ) -> Result<Vec<Portgroup>, InventoryError>;
}
