//! Object store client abstraction.

use async_trait::async_trait;
use thiserror::Error;

use crate::resources::{BackendObject, ObjectKey};

/// Errors that can occur during object store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Object not found.
    #[error("{kind} {key} not found")]
    NotFound { kind: &'static str, key: ObjectKey },

    /// An object with the same name already exists.
    #[error("{kind} {key} already exists")]
    AlreadyExists { kind: &'static str, key: ObjectKey },

    /// Write rejected because the object changed underneath.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Transport or server failure.
    #[error("internal: {0}")]
    Internal(String),
}

/// Store for one kind of backend request object.
///
/// The engine only ever creates objects and reads them back. Status is
/// written by the backend's own reconciler.
#[async_trait]
pub trait ObjectStore<K: BackendObject>: Send + Sync {
    /// Get an object by namespaced name.
    async fn get(&self, key: &ObjectKey) -> Result<Option<K>, StoreError>;

    /// Create an object. Fails with [`StoreError::AlreadyExists`] if the name is taken.
    async fn create(&self, obj: &K) -> Result<K, StoreError>;
}
