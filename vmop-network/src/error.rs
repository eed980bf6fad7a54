//! Error types for network interface provisioning.

use std::time::Duration;

use thiserror::Error;

use crate::cidr::AddressError;
use crate::clients::{InventoryError, StoreError};

/// Errors returned while provisioning network interfaces.
///
/// Every variant names the interface that caused it so the caller can
/// report the failure against the right NIC.
#[derive(Debug, Error)]
pub enum NetworkError {
    /// Named network does not exist in the inventory. Never retried.
    #[error("interface {interface}: unable to find named network \"{network}\"")]
    NetworkNotFound { interface: String, network: String },

    /// Backend object exists but never reported ready within the retry timeout.
    #[error(
        "interface {interface}: network interface is not ready yet after {elapsed:?} (last reason: {reason})"
    )]
    NotReady {
        interface: String,
        elapsed: Duration,
        reason: String,
    },

    /// Malformed address/mask pair in a backend status.
    #[error("interface {interface}: {source}")]
    InvalidAddress {
        interface: String,
        #[source]
        source: AddressError,
    },

    /// Backing lookup failed for a reason other than a missing cluster scope.
    #[error("interface {interface}: unable to resolve network backing: {reason}")]
    BackingResolution { interface: String, reason: String },

    /// The caller cancelled the wait.
    #[error("interface {interface}: wait cancelled")]
    Cancelled { interface: String },

    /// The same interface name appears twice in the desired list.
    #[error("interface {interface}: duplicate interface name")]
    DuplicateInterface { interface: String },

    #[error("interface {interface}: object store: {source}")]
    Store {
        interface: String,
        #[source]
        source: StoreError,
    },

    #[error("interface {interface}: inventory: {source}")]
    Inventory {
        interface: String,
        #[source]
        source: InventoryError,
    },

    /// The interface's wait task ended without reporting back.
    #[error("interface {interface}: wait task failed: {reason}")]
    TaskFailed { interface: String, reason: String },
}

impl NetworkError {
    pub fn store(interface: impl Into<String>, source: StoreError) -> Self {
        Self::Store {
            interface: interface.into(),
            source,
        }
    }

    pub fn inventory(interface: impl Into<String>, source: InventoryError) -> Self {
        Self::Inventory {
            interface: interface.into(),
            source,
        }
    }

    pub fn invalid_address(interface: impl Into<String>, source: AddressError) -> Self {
        Self::InvalidAddress {
            interface: interface.into(),
            source,
        }
    }

    pub fn backing(interface: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::BackingResolution {
            interface: interface.into(),
            reason: reason.into(),
        }
    }

    /// Name of the interface this error belongs to.
    pub fn interface(&self) -> &str {
        match self {
            Self::NetworkNotFound { interface, .. }
            | Self::NotReady { interface, .. }
            | Self::InvalidAddress { interface, .. }
            | Self::BackingResolution { interface, .. }
            | Self::Cancelled { interface }
            | Self::DuplicateInterface { interface }
            | Self::Store { interface, .. }
            | Self::Inventory { interface, .. }
            | Self::TaskFailed { interface, .. } => interface,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NetworkNotFound { .. })
    }

    pub fn is_not_ready(&self) -> bool {
        matches!(self, Self::NotReady { .. })
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }
}

/// Result type for network interface operations.
pub type Result<T> = std::result::Result<T, NetworkError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_ready_message_names_interface_and_elapsed() {
        let err = NetworkError::NotReady {
            interface: "eth0".to_string(),
            elapsed: Duration::from_secs(1),
            reason: "Pending".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("network interface is not ready yet"));
        assert!(msg.contains("eth0"));
        assert!(msg.contains("1s"));
        assert!(err.is_not_ready());
        assert!(!err.is_cancelled());
    }

    #[test]
    fn test_cancelled_is_distinct_from_timeout() {
        let err = NetworkError::Cancelled {
            interface: "eth1".to_string(),
        };
        assert!(err.is_cancelled());
        assert!(!err.is_not_ready());
        assert!(!err.to_string().contains("not ready"));
        assert_eq!(err.interface(), "eth1");
    }

    #[test]
    fn test_not_found_message() {
        let err = NetworkError::NetworkNotFound {
            interface: "eth0".to_string(),
            network: "bogus".to_string(),
        };
        assert!(err.to_string().contains("unable to find named network"));
        assert!(err.is_not_found());
    }
}
