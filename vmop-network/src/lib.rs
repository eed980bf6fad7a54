//! vmop-network: provisions the network interfaces of a virtual machine.
//!
//! For each desired interface the active backend either looks the network up
//! in the inventory (Named) or creates a request object that an external
//! network operator fulfils (VDS, NSX-T). The [`InterfaceReconciler`] waits
//! for every request to become ready, normalizes the reported addresses and
//! resolves the inventory backing the virtual NIC attaches to.

pub mod backend;
pub mod cidr;
pub mod clients;
pub mod config;
pub mod error;
pub mod naming;
pub mod reconciler;
pub mod resources;
pub mod types;
pub mod waiter;

pub use backend::{Backend, BackendClients, NetworkBackend, RequestRef};
pub use config::{ConfigError, NetworkArgs, NetworkEnvironment, ReconcilerConfig};
pub use error::{NetworkError, Result};
pub use reconciler::InterfaceReconciler;
pub use types::{
    Backing, ClusterRef, DesiredInterfaceSpec, IpConfig, ManagedObjectRef, NetworkInterfaceResult,
    NetworkInterfaceResults, NetworkRef, VmContext,
};
