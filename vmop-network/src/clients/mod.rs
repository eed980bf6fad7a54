//! Collaborators the provisioning engine talks to.
//!
//! - object store: creates and reads backend request objects
//! - inventory: resolves network identifiers to backing objects
//!
//! In-memory implementations back the test suite and local simulation.

pub mod inventory;
pub mod memory;
pub mod store;

pub use inventory::{Inventory, InventoryError, Portgroup};
pub use memory::{MemoryInventory, MemoryStore};
pub use store::{ObjectStore, StoreError};
