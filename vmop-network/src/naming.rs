//! Deterministic names for backend request objects.
//!
//! Two naming generations exist. Legacy objects were keyed by network and VM;
//! current ones by VM and interface. Lookups always try the legacy name first
//! so objects created by an older release keep being used.

use sha2::{Digest, Sha256};

/// Maximum length of an object name in the object store.
pub const MAX_NAME_LEN: usize = 253;

const HASH_SUFFIX_LEN: usize = 8;

/// Naming generation of a request object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Generation {
    Legacy,
    Current,
}

impl Generation {
    /// Lookup order.
    pub const LOOKUP_ORDER: [Generation; 2] = [Generation::Legacy, Generation::Current];

    pub fn is_legacy(self) -> bool {
        self == Generation::Legacy
    }
}

/// Name of a VDS `NetworkInterface` object.
pub fn netop_name(vm_name: &str, network_name: &str, interface_name: &str, legacy: bool) -> String {
    let name = if legacy {
        format!("{network_name}-{vm_name}")
    } else {
        format!("{vm_name}-{interface_name}")
    };
    bounded(name)
}

/// Name of an NSX-T `VirtualNetworkInterface` object.
pub fn ncp_name(vm_name: &str, network_name: &str, interface_name: &str, legacy: bool) -> String {
    let name = if legacy {
        if network_name.is_empty() {
            format!("{vm_name}-lsp")
        } else {
            format!("{network_name}-{vm_name}-lsp")
        }
    } else {
        format!("{vm_name}-{interface_name}")
    };
    bounded(name)
}

/// Candidate names in lookup order, paired with their generation.
pub fn candidates(
    name_fn: fn(&str, &str, &str, bool) -> String,
    vm_name: &str,
    network_name: &str,
    interface_name: &str,
) -> [(Generation, String); 2] {
    Generation::LOOKUP_ORDER.map(|generation| {
        let name = name_fn(vm_name, network_name, interface_name, generation.is_legacy());
        (generation, name)
    })
}

/// Truncates over-long names and appends a short digest of the full name.
fn bounded(name: String) -> String {
    if name.len() <= MAX_NAME_LEN {
        return name;
    }

    let digest = hex::encode(Sha256::digest(name.as_bytes()));
    let mut keep = MAX_NAME_LEN - HASH_SUFFIX_LEN - 1;
    while !name.is_char_boundary(keep) {
        keep -= 1;
    }
    let prefix = name[..keep].trim_end_matches(|c: char| c == '-' || c == '.');
    format!("{prefix}-{}", &digest[..HASH_SUFFIX_LEN])
}
