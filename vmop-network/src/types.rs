//! Inputs and results of network interface provisioning.

use ipnet::IpNet;
use serde::{Deserialize, Serialize};

use crate::cidr::AddressError;

/// The VM whose interfaces are being provisioned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VmContext {
    pub namespace: String,
    pub name: String,
    /// Object UID of the VM, used for owner references on created objects.
    #[serde(default)]
    pub uid: String,
}

impl VmContext {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
            uid: String::new(),
        }
    }

    pub fn with_uid(mut self, uid: impl Into<String>) -> Self {
        self.uid = uid.into();
        self
    }
}

/// Reference to a logical network by name and kind.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkRef {
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub kind: String,
}

impl NetworkRef {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: String::new(),
        }
    }
}

/// One desired interface of a VM.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DesiredInterfaceSpec {
    /// Interface name, unique within the VM (e.g. `eth0`).
    pub name: String,
    pub network: NetworkRef,
    #[serde(default)]
    pub dhcp4: bool,
    #[serde(default)]
    pub dhcp6: bool,
    /// Static addresses in CIDR notation.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub addresses: Vec<String>,
}

impl DesiredInterfaceSpec {
    pub fn new(name: impl Into<String>, network: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            network: NetworkRef::named(network),
            ..Default::default()
        }
    }

    /// Parses the static addresses. Each entry must carry a prefix length.
    pub fn static_networks(&self) -> Result<Vec<IpNet>, AddressError> {
        self.addresses
            .iter()
            .map(|a| {
                a.trim()
                    .parse::<IpNet>()
                    .map_err(|_| AddressError::InvalidCidr(a.clone()))
            })
            .collect()
    }

    fn has_static_ipv4(&self) -> bool {
        self.addresses
            .iter()
            .filter_map(|a| a.trim().parse::<IpNet>().ok())
            .any(|net| matches!(net, IpNet::V4(_)))
    }
}

/// Managed object reference in the virtualization inventory.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ManagedObjectRef {
    #[serde(rename = "type")]
    pub kind: String,
    pub value: String,
}

impl ManagedObjectRef {
    pub const DVPG: &'static str = "DistributedVirtualPortgroup";
    pub const NETWORK: &'static str = "Network";
    pub const CLUSTER: &'static str = "ClusterComputeResource";

    pub fn new(kind: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            value: value.into(),
        }
    }

    pub fn portgroup(value: impl Into<String>) -> Self {
        Self::new(Self::DVPG, value)
    }
}

impl std::fmt::Display for ManagedObjectRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.kind, self.value)
    }
}

/// Compute cluster that scopes overlay backing resolution.
pub type ClusterRef = ManagedObjectRef;

/// Concrete inventory object a virtual NIC attaches to.
pub type Backing = ManagedObjectRef;

/// IP configuration derived from a backend status entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IpConfig {
    #[serde(rename = "ipCIDR")]
    pub ip_cidr: String,
    #[serde(rename = "isIPv4")]
    pub is_ipv4: bool,
    pub gateway: String,
}

/// Normalized outcome for one interface.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkInterfaceResult {
    pub name: String,
    pub mac_address: String,
    #[serde(rename = "externalID")]
    pub external_id: String,
    #[serde(rename = "networkID")]
    pub network_id: String,
    /// `None` until backing resolution succeeds. For overlay networks this
    /// needs a cluster scope, so callers re-invoke once one is known.
    pub backing: Option<Backing>,
    pub dhcp4: bool,
    pub dhcp6: bool,
    #[serde(rename = "ipConfigs")]
    pub ip_configs: Vec<IpConfig>,
}

impl NetworkInterfaceResult {
    /// Fills the fields that come from the desired spec rather than the backend.
    pub(crate) fn apply_spec(&mut self, spec: &DesiredInterfaceSpec) {
        self.name = spec.name.clone();
        let reported_ipv4 = self.ip_configs.iter().any(|c| c.is_ipv4);
        self.dhcp4 = spec.dhcp4 || !(reported_ipv4 || spec.has_static_ipv4());
        self.dhcp6 = spec.dhcp6;
    }
}

/// Results in the same order as the desired specs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkInterfaceResults {
    pub results: Vec<NetworkInterfaceResult>,
}

impl NetworkInterfaceResults {
    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, NetworkInterfaceResult> {
        self.results.iter()
    }
}

impl IntoIterator for NetworkInterfaceResults {
    type Item = NetworkInterfaceResult;
    type IntoIter = std::vec::IntoIter<NetworkInterfaceResult>;

    fn into_iter(self) -> Self::IntoIter {
        self.results.into_iter()
    }
}
