//! Backend request objects.
//!
//! Only the fields this crate reads or writes are modelled. Specs are written
//! once on creation; statuses belong to the backend's own reconciler.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::VmContext;

/// Label put on every request object, carrying the owning VM's name.
pub const VM_NAME_LABEL: &str = "vmoperator.vmware.com/vm-name";

/// Condition type that signals a provisioned interface.
pub const READY_CONDITION: &str = "Ready";

/// Namespaced name of an object.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectKey {
    pub namespace: String,
    pub name: String,
}

impl ObjectKey {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }
}

impl std::fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OwnerReference {
    pub api_version: String,
    pub kind: String,
    pub name: String,
    pub uid: String,
}

impl OwnerReference {
    pub fn for_vm(vm: &VmContext) -> Self {
        Self {
            api_version: "vmoperator.vmware.com/v1alpha2".to_string(),
            kind: "VirtualMachine".to_string(),
            name: vm.name.clone(),
            uid: vm.uid.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectMeta {
    pub name: String,
    pub namespace: String,
    /// Assigned by the object store on creation.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub uid: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub owner_references: Vec<OwnerReference>,
}

impl ObjectMeta {
    /// Metadata for a request object owned by `vm`.
    pub fn owned_by(vm: &VmContext, name: impl Into<String>) -> Self {
        let mut labels = BTreeMap::new();
        labels.insert(VM_NAME_LABEL.to_string(), vm.name.clone());
        let owner_references = if vm.uid.is_empty() {
            Vec::new()
        } else {
            vec![OwnerReference::for_vm(vm)]
        };
        Self {
            name: name.into(),
            namespace: vm.namespace.clone(),
            uid: String::new(),
            labels,
            owner_references,
        }
    }

    pub fn key(&self) -> ObjectKey {
        ObjectKey::new(&self.namespace, &self.name)
    }
}

/// Tri-state condition status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConditionStatus {
    True,
    False,
    #[default]
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    #[serde(rename = "type")]
    pub type_: String,
    pub status: ConditionStatus,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub reason: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_transition_time: Option<DateTime<Utc>>,
}

impl Condition {
    pub fn ready(status: ConditionStatus) -> Self {
        Self {
            type_: READY_CONDITION.to_string(),
            status,
            reason: String::new(),
            message: String::new(),
            last_transition_time: Some(Utc::now()),
        }
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = reason.into();
        self
    }
}

/// Readiness observed on a request object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadyState {
    Ready,
    /// Not ready; carries a human readable reason for timeout reporting.
    Pending(String),
}

/// Reads the `Ready` condition out of a condition list.
pub fn ready_state(conditions: &[Condition]) -> ReadyState {
    match conditions.iter().find(|c| c.type_ == READY_CONDITION) {
        Some(c) if c.status == ConditionStatus::True => ReadyState::Ready,
        Some(c) => {
            let reason = if !c.reason.is_empty() {
                c.reason.clone()
            } else if !c.message.is_empty() {
                c.message.clone()
            } else {
                format!("Ready condition is {:?}", c.status)
            };
            ReadyState::Pending(reason)
        }
        None => ReadyState::Pending("no Ready condition reported".to_string()),
    }
}

/// Common surface of request objects held in an object store.
pub trait BackendObject: Clone + Send + Sync + 'static {
    const KIND: &'static str;

    fn metadata(&self) -> &ObjectMeta;
    fn metadata_mut(&mut self) -> &mut ObjectMeta;

    /// Copies the backend-owned status from `other`.
    fn set_status_from(&mut self, other: &Self);

    fn key(&self) -> ObjectKey {
        self.metadata().key()
    }
}

// ---------------------------------------------------------------------------
// VDS: NetworkInterface (net-operator)
// ---------------------------------------------------------------------------

/// Address family reported by the VDS backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IpFamily {
    #[serde(rename = "IPv4")]
    Ipv4,
    #[serde(rename = "IPv6")]
    Ipv6,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum NetworkInterfaceType {
    #[default]
    #[serde(rename = "vmxnet3")]
    Vmxnet3,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkInterfaceSpec {
    pub network_name: String,
    #[serde(rename = "type")]
    pub type_: NetworkInterfaceType,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetOpIpConfig {
    pub ip: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip_family: Option<IpFamily>,
    #[serde(default)]
    pub gateway: String,
    pub subnet_mask: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkInterfaceStatus {
    #[serde(default)]
    pub conditions: Vec<Condition>,
    #[serde(default)]
    pub ip_configs: Vec<NetOpIpConfig>,
    #[serde(default)]
    pub mac_address: String,
    #[serde(default, rename = "externalID")]
    pub external_id: String,
    #[serde(default, rename = "networkID")]
    pub network_id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkInterface {
    pub metadata: ObjectMeta,
    pub spec: NetworkInterfaceSpec,
    #[serde(default)]
    pub status: NetworkInterfaceStatus,
}

impl BackendObject for NetworkInterface {
    const KIND: &'static str = "NetworkInterface";

    fn metadata(&self) -> &ObjectMeta {
        &self.metadata
    }

    fn metadata_mut(&mut self) -> &mut ObjectMeta {
        &mut self.metadata
    }

    fn set_status_from(&mut self, other: &Self) {
        self.status = other.status.clone();
    }
}

// ---------------------------------------------------------------------------
// NSX-T: VirtualNetworkInterface (NCP)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VirtualNetworkInterfaceSpec {
    pub virtual_network: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VirtualNetworkInterfaceProviderStatus {
    #[serde(rename = "nsxLogicalSwitchID")]
    pub nsx_logical_switch_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VirtualNetworkInterfaceIp {
    pub ip: String,
    #[serde(default)]
    pub gateway: String,
    pub subnet_mask: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VirtualNetworkInterfaceStatus {
    #[serde(default)]
    pub conditions: Vec<Condition>,
    #[serde(default, rename = "interfaceID")]
    pub interface_id: String,
    #[serde(default)]
    pub mac_address: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_status: Option<VirtualNetworkInterfaceProviderStatus>,
    #[serde(default)]
    pub ip_addresses: Vec<VirtualNetworkInterfaceIp>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VirtualNetworkInterface {
    pub metadata: ObjectMeta,
    pub spec: VirtualNetworkInterfaceSpec,
    #[serde(default)]
    pub status: VirtualNetworkInterfaceStatus,
}

impl BackendObject for VirtualNetworkInterface {
    const KIND: &'static str = "VirtualNetworkInterface";

    fn metadata(&self) -> &ObjectMeta {
        &self.metadata
    }

    fn metadata_mut(&mut self) -> &mut ObjectMeta {
        &mut self.metadata
    }

    fn set_status_from(&mut self, other: &Self) {
        self.status = other.status.clone();
    }
}
