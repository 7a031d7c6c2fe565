//! Inventory CRD
//!
//! Describes a physical machine that can be provisioned into a Harvester
//! cluster: its management NIC, its install disk and, once a cluster claims
//! it, the network lease and credentials handed to the installer.

use crate::references::ObjectReference;
use chrono::{DateTime, Utc};
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(CustomResource, Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "metal.harvesterhci.io",
    version = "v1alpha1",
    kind = "Inventory",
    namespaced,
    status = "InventoryStatus"
)]
#[serde(rename_all = "camelCase")]
pub struct InventorySpec {
    /// Device the installer writes to (e.g. `/dev/sda`)
    pub primary_disk: String,

    /// MAC address of the NIC used for PXE boot and management traffic
    pub management_interface_mac_address: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct InventoryStatus {
    /// Lifecycle state
    #[serde(default)]
    pub status: InventoryState,

    /// Password set on the installed node
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub generated_password: String,

    /// Cluster this inventory has been allocated to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cluster: Option<ObjectReference>,

    /// Network lease used during PXE boot and by the installed OS
    #[serde(default)]
    pub pxe_boot_interface: PxeBootInterface,

    /// Node scoped conditions
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<InventoryCondition>,

    /// Last error recorded while provisioning
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Inventory lifecycle state
#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, Default, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub enum InventoryState {
    /// Not yet claimed, or claimed but waiting for an address
    #[default]
    Pending,

    /// Lease allocated from the node's address pool
    AddressAllocated,

    /// Hardware and workflow submitted to the provisioning backend
    Provisioning,

    /// Installer reported completion
    Provisioned,
}

/// Address, netmask and gateway allocated to the management interface
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PxeBootInterface {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub address: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub netmask: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub gateway: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub name_servers: Vec<String>,
}

impl PxeBootInterface {
    /// Whether address, netmask and gateway are all set
    pub fn is_resolved(&self) -> bool {
        !self.address.is_empty() && !self.netmask.is_empty() && !self.gateway.is_empty()
    }
}

/// Condition types recorded on an inventory
#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub enum ConditionType {
    /// Node creates the cluster
    HarvesterCreateNode,

    /// Node joins an existing cluster
    HarvesterJoinNode,

    /// Hardware and workflow were applied
    TinkHardwareSubmitted,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct InventoryCondition {
    #[serde(rename = "type")]
    pub type_: ConditionType,

    /// "True" or "False"
    pub status: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub message: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_update_time: Option<DateTime<Utc>>,
}

impl Inventory {
    /// Lease allocated to this inventory, if address, netmask and gateway are resolved
    pub fn lease(&self) -> Option<&PxeBootInterface> {
        self.status
            .as_ref()
            .map(|s| &s.pxe_boot_interface)
            .filter(|lease| lease.is_resolved())
    }

    /// Whether a condition of the given type is present and true
    pub fn has_condition(&self, type_: ConditionType) -> bool {
        self.status.as_ref().is_some_and(|s| {
            s.conditions
                .iter()
                .any(|c| c.type_ == type_ && c.status == "True")
        })
    }

    /// Cluster this inventory has been allocated to
    pub fn cluster_ref(&self) -> Option<&ObjectReference> {
        self.status.as_ref().and_then(|s| s.cluster.as_ref())
    }
}

impl InventoryStatus {
    /// Set or refresh a condition, returning true if anything changed
    pub fn set_condition(&mut self, type_: ConditionType, message: impl Into<String>) -> bool {
        let message = message.into();
        if let Some(existing) = self.conditions.iter_mut().find(|c| c.type_ == type_) {
            if existing.status == "True" && existing.message == message {
                return false;
            }
            existing.status = "True".to_string();
            existing.message = message;
            existing.last_update_time = Some(Utc::now());
            return true;
        }

        self.conditions.push(InventoryCondition {
            type_,
            status: "True".to_string(),
            message,
            last_update_time: Some(Utc::now()),
        });
        true
    }

    /// Remove a condition, returning true if it was present
    pub fn remove_condition(&mut self, type_: ConditionType) -> bool {
        let before = self.conditions.len();
        self.conditions.retain(|c| c.type_ != type_);
        before != self.conditions.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lease_requires_full_triple() {
        let mut inventory = Inventory::new("node", InventorySpec::default());
        assert!(inventory.lease().is_none());

        inventory.status = Some(InventoryStatus {
            pxe_boot_interface: PxeBootInterface {
                address: "192.168.1.129".to_string(),
                netmask: "255.255.255.0".to_string(),
                gateway: String::new(),
                name_servers: vec![],
            },
            ..Default::default()
        });
        assert!(inventory.lease().is_none());

        if let Some(status) = inventory.status.as_mut() {
            status.pxe_boot_interface.gateway = "192.168.1.1".to_string();
        }
        assert_eq!(inventory.lease().map(|l| l.address.as_str()), Some("192.168.1.129"));
    }

    #[test]
    fn test_set_condition_is_idempotent() {
        let mut status = InventoryStatus::default();
        assert!(status.set_condition(ConditionType::HarvesterCreateNode, ""));
        assert!(!status.set_condition(ConditionType::HarvesterCreateNode, ""));
        assert_eq!(status.conditions.len(), 1);

        let mut inventory = Inventory::new("node", InventorySpec::default());
        inventory.status = Some(status);
        assert!(inventory.has_condition(ConditionType::HarvesterCreateNode));
        assert!(!inventory.has_condition(ConditionType::HarvesterJoinNode));
    }

    #[test]
    fn test_remove_condition() {
        let mut status = InventoryStatus::default();
        status.set_condition(ConditionType::HarvesterJoinNode, "joining harvester-one");
        assert!(status.remove_condition(ConditionType::HarvesterJoinNode));
        assert!(!status.remove_condition(ConditionType::HarvesterJoinNode));
    }

    #[test]
    fn test_state_serializes_pascal_case() {
        let json = serde_json::to_string(&InventoryState::AddressAllocated).expect("serialize");
        assert_eq!(json, "\"AddressAllocated\"");
    }
}
