//! Helper functions for common reconciliation patterns
//!
//! Everything here is pure so the decisions reconcilers make can be tested
//! without an API server.

use address_pool::Lease;
use crds::{
    AddressPoolStatus, ConditionType, InventoryState, InventoryStatus, ObjectReference,
    PxeBootInterface,
};
use serde::Serialize;
use serde_json::{json, Map, Value};

/// Key used for per-resource backoff tracking
pub fn resource_key(namespace: &str, name: &str) -> String {
    format!("{namespace}/{name}")
}

/// Random credential for join tokens and node passwords
pub fn generate_secret() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

/// Merge patch body for a status subresource
///
/// Optional fields are skipped when serializing, which a merge patch would
/// read as "leave unchanged". Every name in `clear` that is absent from the
/// serialized status is sent as `null` so stale values are removed.
pub fn status_patch<T: Serialize>(status: &T, clear: &[&str]) -> Result<Value, serde_json::Error> {
    let mut value = serde_json::to_value(status)?;
    if let Value::Object(fields) = &mut value {
        for field in clear {
            fields.entry(field.to_string()).or_insert(Value::Null);
        }
    }
    Ok(json!({ "status": value }))
}

/// Pool status fields that are empty while the spec is invalid
const POOL_RANGE_FIELDS: [&str; 4] = ["error", "startAddress", "lastAddress", "netmask"];

/// Status patch for an address pool guarded by the pool's resourceVersion
///
/// Range fields missing from `status` are cleared. `released` addresses are removed from the allocation map. The API server
/// rejects the patch with a conflict if the pool changed since it was read,
/// so two reconcilers can never hand out the same address.
pub fn pool_status_patch(
    resource_version: Option<&str>,
    status: &AddressPoolStatus,
    released: &[String],
) -> Result<Value, serde_json::Error> {
    let mut patch = status_patch(status, &POOL_RANGE_FIELDS)?;

    if !released.is_empty() {
        let allocation = patch["status"]
            .as_object_mut()
            .map(|fields| {
                fields
                    .entry("addressAllocation")
                    .or_insert_with(|| Value::Object(Map::new()))
            });
        if let Some(Value::Object(allocation)) = allocation {
            for address in released {
                allocation.insert(address.clone(), Value::Null);
            }
        }
    }

    if let Some(resource_version) = resource_version {
        patch["metadata"] = json!({ "resourceVersion": resource_version });
    }
    Ok(patch)
}

/// Lease as recorded on the inventory
pub fn lease_interface(lease: &Lease, nameservers: &[String]) -> PxeBootInterface {
    PxeBootInterface {
        address: lease.address.to_string(),
        netmask: lease.netmask.to_string(),
        gateway: lease.gateway.to_string(),
        name_servers: nameservers.to_vec(),
    }
}

/// Role condition for the node at `position` in the cluster's node list
///
/// The first node creates the cluster, every other node joins it.
pub fn role_condition(position: usize) -> ConditionType {
    if position == 0 {
        ConditionType::HarvesterCreateNode
    } else {
        ConditionType::HarvesterJoinNode
    }
}

/// Outcome of assigning an inventory to a cluster
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Assignment {
    /// Status was updated and needs persisting
    Updated,
    /// Already assigned with the right role
    Unchanged,
    /// Inventory belongs to another cluster
    Conflict(ObjectReference),
}

/// Record cluster membership and role on an inventory status
pub fn assign_to_cluster(
    status: &mut InventoryStatus,
    cluster: &ObjectReference,
    position: usize,
) -> Assignment {
    if let Some(existing) = &status.cluster {
        if existing != cluster {
            return Assignment::Conflict(existing.clone());
        }
    }

    let role = role_condition(position);
    let other = match role {
        ConditionType::HarvesterCreateNode => ConditionType::HarvesterJoinNode,
        _ => ConditionType::HarvesterCreateNode,
    };

    let mut changed = status.cluster.is_none();
    status.cluster = Some(cluster.clone());
    changed |= status.set_condition(role, "");
    changed |= status.remove_condition(other);

    if changed {
        Assignment::Updated
    } else {
        Assignment::Unchanged
    }
}

/// Whether Tinkerbell objects were already submitted for an inventory
pub fn install_started(status: &InventoryStatus) -> bool {
    matches!(
        status.status,
        InventoryState::Provisioning | InventoryState::Provisioned
    ) || status
        .conditions
        .iter()
        .any(|c| c.type_ == ConditionType::TinkHardwareSubmitted)
}

/// Drop an inventory's membership of `cluster` along with its lease and conditions
///
/// Returns false when the inventory belongs to another cluster or none.
/// A provisioned inventory keeps its state.
pub fn unassign_from_cluster(status: &mut InventoryStatus, cluster: &ObjectReference) -> bool {
    if status.cluster.as_ref() != Some(cluster) {
        return false;
    }
    status.cluster = None;
    status.pxe_boot_interface = PxeBootInterface::default();
    status.conditions.clear();
    status.error = None;
    if status.status != InventoryState::Provisioned {
        status.status = InventoryState::Pending;
    }
    true
}

/// Status patch persisting [`unassign_from_cluster`]
pub fn unassign_patch(status: &InventoryStatus) -> Result<Value, serde_json::Error> {
    let mut patch = status_patch(status, &["cluster", "conditions", "error"])?;
    // an empty lease serializes as `{}`, which a merge patch leaves alone
    patch["status"]["pxeBootInterface"] = Value::Null;
    Ok(patch)
}

/// Record an allocated lease on an inventory status
pub fn record_lease(status: &mut InventoryStatus, lease: PxeBootInterface) -> bool {
    if status.pxe_boot_interface == lease {
        return false;
    }
    status.pxe_boot_interface = lease;
    if status.status == InventoryState::Pending {
        status.status = InventoryState::AddressAllocated;
    }
    true
}

/// Mark an inventory whose Hardware and Workflow were applied
pub fn mark_submitted(status: &mut InventoryStatus, mechanism: &str) -> bool {
    let mut changed = status.set_condition(
        ConditionType::TinkHardwareSubmitted,
        format!("{mechanism} install submitted"),
    );
    if matches!(
        status.status,
        InventoryState::Pending | InventoryState::AddressAllocated
    ) {
        status.status = InventoryState::Provisioning;
        changed = true;
    }
    if status.error.take().is_some() {
        changed = true;
    }
    changed
}

/// Installer reported completion
pub fn mark_provisioned(status: &mut InventoryStatus) -> bool {
    if status.status == InventoryState::Provisioned {
        return false;
    }
    status.status = InventoryState::Provisioned;
    true
}

/// Record a generation failure; returns true when the message changed
pub fn record_error(status: &mut InventoryStatus, message: String) -> bool {
    if status.error.as_deref() == Some(message.as_str()) {
        return false;
    }
    status.error = Some(message);
    true
}

#[cfg(test)]
#[path = "reconcile_helpers_test.rs"]
mod reconcile_helpers_test;
