//! Tinkerbell Workflow builder

use crds::{Cluster, Inventory, Workflow, WorkflowSpec};
use kube::ResourceExt;
use std::collections::BTreeMap;

/// Device identifier templates use for the management interface
pub const DEVICE_ID: &str = "device_1";

/// Bind the provisioning template to the inventory's Hardware
///
/// The template defaults to one named after the inventory; a cluster wide
/// custom template takes precedence. Safe to call on its own to re-bind a
/// template without regenerating the Hardware.
pub fn generate_workflow(inventory: &Inventory, cluster: &Cluster) -> Workflow {
    let name = inventory.name_any();

    let custom = &cluster.spec.cluster_config.custom_provisioning_template;
    let template_ref = if custom.is_empty() {
        name.clone()
    } else {
        custom.clone()
    };

    let spec = WorkflowSpec {
        template_ref,
        hardware_ref: name.clone(),
        hardware_map: BTreeMap::from([(
            DEVICE_ID.to_string(),
            inventory.spec.management_interface_mac_address.clone(),
        )]),
    };

    let mut workflow = Workflow::new(&name, spec);
    workflow.metadata.namespace = inventory.namespace();
    workflow
}
