//! Tinkerbell Workflow CRD
//!
//! Binds a Template to a Hardware object.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(CustomResource, Debug, Clone, Default, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[kube(
    group = "tinkerbell.org",
    version = "v1alpha1",
    kind = "Workflow",
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowSpec {
    /// Name of the Template to run
    pub template_ref: String,

    /// Name of the Hardware the workflow runs on
    pub hardware_ref: String,

    /// Template device identifier -> MAC address
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub hardware_map: BTreeMap<String, String>,
}
