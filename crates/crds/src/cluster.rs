//! Cluster CRD
//!
//! Declares a Harvester cluster: the version to install, where to fetch
//! artifacts from, which inventories make up the cluster and the
//! configuration every node shares.

use crate::references::ObjectReference;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(CustomResource, Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "metal.harvesterhci.io",
    version = "v1alpha1",
    kind = "Cluster",
    namespaced,
    status = "ClusterStatus"
)]
#[serde(rename_all = "camelCase")]
pub struct ClusterSpec {
    /// Harvester version to install (e.g. `v1.2.0`)
    pub harvester_version: String,

    /// Base URL hosting Harvester release artifacts
    #[serde(default, rename = "imageURL")]
    pub image_url: String,

    /// How the cluster virtual IP is obtained
    #[serde(default)]
    pub vip_config: VipConfig,

    /// Inventories that make up the cluster. The first entry creates the cluster.
    #[serde(default)]
    pub nodes: Vec<NodeConfig>,

    /// Configuration shared by every node
    #[serde(default)]
    pub cluster_config: ClusterConfig,

    /// Bond options for the management interface (defaults apply when unset)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bond_options: Option<BTreeMap<String, String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct VipConfig {
    /// Pool the VIP is allocated from when no static address is given
    pub address_pool_reference: ObjectReference,

    /// Fixed VIP, skipping allocation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub static_address: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct NodeConfig {
    /// Inventory to provision
    pub inventory_reference: ObjectReference,

    /// Pool the node's management address is allocated from
    pub address_pool_reference: ObjectReference,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ClusterConfig {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ssh_keys: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub nameservers: Vec<String>,

    /// Remote config merged by the installer (streaming installs only)
    #[serde(default, rename = "configURL", skip_serializing_if = "String::is_empty")]
    pub config_url: String,

    /// Tinkerbell template used instead of the per-node default
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub custom_provisioning_template: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ClusterStatus {
    /// Lifecycle state
    #[serde(default)]
    pub status: ClusterState,

    /// Virtual IP of the cluster
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub cluster_address: String,

    /// Token shared by all nodes of the cluster
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub cluster_token: String,

    /// Error message if reconciliation failed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, Default, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub enum ClusterState {
    #[default]
    Pending,

    /// Token generated and VIP resolved
    Ready,
}

impl Cluster {
    /// Virtual IP and join token, once both are known
    pub fn address_and_token(&self) -> Option<(&str, &str)> {
        let status = self.status.as_ref()?;
        if status.cluster_address.is_empty() || status.cluster_token.is_empty() {
            return None;
        }
        Some((&status.cluster_address, &status.cluster_token))
    }

    /// Node entry for the given inventory
    ///
    /// Returns the entry and its position. Position zero creates the cluster.
    pub fn node_for(&self, inventory_name: &str, inventory_namespace: &str) -> Option<(usize, &NodeConfig)> {
        let cluster_namespace = self.metadata.namespace.as_deref().unwrap_or("default");
        self.spec.nodes.iter().enumerate().find(|(_, node)| {
            node.inventory_reference
                .points_at(inventory_name, inventory_namespace, cluster_namespace)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cluster_with_nodes() -> Cluster {
        let mut cluster = Cluster::new(
            "harvester-one",
            ClusterSpec {
                harvester_version: "v1.2.0".to_string(),
                nodes: vec![
                    NodeConfig {
                        inventory_reference: ObjectReference::new("firstnode"),
                        address_pool_reference: ObjectReference::new("management-pool"),
                    },
                    NodeConfig {
                        inventory_reference: ObjectReference::with_namespace("secondnode", "other"),
                        address_pool_reference: ObjectReference::new("management-pool"),
                    },
                ],
                ..Default::default()
            },
        );
        cluster.metadata.namespace = Some("default".to_string());
        cluster
    }

    #[test]
    fn test_node_for_resolves_namespaces() {
        let cluster = cluster_with_nodes();
        assert_eq!(cluster.node_for("firstnode", "default").map(|(i, _)| i), Some(0));
        assert_eq!(cluster.node_for("secondnode", "other").map(|(i, _)| i), Some(1));
        assert!(cluster.node_for("secondnode", "default").is_none());
    }

    #[test]
    fn test_address_and_token_requires_both() {
        let mut cluster = cluster_with_nodes();
        assert!(cluster.address_and_token().is_none());

        cluster.status = Some(ClusterStatus {
            cluster_address: "192.168.1.100".to_string(),
            ..Default::default()
        });
        assert!(cluster.address_and_token().is_none());

        if let Some(status) = cluster.status.as_mut() {
            status.cluster_token = "token".to_string();
        }
        assert_eq!(cluster.address_and_token(), Some(("192.168.1.100", "token")));
    }

    #[test]
    fn test_spec_field_names() {
        let json = serde_json::json!({
            "harvesterVersion": "v1.1.2",
            "imageURL": "https://releases.rancher.com/harvester",
            "vipConfig": {
                "addressPoolReference": {"name": "vip-pool"},
                "staticAddress": "192.168.1.100"
            },
            "clusterConfig": {
                "configURL": "http://endpoint",
                "customProvisioningTemplate": "override-template"
            },
            "bondOptions": {"mode": "active-backup"}
        });
        let spec: ClusterSpec = serde_json::from_value(json).expect("deserialize");
        assert_eq!(spec.image_url, "https://releases.rancher.com/harvester");
        assert_eq!(spec.vip_config.static_address.as_deref(), Some("192.168.1.100"));
        assert_eq!(spec.cluster_config.config_url, "http://endpoint");
        assert_eq!(
            spec.bond_options.as_ref().and_then(|b| b.get("mode")).map(String::as_str),
            Some("active-backup")
        );
    }
}
