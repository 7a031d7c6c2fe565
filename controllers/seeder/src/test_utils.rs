//! Test utilities for unit testing reconcilers

use crds::{
    AddressPool, AddressPoolSpec, Cluster, ClusterSpec, Inventory, InventorySpec, InventoryStatus,
    NodeConfig, ObjectReference, VipConfig,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

/// Helper to create an AddressPool without status
pub fn create_test_address_pool(name: &str, namespace: &str, cidr: &str, gateway: &str) -> AddressPool {
    AddressPool {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(namespace.to_string()),
            resource_version: Some("1".to_string()),
            ..Default::default()
        },
        spec: AddressPoolSpec {
            cidr: cidr.to_string(),
            gateway: gateway.to_string(),
            ..Default::default()
        },
        status: None,
    }
}

/// Helper to create a Cluster in `default` listing the named inventories
pub fn create_test_cluster(name: &str, nodes: &[&str]) -> Cluster {
    let mut cluster = Cluster::new(
        name,
        ClusterSpec {
            harvester_version: "v1.2.0".to_string(),
            vip_config: VipConfig {
                address_pool_reference: ObjectReference::new("vip-pool"),
                static_address: None,
            },
            nodes: nodes
                .iter()
                .map(|node| NodeConfig {
                    inventory_reference: ObjectReference::new(*node),
                    address_pool_reference: ObjectReference::new("node-pool"),
                })
                .collect(),
            ..Default::default()
        },
    );
    cluster.metadata.namespace = Some("default".to_string());
    cluster
}

/// Helper to create an Inventory in `default`, optionally claimed by a cluster
pub fn create_test_inventory(name: &str, cluster: Option<&ObjectReference>) -> Inventory {
    let mut inventory = Inventory::new(
        name,
        InventorySpec {
            primary_disk: "/dev/sda".to_string(),
            management_interface_mac_address: "0c:c4:7a:6b:84:20".to_string(),
        },
    );
    inventory.metadata.namespace = Some("default".to_string());
    inventory.status = Some(InventoryStatus {
        cluster: cluster.cloned(),
        ..Default::default()
    });
    inventory
}
