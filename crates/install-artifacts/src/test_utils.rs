//! Test utilities for unit testing generators
//!
//! Fixtures mirror a two node cluster: `firstnode` creates `harvester-one`.

use crate::endpoint::{EndpointConfig, EndpointSource, ServiceEndpoint};
use crds::*;
use k8s_openapi::api::core::v1::{LoadBalancerIngress, LoadBalancerStatus};
use std::collections::BTreeMap;

/// Helper to create an inventory with a resolved lease
pub fn create_test_inventory(name: &str, namespace: &str) -> Inventory {
    let mut inventory = Inventory::new(
        name,
        InventorySpec {
            primary_disk: "/dev/sda".to_string(),
            management_interface_mac_address: "xx:xx:xx:xx:xx".to_string(),
        },
    );
    inventory.metadata.namespace = Some(namespace.to_string());
    inventory.status = Some(InventoryStatus {
        status: InventoryState::AddressAllocated,
        generated_password: "password".to_string(),
        cluster: Some(ObjectReference::with_namespace("harvester-one", namespace)),
        pxe_boot_interface: PxeBootInterface {
            address: "192.168.1.129".to_string(),
            netmask: "255.255.255.0".to_string(),
            gateway: "192.168.1.1".to_string(),
            name_servers: vec!["8.8.8.8".to_string(), "8.8.4.4".to_string()],
        },
        ..Default::default()
    });
    inventory
}

/// Helper to mark an inventory as the cluster creating node
pub fn make_create_node(inventory: &mut Inventory) {
    if let Some(status) = inventory.status.as_mut() {
        status.set_condition(ConditionType::HarvesterCreateNode, "");
    }
}

/// Helper to create a ready cluster at the given version
pub fn create_test_cluster(version: &str) -> Cluster {
    let mut cluster = Cluster::new(
        "harvester-one",
        ClusterSpec {
            harvester_version: version.to_string(),
            image_url: "https://releases.rancher.com/harvester".to_string(),
            vip_config: VipConfig {
                address_pool_reference: ObjectReference::new("management-pool"),
                static_address: Some("192.168.1.100".to_string()),
            },
            nodes: vec![NodeConfig {
                inventory_reference: ObjectReference::new("firstnode"),
                address_pool_reference: ObjectReference::new("management-pool"),
            }],
            cluster_config: ClusterConfig {
                ssh_keys: vec!["abc".to_string(), "def".to_string()],
                nameservers: vec!["8.8.8.8".to_string(), "8.8.4.4".to_string()],
                config_url: "http://endpoint".to_string(),
                custom_provisioning_template: String::new(),
            },
            bond_options: None,
        },
    );
    cluster.metadata.namespace = Some("default".to_string());
    cluster.status = Some(ClusterStatus {
        status: ClusterState::Ready,
        cluster_address: "192.168.1.100".to_string(),
        cluster_token: "token".to_string(),
        error: None,
    });
    cluster
}

/// Helper to build a load balancer status with one ingress IP
pub fn load_balancer(ip: &str) -> LoadBalancerStatus {
    LoadBalancerStatus {
        ingress: Some(vec![LoadBalancerIngress {
            ip: Some(ip.to_string()),
            ..Default::default()
        }]),
    }
}

/// Helper to create an endpoint source using ingress for both services
pub fn create_test_endpoint_source() -> EndpointSource {
    EndpointSource {
        config: EndpointConfig {
            ingress_enabled: true,
            ..Default::default()
        },
        seeder: ServiceEndpoint::new("harvester-seeder-endpoint", Some(load_balancer("10.53.0.10"))),
        tink_stack: Some(ServiceEndpoint::new("tink-stack", Some(load_balancer("10.53.0.20")))),
    }
}

/// Helper to build a bond option override
pub fn bond_override(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}
