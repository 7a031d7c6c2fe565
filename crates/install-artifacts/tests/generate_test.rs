//! End to end generation through the public API

use crds::*;
use install_artifacts::*;
use k8s_openapi::api::core::v1::{LoadBalancerIngress, LoadBalancerStatus};
use kube::ResourceExt;

const MAC: &str = "0c:c4:7a:6b:84:20";

fn inventory() -> Inventory {
    let mut inventory = Inventory::new(
        "node-a",
        InventorySpec {
            primary_disk: "/dev/nvme0n1".to_string(),
            management_interface_mac_address: MAC.to_string(),
        },
    );
    inventory.metadata.namespace = Some("racks".to_string());
    inventory.status = Some(InventoryStatus {
        status: InventoryState::AddressAllocated,
        generated_password: "s3cret".to_string(),
        pxe_boot_interface: PxeBootInterface {
            address: "10.10.0.21".to_string(),
            netmask: "255.255.255.0".to_string(),
            gateway: "10.10.0.1".to_string(),
            name_servers: vec![],
        },
        ..Default::default()
    });
    inventory
}

fn cluster(version: &str) -> Cluster {
    let mut cluster = Cluster::new(
        "lab",
        ClusterSpec {
            harvester_version: version.to_string(),
            image_url: "http://images.lab/harvester".to_string(),
            cluster_config: ClusterConfig {
                nameservers: vec!["10.10.0.2".to_string()],
                config_url: "http://config.lab/harvester.yaml".to_string(),
                ..Default::default()
            },
            ..Default::default()
        },
    );
    cluster.metadata.namespace = Some("racks".to_string());
    cluster.status = Some(ClusterStatus {
        status: ClusterState::Ready,
        cluster_address: "10.10.0.10".to_string(),
        cluster_token: "join-token".to_string(),
        error: None,
    });
    cluster
}

fn load_balancer(ips: &[&str]) -> Option<LoadBalancerStatus> {
    Some(LoadBalancerStatus {
        ingress: Some(
            ips.iter()
                .map(|ip| LoadBalancerIngress {
                    ip: Some(ip.to_string()),
                    ..Default::default()
                })
                .collect(),
        ),
    })
}

fn ingress_source(seeder_ips: &[&str]) -> EndpointSource {
    EndpointSource {
        config: EndpointConfig {
            ingress_enabled: true,
            ..Default::default()
        },
        seeder: ServiceEndpoint::new("harvester-seeder-endpoint", load_balancer(seeder_ips)),
        tink_stack: Some(ServiceEndpoint::new("tink-stack", load_balancer(&["10.10.0.250"]))),
    }
}

fn user_data(artifacts: &InstallArtifacts) -> HarvesterConfig {
    let yaml = artifacts
        .hardware
        .spec
        .user_data
        .as_deref()
        .expect("user data");
    serde_yaml::from_str(yaml).expect("valid install configuration")
}

#[test]
fn test_mac_address_is_consistent_across_artifacts() {
    for version in ["v1.1.2", "v1.2.1"] {
        let artifacts = generate_install_artifacts(&inventory(), &cluster(version), &ingress_source(&["10.10.0.200"]))
            .expect("generated");

        let dhcp = artifacts.hardware.spec.interfaces[0]
            .dhcp
            .as_ref()
            .expect("dhcp");
        assert_eq!(artifacts.hardware.spec.interfaces.len(), 1);
        assert_eq!(dhcp.mac, MAC);
        assert_eq!(
            artifacts.workflow.spec.hardware_map.get("device_1").map(String::as_str),
            Some(MAC)
        );

        let config = user_data(&artifacts);
        assert_eq!(config.install.management_interface.interfaces[0].hw_addr, MAC);
        assert_eq!(config.install.management_interface.ip, "10.10.0.21");
        assert_eq!(dhcp.ip.as_ref().map(|ip| ip.address.as_str()), Some("10.10.0.21"));
    }
}

#[test]
fn test_workflow_references_hardware() {
    let artifacts = generate_install_artifacts(&inventory(), &cluster("v1.2.1"), &ingress_source(&["10.10.0.200"]))
        .expect("generated");

    assert_eq!(artifacts.workflow.spec.hardware_ref, artifacts.hardware.name_any());
    assert_eq!(artifacts.workflow.namespace(), artifacts.hardware.namespace());
}

#[test]
fn test_legacy_artifacts() {
    let artifacts = generate_install_artifacts(&inventory(), &cluster("v1.1.2"), &ingress_source(&["10.10.0.200"]))
        .expect("generated");
    assert_eq!(artifacts.mechanism, InstallMechanism::Legacy);

    let config = user_data(&artifacts);
    assert!(config.install.config_url.is_empty());
    assert_eq!(
        config.install.iso_url,
        "http://images.lab/harvester/v1.1.2/harvester-v1.1.2-amd64.iso"
    );
    assert_eq!(config.install.webhooks.len(), 1);
    assert_eq!(
        config.install.webhooks[0].url,
        "http://10.10.0.200:9090/disable/racks/node-a"
    );

    let script = artifacts.hardware.spec.interfaces[0]
        .netboot
        .as_ref()
        .and_then(|n| n.ipxe.as_ref())
        .map(|i| i.contents.as_str())
        .expect("boot script");
    assert!(script.contains("harvester.install.config_url=http://10.10.0.250:50061/2009-04-04/user-data"));
    assert!(script.contains("harvester.install.management_interface.ip=10.10.0.21"));
    assert!(script.contains("harvester.install.device=/dev/nvme0n1"));
}

#[test]
fn test_streaming_artifacts() {
    let artifacts = generate_install_artifacts(&inventory(), &cluster("v1.2.1"), &ingress_source(&["10.10.0.200"]))
        .expect("generated");
    assert_eq!(artifacts.mechanism, InstallMechanism::Streaming);

    let config = user_data(&artifacts);
    assert_eq!(config.install.config_url, "http://config.lab/harvester.yaml");
    assert!(config.install.iso_url.is_empty());
    assert!(config.install.webhooks.is_empty());
    assert!(artifacts.hardware.spec.interfaces[0]
        .netboot
        .as_ref()
        .and_then(|n| n.ipxe.as_ref())
        .is_none());
}

#[test]
fn test_empty_ingress_is_transient() {
    let err = generate_install_artifacts(&inventory(), &cluster("v1.2.1"), &ingress_source(&[]))
        .expect_err("ingress not populated");

    assert_eq!(err.stage, Stage::ResolveEndpoint);
    assert!(matches!(err.source, ArtifactError::EndpointNotReady(_)));
    assert!(err.is_transient());
    assert_eq!((err.namespace.as_str(), err.name.as_str()), ("racks", "node-a"));
}

#[test]
fn test_missing_literal_is_fatal() {
    let source = EndpointSource {
        config: EndpointConfig::default(),
        seeder: ServiceEndpoint::new("harvester-seeder-endpoint", load_balancer(&["10.10.0.200"])),
        tink_stack: None,
    };

    let err = generate_install_artifacts(&inventory(), &cluster("v1.1.2"), &source)
        .expect_err("no literal endpoint");
    assert_eq!(err.stage, Stage::ResolveEndpoint);
    assert!(matches!(err.source, ArtifactError::EndpointUnset(_)));
    assert!(!err.is_transient());
}

#[test]
fn test_literal_endpoint_without_tink_stack() {
    let source = EndpointSource {
        config: EndpointConfig {
            literal_endpoint: "10.10.0.201".to_string(),
            ..Default::default()
        },
        seeder: ServiceEndpoint::new("harvester-seeder-endpoint", None),
        tink_stack: None,
    };

    let artifacts = generate_install_artifacts(&inventory(), &cluster("v1.1.2"), &source).expect("generated");
    let script = artifacts.hardware.spec.interfaces[0]
        .netboot
        .as_ref()
        .and_then(|n| n.ipxe.as_ref())
        .map(|i| i.contents.clone())
        .expect("boot script");
    assert!(script.contains("config_url=http://10.10.0.201:50061/2009-04-04/user-data"));
    assert_eq!(
        user_data(&artifacts).install.webhooks[0].url,
        "http://10.10.0.201:9090/disable/racks/node-a"
    );
}
