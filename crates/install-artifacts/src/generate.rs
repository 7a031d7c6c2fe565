//! Install artifact orchestration.
//!
//! Resolves endpoints, synthesizes the install configuration and (for legacy
//! versions) the boot script, then builds the Hardware and Workflow objects.
//! Every value that must agree across artifacts is read once here.

use crate::boot_script::{render_boot_script, BootScriptParams};
use crate::endpoint::{EndpointSource, ResolvedEndpoints};
use crate::error::{ArtifactError, GenerationError, Stage};
use crate::hardware::{build_hardware, InstallDocuments};
use crate::install_config::{bond_options, HarvesterConfig, InstallConfigParams};
use crate::mechanism::{InstallMechanism, NodeRole};
use crate::workflow::generate_workflow;
use crds::{Cluster, Hardware, Inventory, Workflow};
use kube::ResourceExt;
use tracing::{debug, info};

/// The objects submitted to the provisioning backend for one inventory
#[derive(Debug, Clone)]
pub struct InstallArtifacts {
    pub hardware: Hardware,
    pub workflow: Workflow,
    pub mechanism: InstallMechanism,
    pub role: NodeRole,
}

/// Generate the Hardware and Workflow for an inventory joining a cluster
///
/// Fails atomically: either both objects are returned or a
/// [`GenerationError`] naming the inventory and the failed stage.
pub fn generate_install_artifacts(
    inventory: &Inventory,
    cluster: &Cluster,
    source: &EndpointSource,
) -> Result<InstallArtifacts, GenerationError> {
    let name = inventory.name_any();
    let namespace = inventory.namespace().unwrap_or_default();
    let fail = |stage: Stage| {
        let name = name.clone();
        let namespace = namespace.clone();
        move |source: ArtifactError| GenerationError {
            namespace,
            name,
            stage,
            source,
        }
    };

    let lease = inventory
        .lease()
        .ok_or(ArtifactError::LeaseNotAllocated)
        .map_err(fail(Stage::Validate))?;
    let (cluster_address, token) = cluster
        .address_and_token()
        .ok_or_else(|| ArtifactError::ClusterNotReady(cluster.name_any()))
        .map_err(fail(Stage::Validate))?;

    let version = cluster.spec.harvester_version.trim();
    let mechanism = InstallMechanism::for_version(version);
    let role = NodeRole::of(inventory);
    debug!(
        "Generating {} {} artifacts for inventory {}/{} (version {})",
        mechanism, role, namespace, name, version
    );

    let endpoints = ResolvedEndpoints::resolve(source, mechanism.is_legacy())
        .map_err(fail(Stage::ResolveEndpoint))?;

    let password = inventory
        .status
        .as_ref()
        .map(|s| s.generated_password.as_str())
        .unwrap_or_default();
    let mac_address = inventory.spec.management_interface_mac_address.as_str();
    let bond = bond_options(cluster.spec.bond_options.as_ref());
    let cluster_config = &cluster.spec.cluster_config;

    let install_config = HarvesterConfig::build(&InstallConfigParams {
        name: &name,
        namespace: &namespace,
        role,
        mechanism,
        cluster_address,
        token,
        password,
        mac_address,
        address: &lease.address,
        netmask: &lease.netmask,
        gateway: &lease.gateway,
        bond_options: &bond,
        nameservers: &cluster_config.nameservers,
        ssh_keys: &cluster_config.ssh_keys,
        config_url: &cluster_config.config_url,
        image_url: &cluster.spec.image_url,
        version,
        endpoints: &endpoints,
    })
    .to_yaml()
    .map_err(fail(Stage::InstallConfig))?;

    let documents = match mechanism {
        InstallMechanism::Legacy => InstallDocuments::Legacy {
            boot_script: render_boot_script(&BootScriptParams {
                version,
                image_url: &cluster.spec.image_url,
                metadata_url: &endpoints.metadata_url(),
                mac_address,
                disk: &inventory.spec.primary_disk,
                address: &lease.address,
                netmask: &lease.netmask,
                gateway: &lease.gateway,
                bond_options: &bond,
            })
            .map_err(fail(Stage::BootScript))?,
            install_config,
        },
        InstallMechanism::Streaming => InstallDocuments::Streaming { install_config },
    };

    let hardware = build_hardware(inventory, cluster, lease, version, documents);
    let workflow = generate_workflow(inventory, cluster);

    info!(
        "Generated install artifacts for inventory {}/{} ({} via {})",
        namespace, name, role, mechanism
    );
    Ok(InstallArtifacts {
        hardware,
        workflow,
        mechanism,
        role,
    })
}
