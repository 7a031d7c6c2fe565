//! Tinkerbell Hardware builder

use crate::mechanism::InstallMechanism;
use crds::{
    Cluster, Dhcp, Disk, Hardware, HardwareMetadata, HardwareSpec, Interface, Inventory, Ip, Ipxe,
    MetadataFacility, MetadataInstance, MetadataInstanceOperatingSystem, Netboot, PxeBootInterface,
};
use kube::ResourceExt;

/// DHCP lease duration in seconds
pub const DEFAULT_LEASE_TIME: i64 = 86400;

pub const DEFAULT_ARCH: &str = "x86_64";

pub const DEFAULT_FACILITY_CODE: &str = "on_prem";

pub const DEFAULT_DISTRO: &str = "harvester";

/// Documents embedded in the Hardware object, keyed by install mechanism
///
/// Only a legacy install carries an iPXE script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstallDocuments {
    Legacy {
        /// Serialized install configuration, served as user data
        install_config: String,
        /// Inline iPXE script attached to the interface
        boot_script: String,
    },
    Streaming {
        install_config: String,
    },
}

impl InstallDocuments {
    pub fn mechanism(&self) -> InstallMechanism {
        match self {
            InstallDocuments::Legacy { .. } => InstallMechanism::Legacy,
            InstallDocuments::Streaming { .. } => InstallMechanism::Streaming,
        }
    }
}

/// Build the Hardware object for an inventory
///
/// The object shares the inventory's name and namespace. Netboot is always
/// allowed; the completion webhook (legacy) or workflow (streaming) turns it
/// off once the node is installed. `version` is the normalised Harvester
/// version recorded in the instance metadata.
pub fn build_hardware(
    inventory: &Inventory,
    cluster: &Cluster,
    lease: &PxeBootInterface,
    version: &str,
    documents: InstallDocuments,
) -> Hardware {
    let name = inventory.name_any();
    let namespace = inventory.namespace().unwrap_or_default();

    let (install_config, ipxe) = match documents {
        InstallDocuments::Legacy {
            install_config,
            boot_script,
        } => (
            install_config,
            Some(Ipxe {
                url: String::new(),
                contents: boot_script,
            }),
        ),
        InstallDocuments::Streaming { install_config } => (install_config, None),
    };

    let spec = HardwareSpec {
        user_data: Some(install_config),
        interfaces: vec![Interface {
            netboot: Some(Netboot {
                allow_pxe: Some(true),
                allow_workflow: Some(true),
                ipxe,
            }),
            dhcp: Some(Dhcp {
                mac: inventory.spec.management_interface_mac_address.clone(),
                hostname: format!("{name}-{namespace}"),
                lease_time: DEFAULT_LEASE_TIME,
                name_servers: cluster.spec.cluster_config.nameservers.clone(),
                arch: DEFAULT_ARCH.to_string(),
                uefi: true,
                ip: Some(Ip {
                    address: lease.address.clone(),
                    netmask: lease.netmask.clone(),
                    gateway: lease.gateway.clone(),
                }),
            }),
        }],
        disks: vec![Disk {
            device: inventory.spec.primary_disk.clone(),
        }],
        metadata: Some(HardwareMetadata {
            facility: Some(MetadataFacility {
                facility_code: DEFAULT_FACILITY_CODE.to_string(),
            }),
            instance: Some(MetadataInstance {
                operating_system: Some(MetadataInstanceOperatingSystem {
                    distro: DEFAULT_DISTRO.to_string(),
                    version: version.to_string(),
                }),
            }),
        }),
    };

    let mut hardware = Hardware::new(&name, spec);
    hardware.metadata.namespace = Some(namespace);
    hardware
}
