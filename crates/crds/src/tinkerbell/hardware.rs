//! Tinkerbell Hardware CRD
//!
//! Mirrors the subset of `tinkerbell.org/v1alpha1` Hardware that the seeder
//! writes: DHCP lease, netboot flags, optional inline iPXE script, disks,
//! metadata and the install configuration carried as user data.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(CustomResource, Debug, Clone, Default, Serialize, Deserialize, JsonSchema, PartialEq)]
#[kube(
    group = "tinkerbell.org",
    version = "v1alpha1",
    kind = "Hardware",
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct HardwareSpec {
    /// Install configuration served by the metadata service
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_data: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub interfaces: Vec<Interface>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub disks: Vec<Disk>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<HardwareMetadata>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default, PartialEq)]
pub struct Interface {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub netboot: Option<Netboot>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dhcp: Option<Dhcp>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default, PartialEq)]
pub struct Netboot {
    #[serde(default, rename = "allowPXE", skip_serializing_if = "Option::is_none")]
    pub allow_pxe: Option<bool>,

    #[serde(default, rename = "allowWorkflow", skip_serializing_if = "Option::is_none")]
    pub allow_workflow: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ipxe: Option<Ipxe>,
}

/// Either a URL to chain-load or an inline script
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default, PartialEq)]
pub struct Ipxe {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub url: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub contents: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default, PartialEq)]
pub struct Dhcp {
    pub mac: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub hostname: String,

    /// Lease duration in seconds
    #[serde(default)]
    pub lease_time: i64,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub name_servers: Vec<String>,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub arch: String,

    #[serde(default)]
    pub uefi: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip: Option<Ip>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default, PartialEq, Eq)]
pub struct Ip {
    pub address: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub netmask: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub gateway: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default, PartialEq, Eq)]
pub struct Disk {
    pub device: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default, PartialEq)]
pub struct HardwareMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub facility: Option<MetadataFacility>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instance: Option<MetadataInstance>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default, PartialEq, Eq)]
pub struct MetadataFacility {
    pub facility_code: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default, PartialEq)]
pub struct MetadataInstance {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operating_system: Option<MetadataInstanceOperatingSystem>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default, PartialEq, Eq)]
pub struct MetadataInstanceOperatingSystem {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub distro: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub version: String,
}

impl HardwareSpec {
    /// Turn off PXE and workflow netboot on every interface
    ///
    /// Returns true if any interface was still allowed to netboot.
    pub fn disable_netboot(&mut self) -> bool {
        let mut changed = false;
        for netboot in self.interfaces.iter_mut().filter_map(|i| i.netboot.as_mut()) {
            if netboot.allow_pxe != Some(false) || netboot.allow_workflow != Some(false) {
                netboot.allow_pxe = Some(false);
                netboot.allow_workflow = Some(false);
                changed = true;
            }
        }
        changed
    }
}
