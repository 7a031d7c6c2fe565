//! Harvester install configuration.
//!
//! The document handed to the Harvester installer as user data. Field names
//! follow the installer's configuration schema; empty fields are omitted so
//! the rendered YAML only carries what the seeder decided.

use crate::endpoint::ResolvedEndpoints;
use crate::error::ArtifactError;
use crate::mechanism::{InstallMechanism, NodeRole};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

/// Schema version of the install configuration
pub const SCHEME_VERSION: u32 = 1;

/// Event the completion webhook fires on
pub const WEBHOOK_EVENT: &str = "SUCCEEDED";

/// Method of the completion webhook
pub const WEBHOOK_METHOD: &str = "PUT";

/// Bond mode used when the cluster doesn't override bonding
pub const DEFAULT_BOND_MODE: &str = "balance-tlb";

/// Link monitoring interval (ms) used when the cluster doesn't override bonding
pub const DEFAULT_BOND_MIIMON: &str = "100";

fn is_false(value: &bool) -> bool {
    !*value
}

fn is_zero(value: &u32) -> bool {
    *value == 0
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct HarvesterConfig {
    #[serde(skip_serializing_if = "is_zero")]
    pub scheme_version: u32,

    #[serde(skip_serializing_if = "String::is_empty")]
    pub server_url: String,

    #[serde(skip_serializing_if = "String::is_empty")]
    pub token: String,

    pub os: OsConfig,

    pub install: Install,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct OsConfig {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub ssh_authorized_keys: Vec<String>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub dns_nameservers: Vec<String>,

    #[serde(skip_serializing_if = "String::is_empty")]
    pub password: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Install {
    #[serde(skip_serializing_if = "is_false")]
    pub automatic: bool,

    #[serde(skip_serializing_if = "String::is_empty")]
    pub mode: String,

    pub management_interface: Network,

    #[serde(skip_serializing_if = "String::is_empty")]
    pub vip: String,

    #[serde(skip_serializing_if = "String::is_empty")]
    pub vip_mode: String,

    #[serde(skip_serializing_if = "String::is_empty")]
    pub device: String,

    #[serde(skip_serializing_if = "String::is_empty")]
    pub config_url: String,

    #[serde(skip_serializing_if = "String::is_empty")]
    pub iso_url: String,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub webhooks: Vec<Webhook>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Network {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub interfaces: Vec<NetworkInterface>,

    #[serde(skip_serializing_if = "String::is_empty")]
    pub method: String,

    #[serde(skip_serializing_if = "String::is_empty")]
    pub ip: String,

    #[serde(skip_serializing_if = "String::is_empty")]
    pub subnet_mask: String,

    #[serde(skip_serializing_if = "String::is_empty")]
    pub gateway: String,

    #[serde(skip_serializing_if = "is_false")]
    pub default_route: bool,

    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub bond_options: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct NetworkInterface {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub name: String,

    #[serde(skip_serializing_if = "String::is_empty")]
    pub hw_addr: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Webhook {
    pub event: String,
    pub method: String,
    pub url: String,
}

/// Bond options for the management interface
///
/// The cluster's map is used verbatim when set; otherwise `balance-tlb`
/// with a 100ms link monitor.
pub fn bond_options(cluster_override: Option<&BTreeMap<String, String>>) -> BTreeMap<String, String> {
    match cluster_override {
        Some(options) => options.clone(),
        None => BTreeMap::from([
            ("mode".to_string(), DEFAULT_BOND_MODE.to_string()),
            ("miimon".to_string(), DEFAULT_BOND_MIIMON.to_string()),
        ]),
    }
}

/// Inputs for one node's install configuration
#[derive(Debug, Clone)]
pub struct InstallConfigParams<'a> {
    pub name: &'a str,
    pub namespace: &'a str,
    pub role: NodeRole,
    pub mechanism: InstallMechanism,

    /// Cluster VIP
    pub cluster_address: &'a str,
    pub token: &'a str,
    pub password: &'a str,

    pub mac_address: &'a str,
    pub address: &'a str,
    pub netmask: &'a str,
    pub gateway: &'a str,
    pub bond_options: &'a BTreeMap<String, String>,

    pub nameservers: &'a [String],
    pub ssh_keys: &'a [String],

    /// Remote config for streaming installs
    pub config_url: &'a str,
    /// Base URL of the Harvester release artifacts
    pub image_url: &'a str,
    pub version: &'a str,

    pub endpoints: &'a ResolvedEndpoints,
}

impl HarvesterConfig {
    /// Build the install configuration for a node
    pub fn build(params: &InstallConfigParams<'_>) -> Self {
        let mut config = HarvesterConfig {
            scheme_version: SCHEME_VERSION,
            token: params.token.to_string(),
            os: OsConfig {
                ssh_authorized_keys: params.ssh_keys.to_vec(),
                dns_nameservers: params.nameservers.to_vec(),
                password: params.password.to_string(),
            },
            install: Install {
                automatic: true,
                mode: params.role.as_str().to_string(),
                management_interface: Network {
                    interfaces: vec![NetworkInterface {
                        name: String::new(),
                        hw_addr: params.mac_address.to_string(),
                    }],
                    method: "static".to_string(),
                    ip: params.address.to_string(),
                    subnet_mask: params.netmask.to_string(),
                    gateway: params.gateway.to_string(),
                    default_route: true,
                    bond_options: params.bond_options.clone(),
                },
                config_url: params.config_url.to_string(),
                ..Default::default()
            },
            ..Default::default()
        };

        match params.role {
            NodeRole::Join => {
                config.server_url = format!("https://{}:443", params.cluster_address);
            }
            NodeRole::Create => {
                config.install.vip = params.cluster_address.to_string();
                config.install.vip_mode = "static".to_string();
            }
        }

        if params.mechanism.is_legacy() {
            config.install.config_url = String::new();
            config.install.iso_url = iso_url(params.image_url, params.version);
            config.install.webhooks = vec![Webhook {
                event: WEBHOOK_EVENT.to_string(),
                method: WEBHOOK_METHOD.to_string(),
                url: params.endpoints.webhook_url(params.namespace, params.name),
            }];
        }

        debug!(
            "Built {} install configuration for {}/{} ({})",
            params.role, params.namespace, params.name, params.mechanism
        );
        config
    }

    /// Render as YAML
    pub fn to_yaml(&self) -> Result<String, ArtifactError> {
        Ok(serde_yaml::to_string(self)?)
    }
}

/// ISO location for a legacy install
pub fn iso_url(image_url: &str, version: &str) -> String {
    format!("{image_url}/{version}/harvester-{version}-amd64.iso")
}

#[cfg(test)]
#[path = "install_config_test.rs"]
mod install_config_test;
