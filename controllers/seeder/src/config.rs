//! Controller configuration.
//!
//! Read once at startup from environment variables. Parsing goes through a
//! lookup function so it can be exercised without touching the process
//! environment.

use crate::error::ControllerError;
use install_artifacts::endpoint::{DEFAULT_METADATA_PORT, DEFAULT_WEBHOOK_PORT};
use install_artifacts::EndpointConfig;
use std::env;

pub const DEFAULT_SEEDER_SERVICE: &str = "harvester-seeder-endpoint";
pub const DEFAULT_SEEDER_NAMESPACE: &str = "harvester-system";
pub const DEFAULT_TINK_STACK_SERVICE: &str = "tink-stack";
pub const DEFAULT_TINK_STACK_NAMESPACE: &str = "tink-system";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerConfig {
    /// Namespace to watch; all namespaces when unset
    pub watch_namespace: Option<String>,

    /// Callback endpoint discovery and ports
    pub endpoint: EndpointConfig,

    /// LoadBalancer service receiving completion webhooks
    pub seeder_service: String,
    pub seeder_namespace: String,

    /// Tinkerbell stack service hosting the metadata service
    pub tink_stack_service: String,
    pub tink_stack_namespace: String,
}

impl ControllerConfig {
    /// Load from the process environment
    pub fn from_env() -> Result<Self, ControllerError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load using `lookup` to resolve variables
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ControllerError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let get_or = |key: &str, default: &str| get(key).unwrap_or_else(|| default.to_string());
        let port = |key: &str, default: u16| -> Result<u16, ControllerError> {
            match get(key) {
                None => Ok(default),
                Some(value) => match value.parse::<u16>() {
                    Ok(port) if port != 0 => Ok(port),
                    _ => Err(ControllerError::InvalidConfig(format!(
                        "{key} must be a port number, got {value:?}"
                    ))),
                },
            }
        };

        Ok(Self {
            watch_namespace: get("WATCH_NAMESPACE"),
            endpoint: EndpointConfig {
                ingress_enabled: get("SEEDER_ENDPOINT_INGRESS_ENABLED").as_deref() == Some("true"),
                literal_endpoint: get("SEEDER_ENDPOINT_INGRESS_IP").unwrap_or_default(),
                webhook_port: port("SEEDER_WEBHOOK_PORT", DEFAULT_WEBHOOK_PORT)?,
                metadata_port: port("HEGEL_PORT", DEFAULT_METADATA_PORT)?,
            },
            seeder_service: get_or("SEEDER_ENDPOINT_SERVICE", DEFAULT_SEEDER_SERVICE),
            seeder_namespace: get_or("SEEDER_NAMESPACE", DEFAULT_SEEDER_NAMESPACE),
            tink_stack_service: get_or("TINK_STACK_SERVICE", DEFAULT_TINK_STACK_SERVICE),
            tink_stack_namespace: get_or("TINK_STACK_NAMESPACE", DEFAULT_TINK_STACK_NAMESPACE),
        })
    }
}
