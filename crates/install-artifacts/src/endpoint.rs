//! Network endpoint resolution.
//!
//! The installer needs to reach back into the cluster twice: the seeder
//! endpoint receives the completion webhook, and (for legacy installs) the
//! Tinkerbell metadata service serves the install configuration. Both are
//! exposed through LoadBalancer services whose ingress is populated
//! asynchronously, or through an operator supplied literal address.

use crate::error::ArtifactError;
use k8s_openapi::api::core::v1::{LoadBalancerIngress, LoadBalancerStatus, Service};
use tracing::{debug, warn};

/// Port the seeder endpoint listens on for completion webhooks
pub const DEFAULT_WEBHOOK_PORT: u16 = 9090;

/// Port the Tinkerbell metadata service (hegel) serves user data on
pub const DEFAULT_METADATA_PORT: u16 = 50061;

/// How the callback endpoint is discovered
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointConfig {
    /// Use the seeder service's load balancer ingress
    pub ingress_enabled: bool,

    /// Address used when ingress is disabled
    pub literal_endpoint: String,

    /// Port the completion webhook is sent to
    pub webhook_port: u16,

    /// Port of the metadata service referenced by legacy boot scripts
    pub metadata_port: u16,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            ingress_enabled: false,
            literal_endpoint: String::new(),
            webhook_port: DEFAULT_WEBHOOK_PORT,
            metadata_port: DEFAULT_METADATA_PORT,
        }
    }
}

/// A LoadBalancer service as seen at generation time
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ServiceEndpoint {
    /// Service name, used in error messages
    pub name: String,

    /// Load balancer status, if the service has one
    pub load_balancer: Option<LoadBalancerStatus>,
}

impl ServiceEndpoint {
    pub fn new(name: impl Into<String>, load_balancer: Option<LoadBalancerStatus>) -> Self {
        Self {
            name: name.into(),
            load_balancer,
        }
    }

    /// Snapshot a Service's name and load balancer status
    pub fn from_service(service: &Service) -> Self {
        Self {
            name: service.metadata.name.clone().unwrap_or_default(),
            load_balancer: service
                .status
                .as_ref()
                .and_then(|s| s.load_balancer.clone()),
        }
    }

    fn first_ingress(&self) -> Option<&LoadBalancerIngress> {
        self.load_balancer.as_ref()?.ingress.as_ref()?.first()
    }

    /// Address of the first ingress entry
    ///
    /// No ingress entry yet is transient. An entry without IP or hostname is not.
    fn ingress_address(&self) -> Result<String, ArtifactError> {
        let ingress = self
            .first_ingress()
            .ok_or_else(|| ArtifactError::EndpointNotReady(self.name.clone()))?;

        ingress
            .ip
            .as_deref()
            .filter(|ip| !ip.is_empty())
            .or_else(|| ingress.hostname.as_deref().filter(|h| !h.is_empty()))
            .map(str::to_string)
            .ok_or_else(|| ArtifactError::EndpointUnset(self.name.clone()))
    }
}

/// Everything needed to resolve the endpoints for one generation request
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EndpointSource {
    pub config: EndpointConfig,

    /// Service receiving completion webhooks
    pub seeder: ServiceEndpoint,

    /// Tinkerbell stack service hosting the metadata service. When absent the
    /// callback address is used for metadata as well.
    pub tink_stack: Option<ServiceEndpoint>,
}

/// Resolve the callback endpoint address
///
/// With ingress enabled the service must already have an ingress entry,
/// otherwise the caller should retry. With ingress disabled the literal is
/// used. An empty result is a configuration error.
pub fn resolve_endpoint(config: &EndpointConfig, service: &ServiceEndpoint) -> Result<String, ArtifactError> {
    let address = if config.ingress_enabled {
        service.ingress_address()?
    } else {
        config.literal_endpoint.trim().to_string()
    };

    if address.is_empty() {
        return Err(ArtifactError::EndpointUnset(service.name.clone()));
    }

    debug!("Resolved endpoint for service {} to {}", service.name, address);
    Ok(address)
}

/// Hosts and ports the installer calls back to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedEndpoints {
    pub callback_host: String,
    pub metadata_host: String,
    pub webhook_port: u16,
    pub metadata_port: u16,
}

impl ResolvedEndpoints {
    /// Resolve both endpoints
    ///
    /// The metadata host is only consulted by legacy installs, so callers pass
    /// `need_metadata = false` for streaming installs to avoid waiting on the
    /// Tinkerbell stack's load balancer. With ingress disabled the literal
    /// endpoint stands in for a tink-stack service without ingress.
    pub fn resolve(source: &EndpointSource, need_metadata: bool) -> Result<Self, ArtifactError> {
        let callback_host = resolve_endpoint(&source.config, &source.seeder)?;

        let metadata_host = match (&source.tink_stack, need_metadata) {
            (Some(tink_stack), true) if source.config.ingress_enabled => tink_stack.ingress_address()?,
            (Some(tink_stack), true) => match tink_stack.ingress_address() {
                Ok(address) => address,
                Err(e) => {
                    warn!(
                        "Metadata service {} has no usable ingress ({}), using literal endpoint {}",
                        tink_stack.name, e, callback_host
                    );
                    callback_host.clone()
                }
            },
            _ => callback_host.clone(),
        };

        Ok(Self {
            callback_host,
            metadata_host,
            webhook_port: source.config.webhook_port,
            metadata_port: source.config.metadata_port,
        })
    }

    /// URL the installed node calls to disable further netboot
    pub fn webhook_url(&self, namespace: &str, name: &str) -> String {
        format!(
            "http://{}:{}/disable/{}/{}",
            self.callback_host, self.webhook_port, namespace, name
        )
    }

    /// URL the legacy installer fetches its configuration from
    pub fn metadata_url(&self) -> String {
        format!(
            "http://{}:{}/2009-04-04/user-data",
            self.metadata_host, self.metadata_port
        )
    }
}
