//! Artifact generation errors.
//!
//! `ArtifactError` says what went wrong; `GenerationError` adds which
//! inventory was being generated and which stage failed so callers can log,
//! retry or alert without re-deriving context.

use std::fmt;
use thiserror::Error;

/// What went wrong while generating install artifacts
#[derive(Debug, Error)]
pub enum ArtifactError {
    /// Load balancer has not published an ingress address yet (retry later)
    #[error("waiting for ingress to be populated on service {0}")]
    EndpointNotReady(String),

    /// Ingress is disabled and no literal endpoint is configured, or the
    /// ingress entry carries no address
    #[error("endpoint address for service {0} is unset: configure an ingress or a literal endpoint address")]
    EndpointUnset(String),

    /// Inventory has no resolved address/netmask/gateway
    #[error("inventory has no allocated address, netmask and gateway")]
    LeaseNotAllocated,

    /// Cluster has no VIP or token yet (retry later)
    #[error("cluster {0} has no address or token yet")]
    ClusterNotReady(String),

    /// Install configuration could not be serialized
    #[error("error marshalling install configuration: {0}")]
    Serialization(#[from] serde_yaml::Error),

    /// Boot script template failed to parse
    #[error("invalid boot script template: {0}")]
    Template(#[from] handlebars::TemplateError),

    /// Boot script template failed to render
    #[error("error generating boot script: {0}")]
    Render(#[from] handlebars::RenderError),
}

impl ArtifactError {
    /// Whether the caller should retry later rather than surface a failure
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ArtifactError::EndpointNotReady(_)
                | ArtifactError::LeaseNotAllocated
                | ArtifactError::ClusterNotReady(_)
        )
    }
}

/// Generation step that failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Checking the inventory and cluster are ready for generation
    Validate,
    /// Resolving the callback and metadata endpoints
    ResolveEndpoint,
    /// Building the install configuration document
    InstallConfig,
    /// Rendering the legacy iPXE script
    BootScript,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Stage::Validate => "validation",
            Stage::ResolveEndpoint => "endpoint resolution",
            Stage::InstallConfig => "install configuration",
            Stage::BootScript => "boot script generation",
        };
        f.write_str(s)
    }
}

/// Failure of a whole generation call
#[derive(Debug, Error)]
#[error("{stage} failed for inventory {namespace}/{name}: {source}")]
pub struct GenerationError {
    pub namespace: String,
    pub name: String,
    pub stage: Stage,
    #[source]
    pub source: ArtifactError,
}

impl GenerationError {
    /// Whether the caller should retry later
    pub fn is_transient(&self) -> bool {
        self.source.is_transient()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(ArtifactError::EndpointNotReady("svc".to_string()).is_transient());
        assert!(ArtifactError::LeaseNotAllocated.is_transient());
        assert!(!ArtifactError::EndpointUnset("svc".to_string()).is_transient());
    }

    #[test]
    fn test_generation_error_message_carries_context() {
        let err = GenerationError {
            namespace: "default".to_string(),
            name: "firstnode".to_string(),
            stage: Stage::ResolveEndpoint,
            source: ArtifactError::EndpointNotReady("harvester-seeder-endpoint".to_string()),
        };
        assert_eq!(
            err.to_string(),
            "endpoint resolution failed for inventory default/firstnode: \
             waiting for ingress to be populated on service harvester-seeder-endpoint"
        );
        assert!(err.is_transient());
    }
}
