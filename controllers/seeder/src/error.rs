//! Controller-specific error types.

use address_pool::PoolError;
use install_artifacts::GenerationError;
use kube::Error as KubeError;
use thiserror::Error;

/// Errors that can occur in the Seeder Controller.
#[derive(Debug, Error)]
pub enum ControllerError {
    /// Kubernetes API error
    #[error("Kubernetes error: {0}")]
    Kube(#[from] KubeError),

    /// Install artifact generation failed
    #[error(transparent)]
    Generation(#[from] GenerationError),

    /// Address pool validation or allocation failed
    #[error("Address pool error: {0}")]
    Pool(#[from] PoolError),

    /// A status or patch body could not be serialized
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Metrics registration failed
    #[error("Metrics error: {0}")]
    Metrics(#[from] prometheus::Error),

    /// Referenced resource does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Finalizer add, remove or cleanup failed
    #[error("Finalizer error: {0}")]
    Finalizer(#[source] Box<kube_runtime::finalizer::Error<ControllerError>>),

    /// HTTP server failed
    #[error("Server error: {0}")]
    Server(#[from] std::io::Error),

    /// Resource watch failed
    #[error("Resource watch failed: {0}")]
    Watch(String),
}

impl ControllerError {
    /// Whether the resource is worth retrying without a spec change
    pub fn is_transient(&self) -> bool {
        match self {
            ControllerError::Generation(e) => e.is_transient(),
            ControllerError::Pool(PoolError::NotInitialised | PoolError::Exhausted(_)) => true,
            ControllerError::Pool(_) | ControllerError::InvalidConfig(_) => false,
            _ => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_errors() {
        assert!(ControllerError::Pool(PoolError::Exhausted("10.0.0.0/30".to_string())).is_transient());
        assert!(!ControllerError::Pool(PoolError::InvalidCidr("nope".to_string())).is_transient());
    }

    #[test]
    fn test_not_found_is_transient() {
        let err = ControllerError::NotFound("Cluster default/harvester-one".to_string());
        assert!(err.is_transient());
    }
}
