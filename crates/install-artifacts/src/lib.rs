//! Install Artifacts
//!
//! Compiles an `Inventory` (one bare-metal node) and the `Cluster` it belongs
//! to into what Tinkerbell needs to provision it:
//!
//! - a `Hardware` object carrying the DHCP lease, netboot flags and the
//!   Harvester install configuration as user data
//! - a `Workflow` binding the provisioning template to that hardware
//! - for legacy Harvester versions, an inline iPXE script and a completion
//!   webhook instead of a streaming install
//!
//! Everything here is synchronous and side effect free. Waiting on a load
//! balancer is expressed as a transient error the caller retries.

pub mod boot_script;
pub mod endpoint;
pub mod error;
pub mod generate;
pub mod hardware;
pub mod install_config;
pub mod mechanism;
pub mod workflow;

#[cfg(test)]
pub mod test_utils;

pub use endpoint::{EndpointConfig, EndpointSource, ResolvedEndpoints, ServiceEndpoint, resolve_endpoint};
pub use error::{ArtifactError, GenerationError, Stage};
pub use generate::{InstallArtifacts, generate_install_artifacts};
pub use install_config::HarvesterConfig;
pub use mechanism::{InstallMechanism, NodeRole};
pub use workflow::generate_workflow;
