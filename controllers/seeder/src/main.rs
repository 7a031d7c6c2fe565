//! Seeder Controller
//!
//! Provisions Harvester bare-metal nodes through Tinkerbell:
//! - AddressPool: validates pools and tracks address allocations
//! - Cluster: join token, VIP and node membership
//! - Inventory: leases, credentials and the Hardware/Workflow pair that
//!   installs the node
//!
//! Legacy installs report completion on the webhook server, which disables
//! netboot for the node.

mod backoff;
mod config;
mod controller;
mod error;
mod metrics;
mod reconcile_helpers;
mod reconciler;
mod server;
mod watcher;

#[cfg(test)]
mod test_utils;

use crate::config::ControllerConfig;
use crate::error::ControllerError;
use crate::metrics::Metrics;
use controller::Controller;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), ControllerError> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    if rustls::crypto::ring::default_provider().install_default().is_err() {
        warn!("A rustls crypto provider was already installed");
    }

    info!("Starting Seeder Controller");

    let config = ControllerConfig::from_env()?;

    info!("Configuration:");
    info!("  Namespace: {}", config.watch_namespace.as_deref().unwrap_or("all namespaces"));
    info!(
        "  Endpoint: {}",
        if config.endpoint.ingress_enabled {
            format!("ingress of {}/{}", config.seeder_namespace, config.seeder_service)
        } else {
            format!("literal {:?}", config.endpoint.literal_endpoint)
        }
    );
    info!("  Webhook port: {}", config.endpoint.webhook_port);
    info!("  Metadata service: {}/{} port {}", config.tink_stack_namespace, config.tink_stack_service, config.endpoint.metadata_port);

    let metrics = Metrics::new()?;
    let controller = Controller::new(config, metrics).await?;
    controller.run().await?;

    Ok(())
}
