//! Main controller implementation.
//!
//! Starts one watcher per seeder resource kind plus the webhook server and
//! runs until any of them exits.

use crate::config::ControllerConfig;
use crate::error::ControllerError;
use crate::metrics::Metrics;
use crate::reconciler::Reconciler;
use crate::server::{self, AppState, KubeNetbootStore};
use crate::watcher::Watcher;
use kube::Client;
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::info;

/// Seeder controller: AddressPool, Cluster and Inventory watchers plus the webhook server.
pub struct Controller {
    address_pool_watcher: JoinHandle<Result<(), ControllerError>>,
    cluster_watcher: JoinHandle<Result<(), ControllerError>>,
    inventory_watcher: JoinHandle<Result<(), ControllerError>>,
    webhook_server: JoinHandle<Result<(), ControllerError>>,
}

impl Controller {
    /// Creates a new controller instance.
    pub async fn new(config: ControllerConfig, metrics: Metrics) -> Result<Self, ControllerError> {
        info!("Initializing Seeder Controller");

        let client = Client::try_default().await?;

        let webhook_addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, config.endpoint.webhook_port));
        let state = AppState {
            store: Arc::new(KubeNetbootStore::new(client.clone())),
            metrics: metrics.clone(),
        };

        let namespace = config.watch_namespace.clone();
        let reconciler = Arc::new(Reconciler::new(client.clone(), config, metrics));
        let watcher_instance = Arc::new(Watcher::new(client, namespace.as_deref(), reconciler));

        let address_pool_watcher = {
            let watcher = watcher_instance.clone();
            tokio::spawn(async move { watcher.watch_address_pools().await })
        };

        let cluster_watcher = {
            let watcher = watcher_instance.clone();
            tokio::spawn(async move { watcher.watch_clusters().await })
        };

        let inventory_watcher = {
            let watcher = watcher_instance;
            tokio::spawn(async move { watcher.watch_inventories().await })
        };

        let webhook_server = tokio::spawn(server::serve(webhook_addr, state));

        Ok(Self {
            address_pool_watcher,
            cluster_watcher,
            inventory_watcher,
            webhook_server,
        })
    }

    /// Runs the controller until shutdown.
    pub async fn run(mut self) -> Result<(), ControllerError> {
        info!("Seeder Controller running");

        // Watchers and the server should run forever
        tokio::select! {
            result = &mut self.address_pool_watcher => {
                result.map_err(|e| ControllerError::Watch(format!("AddressPool watcher panicked: {}", e)))?
                    .map_err(|e| ControllerError::Watch(format!("AddressPool watcher error: {}", e)))?;
            }
            result = &mut self.cluster_watcher => {
                result.map_err(|e| ControllerError::Watch(format!("Cluster watcher panicked: {}", e)))?
                    .map_err(|e| ControllerError::Watch(format!("Cluster watcher error: {}", e)))?;
            }
            result = &mut self.inventory_watcher => {
                result.map_err(|e| ControllerError::Watch(format!("Inventory watcher panicked: {}", e)))?
                    .map_err(|e| ControllerError::Watch(format!("Inventory watcher error: {}", e)))?;
            }
            result = &mut self.webhook_server => {
                result.map_err(|e| ControllerError::Watch(format!("Webhook server panicked: {}", e)))??;
            }
        }

        Ok(())
    }
}
