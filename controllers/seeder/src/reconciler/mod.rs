//! Reconciliation logic for seeder resources.
//!
//! - `pool`: validates pools and keeps their status current
//! - `cluster`: join token, VIP and node membership
//! - `inventory`: leases, credentials and Tinkerbell Hardware/Workflow

pub mod pool;
pub mod cluster;
pub mod inventory;

use crate::backoff::FibonacciBackoff;
use crate::config::ControllerConfig;
use crate::error::ControllerError;
use crate::metrics::Metrics;
use crate::reconcile_helpers::pool_status_patch;
use address_pool::Lease;
use crds::{AddressPool, ObjectReference};
use kube::api::{Patch, PatchParams};
use kube::{Api, Client, ResourceExt};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Field manager for status patches and server-side apply
pub const FIELD_MANAGER: &str = "seeder";

/// Short requeue while waiting on another resource this controller manages
pub const WAIT_REQUEUE: Duration = Duration::from_secs(30);

/// Reconciles seeder resources.
pub struct Reconciler {
    pub(crate) client: Client,
    pub(crate) config: ControllerConfig,
    pub(crate) metrics: Metrics,
    /// Backoff per resource (namespace/name -> backoff)
    backoff_states: Arc<Mutex<HashMap<String, FibonacciBackoff>>>,
}

impl Reconciler {
    pub fn new(client: Client, config: ControllerConfig, metrics: Metrics) -> Self {
        Self {
            client,
            config,
            metrics,
            backoff_states: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Namespaced API for `K`
    pub(crate) fn api<K>(&self, namespace: &str) -> Api<K>
    where
        K: kube::Resource<Scope = k8s_openapi::NamespaceResourceScope>,
        K::DynamicType: Default,
    {
        Api::namespaced(self.client.clone(), namespace)
    }

    /// Next backoff delay for a resource
    pub fn next_backoff(&self, resource_key: &str) -> Duration {
        match self.backoff_states.lock() {
            Ok(mut states) => states
                .entry(resource_key.to_string())
                .or_default()
                .next_backoff(),
            Err(e) => {
                warn!("Failed to lock backoff_states: {}, using default backoff", e);
                Duration::from_secs(60)
            }
        }
    }

    /// Forget a resource's backoff after a successful reconcile
    pub fn reset_backoff(&self, resource_key: &str) {
        if let Ok(mut states) = self.backoff_states.lock() {
            states.remove(resource_key);
        }
    }

    /// Allocate an address for `owner` from a pool and persist the pool
    ///
    /// The pool status is written with its resourceVersion, so a concurrent
    /// allocation surfaces as a conflict and the caller retries against the
    /// fresh pool.
    pub(crate) async fn allocate_from_pool(
        &self,
        pool_ref: &ObjectReference,
        default_namespace: &str,
        owner: &ObjectReference,
    ) -> Result<Lease, ControllerError> {
        let namespace = pool_ref.namespace_or(default_namespace);
        let api: Api<AddressPool> = self.api(namespace);
        let pool = api
            .get_opt(&pool_ref.name)
            .await?
            .ok_or_else(|| ControllerError::NotFound(format!("AddressPool {namespace}/{}", pool_ref.name)))?;

        let mut status = pool.status.clone().unwrap_or_default();
        let before = status.clone();
        let lease = address_pool::allocate(&pool.spec, &mut status, owner)?;

        if status != before {
            let patch = pool_status_patch(pool.resource_version().as_deref(), &status, &[])?;
            api.patch_status(&pool_ref.name, &PatchParams::default(), &Patch::Merge(&patch))
                .await?;
            info!(
                "Allocated {} from AddressPool {}/{} to {}",
                lease.address, namespace, pool_ref.name, owner
            );
        } else {
            debug!("{} already holds {} in AddressPool {}/{}", owner, lease.address, namespace, pool_ref.name);
        }
        Ok(lease)
    }

    /// Release whatever `owner` holds in any pool of `namespace`
    pub(crate) async fn release_from_pools(
        &self,
        namespace: &str,
        owner: &ObjectReference,
    ) -> Result<(), ControllerError> {
        let api: Api<AddressPool> = self.api(namespace);
        for pool in api.list(&Default::default()).await? {
            let Some(mut status) = pool.status.clone() else {
                continue;
            };
            let Some(address) = address_pool::release(&mut status, owner) else {
                continue;
            };

            let name = pool.name_any();
            let patch = pool_status_patch(pool.resource_version().as_deref(), &status, &[address.to_string()])?;
            api.patch_status(&name, &PatchParams::default(), &Patch::Merge(&patch))
                .await?;
            info!("Released {} from AddressPool {}/{} held by {}", address, namespace, name, owner);
        }
        Ok(())
    }
}
