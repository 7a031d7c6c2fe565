//! Kubernetes resource watchers.
//!
//! Each seeder resource kind gets its own `kube_runtime::Controller` driven
//! through the generic `watch_resource()` helper.

use crate::error::ControllerError;
use crate::reconcile_helpers::resource_key;
use crate::reconciler::Reconciler;
use crds::{AddressPool, Cluster, Inventory};
use futures::StreamExt;
use kube::{Api, Client, ResourceExt};
use kube_runtime::{Controller, watcher, controller::{Action, Config as ControllerConfig}};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};

type ReconcileFuture = Pin<Box<dyn Future<Output = Result<Action, ControllerError>> + Send>>;

/// Run a controller for `K` until its watch stream ends
///
/// Failures requeue with the resource's Fibonacci backoff and are counted in
/// the reconciliation metrics.
async fn watch_resource<K, F>(
    api: Api<K>,
    reconciler: Arc<Reconciler>,
    reconcile_fn: F,
    resource_name: &'static str,
) -> Result<(), ControllerError>
where
    K: kube::Resource + Clone + Send + Sync + 'static + std::fmt::Debug + serde::de::DeserializeOwned,
    K::DynamicType: Default + std::cmp::Eq + std::hash::Hash + Clone + std::fmt::Debug + Unpin,
    F: Fn(Arc<Reconciler>, Arc<K>) -> ReconcileFuture + Send + Sync + Clone + 'static,
{
    info!("Starting {} watcher", resource_name);

    let error_policy = move |obj: Arc<K>, error: &ControllerError, ctx: Arc<Reconciler>| {
        let key = resource_key(&obj.namespace().unwrap_or_default(), &obj.name_any());
        let delay = ctx.next_backoff(&key);
        error!("Reconciliation error for {} {}: {} (retrying in {:?})", resource_name, key, error, delay);
        Action::requeue(delay)
    };

    let reconcile = move |obj: Arc<K>, ctx: Arc<Reconciler>| {
        let reconcile_fn = reconcile_fn.clone();
        async move {
            debug!("Reconciling {} {}/{}", resource_name, obj.namespace().unwrap_or_default(), obj.name_any());

            let metrics = ctx.metrics.clone();
            match reconcile_fn(ctx, obj).await {
                Ok(action) => {
                    metrics.reconciled(resource_name, "ok");
                    Ok(action)
                }
                Err(e) => {
                    metrics.reconciled(resource_name, "error");
                    Err(e)
                }
            }
        }
    };

    let controller_config = ControllerConfig::default()
        .debounce(Duration::from_secs(5))
        .concurrency(3);

    Controller::new(api, watcher::Config::default())
        .with_config(controller_config)
        .run(reconcile, error_policy, reconciler)
        .for_each(|res| async move {
            if let Err(e) = res {
                error!("Controller error for {}: {}", resource_name, e);
            }
        })
        .await;

    Ok(())
}

/// Watches seeder resources for changes.
pub struct Watcher {
    reconciler: Arc<Reconciler>,
    address_pool_api: Api<AddressPool>,
    cluster_api: Api<Cluster>,
    inventory_api: Api<Inventory>,
}

impl Watcher {
    /// Watch a single namespace, or every namespace when `namespace` is `None`
    pub fn new(client: Client, namespace: Option<&str>, reconciler: Arc<Reconciler>) -> Self {
        Self {
            reconciler,
            address_pool_api: scoped_api(client.clone(), namespace),
            cluster_api: scoped_api(client.clone(), namespace),
            inventory_api: scoped_api(client, namespace),
        }
    }

    pub async fn watch_address_pools(&self) -> Result<(), ControllerError> {
        watch_resource(
            self.address_pool_api.clone(),
            self.reconciler.clone(),
            |reconciler, pool| Box::pin(async move { reconciler.reconcile_address_pool(&pool).await }),
            "AddressPool",
        )
        .await
    }

    pub async fn watch_clusters(&self) -> Result<(), ControllerError> {
        watch_resource(
            self.cluster_api.clone(),
            self.reconciler.clone(),
            |reconciler, cluster| Box::pin(async move { reconciler.reconcile_cluster(cluster).await }),
            "Cluster",
        )
        .await
    }

    pub async fn watch_inventories(&self) -> Result<(), ControllerError> {
        watch_resource(
            self.inventory_api.clone(),
            self.reconciler.clone(),
            |reconciler, inventory| Box::pin(async move { reconciler.reconcile_inventory(inventory).await }),
            "Inventory",
        )
        .await
    }
}

fn scoped_api<K>(client: Client, namespace: Option<&str>) -> Api<K>
where
    K: kube::Resource<Scope = k8s_openapi::NamespaceResourceScope>,
    K::DynamicType: Default,
{
    match namespace {
        Some(ns) => Api::namespaced(client, ns),
        None => Api::all(client),
    }
}
