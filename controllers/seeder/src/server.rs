//! HTTP endpoint for installer callbacks, probes and metrics.
//!
//! Legacy installs finish with `PUT /disable/{namespace}/{name}`. The handler
//! turns off netboot on the node's Hardware so the next reboot lands on disk,
//! then marks the inventory provisioned.

use crate::error::ControllerError;
use crate::metrics::Metrics;
use crate::reconcile_helpers::{mark_provisioned, status_patch};
use async_trait::async_trait;
use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, put},
};
use crds::{Hardware, Inventory};
use kube::api::{Patch, PatchParams};
use kube::{Api, Client};
use serde_json::{Value, json};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

/// Storage the completion webhook acts on
#[async_trait]
pub trait NetbootStore: Send + Sync {
    /// Disable netboot on the node's Hardware; returns true if it was enabled
    async fn disable_netboot(&self, namespace: &str, name: &str) -> Result<bool, ControllerError>;

    /// Move the inventory to `Provisioned`
    async fn mark_provisioned(&self, namespace: &str, name: &str) -> Result<(), ControllerError>;
}

/// `NetbootStore` backed by the Kubernetes API
#[derive(Clone)]
pub struct KubeNetbootStore {
    client: Client,
}

impl KubeNetbootStore {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl NetbootStore for KubeNetbootStore {
    async fn disable_netboot(&self, namespace: &str, name: &str) -> Result<bool, ControllerError> {
        let api: Api<Hardware> = Api::namespaced(self.client.clone(), namespace);
        let hardware = api
            .get_opt(name)
            .await?
            .ok_or_else(|| ControllerError::NotFound(format!("Hardware {namespace}/{name}")))?;

        let mut spec = hardware.spec.clone();
        if !spec.disable_netboot() {
            return Ok(false);
        }

        let patch = json!({ "spec": { "interfaces": spec.interfaces } });
        api.patch(name, &PatchParams::default(), &Patch::Merge(&patch))
            .await?;
        Ok(true)
    }

    async fn mark_provisioned(&self, namespace: &str, name: &str) -> Result<(), ControllerError> {
        let api: Api<Inventory> = Api::namespaced(self.client.clone(), namespace);
        let inventory = api
            .get_opt(name)
            .await?
            .ok_or_else(|| ControllerError::NotFound(format!("Inventory {namespace}/{name}")))?;

        let mut status = inventory.status.unwrap_or_default();
        if mark_provisioned(&mut status) {
            let patch = status_patch(&status, &[])?;
            api.patch_status(name, &PatchParams::default(), &Patch::Merge(&patch))
                .await?;
        }
        Ok(())
    }
}

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn NetbootStore>,
    pub metrics: Metrics,
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/disable/{namespace}/{name}", put(disable_netboot_handler))
        .route("/healthz", get(health_check))
        .route("/readyz", get(health_check))
        .route("/metrics", get(metrics_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve until the listener fails
pub async fn serve(addr: SocketAddr, state: AppState) -> Result<(), ControllerError> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Webhook server listening on {}", addr);
    axum::serve(listener, build_router(state)).await?;
    Ok(())
}

async fn health_check() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    match state.metrics.render() {
        Ok(body) => (StatusCode::OK, body),
        Err(e) => {
            error!("Failed to render metrics: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, String::new())
        }
    }
}

async fn disable_netboot_handler(
    State(state): State<AppState>,
    Path((namespace, name)): Path<(String, String)>,
) -> Result<Json<Value>, StatusCode> {
    info!("Install of {}/{} reported complete", namespace, name);

    let result = async {
        let changed = state.store.disable_netboot(&namespace, &name).await?;
        state.store.mark_provisioned(&namespace, &name).await?;
        Ok::<_, ControllerError>(changed)
    }
    .await;

    match result {
        Ok(changed) => {
            state.metrics.netboot_disabled("ok");
            if changed {
                info!("Disabled netboot for {}/{}", namespace, name);
            }
            Ok(Json(json!({ "status": "ok", "changed": changed })))
        }
        Err(ControllerError::NotFound(what)) => {
            state.metrics.netboot_disabled("not_found");
            warn!("Completion webhook for {}/{}: {} not found", namespace, name, what);
            Err(StatusCode::NOT_FOUND)
        }
        Err(e) => {
            state.metrics.netboot_disabled("error");
            error!("Failed to disable netboot for {}/{}: {}", namespace, name, e);
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{Body, to_bytes};
    use axum::http::{Method, Request};
    use std::collections::HashSet;
    use std::sync::Mutex;
    use tower::ServiceExt;

    #[derive(Default)]
    struct MockNetbootStore {
        hardware: HashSet<String>,
        netboot_enabled: Mutex<HashSet<String>>,
        provisioned: Mutex<Vec<String>>,
    }

    impl MockNetbootStore {
        fn with_hardware(key: &str) -> Self {
            let mut store = Self::default();
            store.hardware.insert(key.to_string());
            store
                .netboot_enabled
                .lock()
                .expect("lock")
                .insert(key.to_string());
            store
        }
    }

    #[async_trait]
    impl NetbootStore for MockNetbootStore {
        async fn disable_netboot(&self, namespace: &str, name: &str) -> Result<bool, ControllerError> {
            let key = format!("{namespace}/{name}");
            if !self.hardware.contains(&key) {
                return Err(ControllerError::NotFound(format!("Hardware {key}")));
            }
            Ok(self.netboot_enabled.lock().expect("lock").remove(&key))
        }

        async fn mark_provisioned(&self, namespace: &str, name: &str) -> Result<(), ControllerError> {
            self.provisioned
                .lock()
                .expect("lock")
                .push(format!("{namespace}/{name}"));
            Ok(())
        }
    }

    fn router(store: Arc<MockNetbootStore>) -> (Router, Metrics) {
        let metrics = Metrics::new().expect("metrics");
        let router = build_router(AppState {
            store,
            metrics: metrics.clone(),
        });
        (router, metrics)
    }

    fn put_request(uri: &str) -> Request<Body> {
        Request::builder()
            .method(Method::PUT)
            .uri(uri)
            .body(Body::empty())
            .expect("request")
    }

    #[tokio::test]
    async fn test_disable_netboot() {
        let store = Arc::new(MockNetbootStore::with_hardware("racks/node-a"));
        let (router, metrics) = router(store.clone());

        let response = router
            .oneshot(put_request("/disable/racks/node-a"))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);

        let body = to_bytes(response.into_body(), usize::MAX).await.expect("body");
        let body: Value = serde_json::from_slice(&body).expect("json");
        assert_eq!(body["changed"], true);

        assert!(store.netboot_enabled.lock().expect("lock").is_empty());
        assert_eq!(*store.provisioned.lock().expect("lock"), vec!["racks/node-a".to_string()]);
        assert!(metrics
            .render()
            .expect("rendered")
            .contains(r#"seeder_netboot_disabled_total{result="ok"} 1"#));
    }

    #[tokio::test]
    async fn test_repeated_callback_is_ok() {
        let store = Arc::new(MockNetbootStore::with_hardware("racks/node-a"));
        let (router, _) = router(store.clone());

        for expected in [true, false] {
            let response = router
                .clone()
                .oneshot(put_request("/disable/racks/node-a"))
                .await
                .expect("response");
            assert_eq!(response.status(), StatusCode::OK);
            let body = to_bytes(response.into_body(), usize::MAX).await.expect("body");
            let body: Value = serde_json::from_slice(&body).expect("json");
            assert_eq!(body["changed"], expected);
        }
    }

    #[tokio::test]
    async fn test_unknown_hardware_is_not_found() {
        let store = Arc::new(MockNetbootStore::default());
        let (router, _) = router(store.clone());

        let response = router
            .oneshot(put_request("/disable/racks/missing"))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert!(store.provisioned.lock().expect("lock").is_empty());
    }

    #[tokio::test]
    async fn test_disable_requires_put() {
        let (router, _) = router(Arc::new(MockNetbootStore::default()));

        let request = Request::builder()
            .method(Method::GET)
            .uri("/disable/racks/node-a")
            .body(Body::empty())
            .expect("request");
        let response = router.oneshot(request).await.expect("response");
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    }

    #[tokio::test]
    async fn test_probes_and_metrics() {
        let (router, metrics) = router(Arc::new(MockNetbootStore::default()));
        metrics.reconciled("Inventory", "ok");

        for uri in ["/healthz", "/readyz"] {
            let request = Request::builder().uri(uri).body(Body::empty()).expect("request");
            let response = router.clone().oneshot(request).await.expect("response");
            assert_eq!(response.status(), StatusCode::OK);
        }

        let request = Request::builder().uri("/metrics").body(Body::empty()).expect("request");
        let response = router.oneshot(request).await.expect("response");
        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), usize::MAX).await.expect("body");
        let text = String::from_utf8(body.to_vec()).expect("utf8");
        assert!(text.contains(r#"seeder_reconciliations_total{kind="Inventory",result="ok"} 1"#));
    }
}
