//! Inventory reconciler
//!
//! Drives an inventory from cluster assignment to submitted Tinkerbell
//! objects: allocate a lease from the node's pool, generate a password, then
//! generate and apply the Hardware and Workflow once the cluster is ready.
//! A finalizer returns the lease to its pool when the inventory is deleted.

use super::{Reconciler, FIELD_MANAGER, WAIT_REQUEUE};
use crate::error::ControllerError;
use crate::reconcile_helpers::{
    generate_secret, lease_interface, mark_submitted, record_error, record_lease, resource_key,
    status_patch,
};
use crate::reconciler::cluster::is_ready;
use crds::{
    Cluster, ConditionType, Hardware, Inventory, InventoryState, InventoryStatus, ObjectReference,
    Workflow,
};
use install_artifacts::{
    generate_install_artifacts, generate_workflow, EndpointSource, ServiceEndpoint,
};
use k8s_openapi::api::core::v1::Service;
use kube::api::{Patch, PatchParams};
use kube::runtime::controller::Action;
use kube::runtime::finalizer::{finalizer, Event as Finalizer};
use kube::{Api, Resource, ResourceExt};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Finalizer guarding lease release
pub const INVENTORY_FINALIZER: &str = "metal.harvesterhci.io/lease";

impl Reconciler {
    pub async fn reconcile_inventory(&self, inventory: Arc<Inventory>) -> Result<Action, ControllerError> {
        let namespace = inventory.namespace().unwrap_or_default();
        let api: Api<Inventory> = self.api(&namespace);

        finalizer(&api, INVENTORY_FINALIZER, inventory, |event| async move {
            match event {
                Finalizer::Apply(inventory) => self.apply_inventory(&inventory).await,
                Finalizer::Cleanup(inventory) => self.cleanup_inventory(&inventory).await,
            }
        })
        .await
        .map_err(|e| ControllerError::Finalizer(Box::new(e)))
    }

    async fn apply_inventory(&self, inventory: &Inventory) -> Result<Action, ControllerError> {
        let name = inventory.name_any();
        let namespace = inventory.namespace().unwrap_or_default();
        let key = resource_key(&namespace, &name);

        info!("Reconciling Inventory {}/{}", namespace, name);

        let Some(cluster_ref) = inventory.cluster_ref().cloned() else {
            debug!("Inventory {}/{} is not assigned to a cluster", namespace, name);
            return Ok(Action::await_change());
        };
        let cluster_namespace = cluster_ref.namespace_or(&namespace).to_string();

        let clusters: Api<Cluster> = self.api(&cluster_namespace);
        let Some(cluster) = clusters.get_opt(&cluster_ref.name).await? else {
            warn!("Cluster {} for Inventory {}/{} not found", cluster_ref, namespace, name);
            return Ok(Action::requeue(WAIT_REQUEUE));
        };
        let Some((_, node)) = cluster.node_for(&name, &namespace) else {
            warn!("Inventory {}/{} is not listed in Cluster {}", namespace, name, cluster_ref);
            return Ok(Action::await_change());
        };

        let mut status = inventory.status.clone().unwrap_or_default();
        let before = status.clone();

        if inventory.lease().is_none() {
            let owner = ObjectReference::with_namespace(&name, &namespace);
            match self
                .allocate_from_pool(&node.address_pool_reference, &cluster_namespace, &owner)
                .await
            {
                Ok(lease) => {
                    record_lease(&mut status, lease_interface(&lease, &cluster.spec.cluster_config.nameservers));
                }
                Err(e) if e.is_transient() => {
                    warn!("Waiting for an address for Inventory {}/{}: {}", namespace, name, e);
                    return Ok(Action::requeue(self.next_backoff(&key)));
                }
                Err(e) => {
                    error!("Cannot allocate an address for Inventory {}/{}: {}", namespace, name, e);
                    record_error(&mut status, e.to_string());
                    self.patch_inventory_status(&namespace, &name, &status).await?;
                    return Ok(Action::await_change());
                }
            }
        }

        if status.generated_password.is_empty() {
            status.generated_password = generate_secret();
        }

        if status != before {
            self.patch_inventory_status(&namespace, &name, &status).await?;
        }

        if status.status == InventoryState::Provisioned {
            debug!("Inventory {}/{} is provisioned", namespace, name);
            return Ok(Action::await_change());
        }

        if !is_ready(cluster.status.as_ref()) {
            debug!("Cluster {} is not ready for Inventory {}/{}", cluster_ref, namespace, name);
            return Ok(Action::requeue(WAIT_REQUEUE));
        }

        let mut current = inventory.clone();
        current.status = Some(status.clone());

        if current.has_condition(ConditionType::TinkHardwareSubmitted) {
            // netboot state on the Hardware is owned by the webhook and the workflow now
            self.apply_workflow(&generate_workflow(&current, &cluster), &current)
                .await?;
            return Ok(Action::await_change());
        }

        self.submit_install_artifacts(&current, &cluster, status, &key)
            .await
    }

    async fn submit_install_artifacts(
        &self,
        inventory: &Inventory,
        cluster: &Cluster,
        mut status: InventoryStatus,
        key: &str,
    ) -> Result<Action, ControllerError> {
        let name = inventory.name_any();
        let namespace = inventory.namespace().unwrap_or_default();
        let source = self.endpoint_source().await?;

        let artifacts = match generate_install_artifacts(inventory, cluster, &source) {
            Ok(artifacts) => artifacts,
            Err(e) if e.is_transient() => {
                info!("{}", e);
                return Ok(Action::requeue(self.next_backoff(key)));
            }
            Err(e) => {
                error!("{}", e);
                if record_error(&mut status, e.to_string()) {
                    self.patch_inventory_status(&namespace, &name, &status).await?;
                }
                return Ok(Action::await_change());
            }
        };

        let mut hardware = artifacts.hardware;
        hardware.metadata.owner_references = inventory.controller_owner_ref(&()).map(|o| vec![o]);
        let hardware_api: Api<Hardware> = self.api(&namespace);
        hardware_api
            .patch(&name, &PatchParams::apply(FIELD_MANAGER).force(), &Patch::Apply(&hardware))
            .await?;
        self.apply_workflow(&artifacts.workflow, inventory).await?;

        if mark_submitted(&mut status, artifacts.mechanism.as_str()) {
            self.patch_inventory_status(&namespace, &name, &status).await?;
        }
        self.metrics.artifacts_applied(artifacts.mechanism.as_str());
        self.reset_backoff(key);

        info!(
            "Submitted {} Hardware and Workflow for Inventory {}/{}",
            artifacts.mechanism, namespace, name
        );
        Ok(Action::await_change())
    }

    async fn apply_workflow(&self, workflow: &Workflow, inventory: &Inventory) -> Result<(), ControllerError> {
        let mut workflow = workflow.clone();
        workflow.metadata.owner_references = inventory.controller_owner_ref(&()).map(|o| vec![o]);

        let namespace = inventory.namespace().unwrap_or_default();
        let api: Api<Workflow> = self.api(&namespace);
        api.patch(
            &inventory.name_any(),
            &PatchParams::apply(FIELD_MANAGER).force(),
            &Patch::Apply(&workflow),
        )
        .await?;
        Ok(())
    }

    /// Snapshot the services the installer calls back to
    async fn endpoint_source(&self) -> Result<EndpointSource, ControllerError> {
        let config = &self.config;

        let seeder_api: Api<Service> = self.api(&config.seeder_namespace);
        let seeder = match seeder_api.get_opt(&config.seeder_service).await? {
            Some(service) => ServiceEndpoint::from_service(&service),
            None => ServiceEndpoint::new(&config.seeder_service, None),
        };

        let tink_api: Api<Service> = self.api(&config.tink_stack_namespace);
        let tink_stack = tink_api
            .get_opt(&config.tink_stack_service)
            .await?
            .map(|service| ServiceEndpoint::from_service(&service));

        Ok(EndpointSource {
            config: config.endpoint.clone(),
            seeder,
            tink_stack,
        })
    }

    async fn patch_inventory_status(
        &self,
        namespace: &str,
        name: &str,
        status: &InventoryStatus,
    ) -> Result<(), ControllerError> {
        let patch = status_patch(status, &["error"])?;
        let api: Api<Inventory> = self.api(namespace);
        api.patch_status(name, &PatchParams::default(), &Patch::Merge(&patch))
            .await?;
        Ok(())
    }

    /// Return the inventory's lease to its pool
    async fn cleanup_inventory(&self, inventory: &Inventory) -> Result<Action, ControllerError> {
        let name = inventory.name_any();
        let namespace = inventory.namespace().unwrap_or_default();
        let owner = ObjectReference::with_namespace(&name, &namespace);

        info!("Cleaning up Inventory {}/{}", namespace, name);

        // pools live next to the cluster when the node entry can still be found
        let mut pool_namespace = namespace.clone();
        if let Some(cluster_ref) = inventory.cluster_ref() {
            let cluster_namespace = cluster_ref.namespace_or(&namespace);
            let clusters: Api<Cluster> = self.api(cluster_namespace);
            if let Some(cluster) = clusters.get_opt(&cluster_ref.name).await? {
                if let Some((_, node)) = cluster.node_for(&name, &namespace) {
                    pool_namespace = node.address_pool_reference.namespace_or(cluster_namespace).to_string();
                }
            }
        }

        self.release_from_pools(&pool_namespace, &owner).await?;
        self.reset_backoff(&resource_key(&namespace, &name));
        Ok(Action::await_change())
    }
}
