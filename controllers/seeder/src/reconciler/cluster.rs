//! Cluster reconciler
//!
//! Generates the join token, settles the VIP and assigns the listed
//! inventories. Inventories dropped from the node list are released, and a
//! finalizer returns the VIP and every member lease when the cluster goes.

use super::{Reconciler, WAIT_REQUEUE};
use crate::error::ControllerError;
use crate::reconcile_helpers::{
    assign_to_cluster, generate_secret, install_started, resource_key, status_patch,
    unassign_from_cluster, unassign_patch, Assignment,
};
use crds::{Cluster, ClusterState, ClusterStatus, Inventory, ObjectReference};
use kube::api::{Patch, PatchParams};
use kube::runtime::controller::Action;
use kube::runtime::finalizer::{finalizer, Event as Finalizer};
use kube::{Api, ResourceExt};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Finalizer guarding VIP and member lease release
pub const CLUSTER_FINALIZER: &str = "metal.harvesterhci.io/cluster";

impl Reconciler {
    pub async fn reconcile_cluster(&self, cluster: Arc<Cluster>) -> Result<Action, ControllerError> {
        let namespace = cluster.namespace().unwrap_or_default();
        let api: Api<Cluster> = self.api(&namespace);

        finalizer(&api, CLUSTER_FINALIZER, cluster, |event| async move {
            match event {
                Finalizer::Apply(cluster) => self.apply_cluster(&cluster).await,
                Finalizer::Cleanup(cluster) => self.cleanup_cluster(&cluster).await,
            }
        })
        .await
        .map_err(|e| ControllerError::Finalizer(Box::new(e)))
    }

    async fn apply_cluster(&self, cluster: &Cluster) -> Result<Action, ControllerError> {
        let name = cluster.name_any();
        let namespace = cluster.namespace().unwrap_or_default();
        let cluster_ref = ObjectReference::with_namespace(&name, &namespace);

        info!("Reconciling Cluster {}/{}", namespace, name);

        let mut status = cluster.status.clone().unwrap_or_default();
        let before = status.clone();

        if status.cluster_token.is_empty() {
            status.cluster_token = generate_secret();
            debug!("Generated join token for Cluster {}/{}", namespace, name);
        }

        if status.cluster_address.is_empty() {
            status.cluster_address = match &cluster.spec.vip_config.static_address {
                Some(address) if !address.trim().is_empty() => address.trim().to_string(),
                _ => {
                    let lease = self
                        .allocate_from_pool(&cluster.spec.vip_config.address_pool_reference, &namespace, &cluster_ref)
                        .await?;
                    lease.address.to_string()
                }
            };
            info!("Cluster {}/{} VIP is {}", namespace, name, status.cluster_address);
        }

        status.status = ClusterState::Ready;
        status.error = None;
        if status != before {
            let patch = status_patch(&status, &["error"])?;
            let api: Api<Cluster> = self.api(&namespace);
            api.patch_status(&name, &PatchParams::default(), &Patch::Merge(&patch))
                .await?;
        }

        let members = self.member_inventories(&cluster_ref).await?;
        for inventory in unlisted_members(cluster, &members) {
            let status = inventory.status.clone().unwrap_or_default();
            if install_started(&status) {
                warn!(
                    "Inventory {}/{} left Cluster {} after its install was submitted, keeping its lease",
                    inventory.namespace().unwrap_or_default(),
                    inventory.name_any(),
                    cluster_ref
                );
                continue;
            }
            self.release_member(inventory, &cluster_ref, &namespace).await?;
        }

        let waiting = self.assign_nodes(cluster, &cluster_ref).await?;
        if waiting > 0 {
            debug!("Cluster {}/{} waiting on {} inventories", namespace, name, waiting);
            return Ok(Action::requeue(WAIT_REQUEUE));
        }
        Ok(Action::await_change())
    }

    /// Return the VIP and every member lease to their pools
    async fn cleanup_cluster(&self, cluster: &Cluster) -> Result<Action, ControllerError> {
        let name = cluster.name_any();
        let namespace = cluster.namespace().unwrap_or_default();
        let cluster_ref = ObjectReference::with_namespace(&name, &namespace);

        info!("Cleaning up Cluster {}/{}", namespace, name);

        let vip_pool = &cluster.spec.vip_config.address_pool_reference;
        self.release_from_pools(vip_pool.namespace_or(&namespace), &cluster_ref)
            .await?;

        for inventory in self.member_inventories(&cluster_ref).await? {
            let pool_namespace = cluster
                .node_for(&inventory.name_any(), &inventory.namespace().unwrap_or_default())
                .map(|(_, node)| node.address_pool_reference.namespace_or(&namespace).to_string())
                .unwrap_or_else(|| namespace.clone());
            self.release_member(&inventory, &cluster_ref, &pool_namespace)
                .await?;
        }

        self.reset_backoff(&resource_key(&namespace, &name));
        Ok(Action::await_change())
    }

    /// Inventories whose status names `cluster_ref`
    async fn member_inventories(&self, cluster_ref: &ObjectReference) -> Result<Vec<Inventory>, ControllerError> {
        let api: Api<Inventory> = match &self.config.watch_namespace {
            Some(namespace) => self.api(namespace),
            None => Api::all(self.client.clone()),
        };
        Ok(api
            .list(&Default::default())
            .await?
            .into_iter()
            .filter(|inventory| inventory.cluster_ref() == Some(cluster_ref))
            .collect())
    }

    /// Release an inventory's lease and drop its membership
    ///
    /// The lease goes first so a failed status write is retried against an
    /// inventory that still names the cluster.
    async fn release_member(
        &self,
        inventory: &Inventory,
        cluster_ref: &ObjectReference,
        pool_namespace: &str,
    ) -> Result<(), ControllerError> {
        let name = inventory.name_any();
        let namespace = inventory.namespace().unwrap_or_default();
        let owner = ObjectReference::with_namespace(&name, &namespace);

        self.release_from_pools(pool_namespace, &owner).await?;

        let mut status = inventory.status.clone().unwrap_or_default();
        if unassign_from_cluster(&mut status, cluster_ref) {
            let patch = unassign_patch(&status)?;
            let api: Api<Inventory> = self.api(&namespace);
            api.patch_status(&name, &PatchParams::default(), &Patch::Merge(&patch))
                .await?;
            info!("Inventory {}/{} released from Cluster {}", namespace, name, cluster_ref);
        }
        Ok(())
    }

    /// Mark every listed inventory as belonging to the cluster
    ///
    /// Returns how many inventories do not exist yet.
    async fn assign_nodes(&self, cluster: &Cluster, cluster_ref: &ObjectReference) -> Result<usize, ControllerError> {
        let cluster_namespace = cluster.namespace().unwrap_or_default();
        let mut missing = 0;

        for (position, node) in cluster.spec.nodes.iter().enumerate() {
            let namespace = node.inventory_reference.namespace_or(&cluster_namespace);
            let inventory_name = &node.inventory_reference.name;
            let api: Api<Inventory> = self.api(namespace);

            let Some(inventory) = api.get_opt(inventory_name).await? else {
                warn!("Inventory {}/{} listed in Cluster {} does not exist", namespace, inventory_name, cluster_ref);
                missing += 1;
                continue;
            };

            let mut status = inventory.status.clone().unwrap_or_default();
            match assign_to_cluster(&mut status, cluster_ref, position) {
                Assignment::Unchanged => {}
                Assignment::Updated => {
                    let patch = status_patch(&status, &[])?;
                    api.patch_status(inventory_name, &PatchParams::default(), &Patch::Merge(&patch))
                        .await?;
                    info!("Inventory {}/{} assigned to Cluster {}", namespace, inventory_name, cluster_ref);
                }
                Assignment::Conflict(other) => {
                    warn!(
                        "Inventory {}/{} already belongs to Cluster {}, not assigning to {}",
                        namespace, inventory_name, other, cluster_ref
                    );
                }
            }
        }
        Ok(missing)
    }
}

/// Whether a cluster has everything its nodes need
pub fn is_ready(status: Option<&ClusterStatus>) -> bool {
    status.is_some_and(|s| {
        s.status == ClusterState::Ready && !s.cluster_address.is_empty() && !s.cluster_token.is_empty()
    })
}

/// Members of `cluster` that its node list no longer names
pub fn unlisted_members<'a>(cluster: &Cluster, members: &'a [Inventory]) -> Vec<&'a Inventory> {
    members
        .iter()
        .filter(|inventory| {
            cluster
                .node_for(&inventory.name_any(), &inventory.namespace().unwrap_or_default())
                .is_none()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{create_test_cluster, create_test_inventory};

    #[test]
    fn test_is_ready() {
        assert!(!is_ready(None));
        assert!(!is_ready(Some(&ClusterStatus::default())));
        assert!(is_ready(Some(&ClusterStatus {
            status: ClusterState::Ready,
            cluster_address: "192.168.1.100".to_string(),
            cluster_token: "token".to_string(),
            error: None,
        })));
    }

    #[test]
    fn test_unlisted_members() {
        let cluster = create_test_cluster("harvester-one", &["node-a", "node-b"]);
        let cluster_ref = ObjectReference::with_namespace("harvester-one", "default");
        let members = vec![
            create_test_inventory("node-a", Some(&cluster_ref)),
            create_test_inventory("node-c", Some(&cluster_ref)),
            create_test_inventory("node-b", Some(&cluster_ref)),
        ];

        let unlisted: Vec<String> = unlisted_members(&cluster, &members)
            .into_iter()
            .map(|inventory| inventory.name_any())
            .collect();
        assert_eq!(unlisted, vec!["node-c"]);
    }

    #[test]
    fn test_emptied_node_list_releases_every_member() {
        let cluster = create_test_cluster("harvester-one", &[]);
        let cluster_ref = ObjectReference::with_namespace("harvester-one", "default");
        let members = vec![
            create_test_inventory("node-a", Some(&cluster_ref)),
            create_test_inventory("node-b", Some(&cluster_ref)),
        ];

        assert_eq!(unlisted_members(&cluster, &members).len(), 2);
    }
}
