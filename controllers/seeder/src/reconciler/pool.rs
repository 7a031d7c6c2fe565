//! AddressPool reconciler

use super::Reconciler;
use crate::error::ControllerError;
use crate::reconcile_helpers::pool_status_patch;
use crds::{AddressPool, AddressPoolStatus, PoolState};
use kube::api::{Patch, PatchParams};
use kube::runtime::controller::Action;
use kube::{Api, ResourceExt};
use tracing::{debug, error, info};

/// Status a pool should carry for its current spec
///
/// Existing allocations that still fit the spec are kept. An invalid spec
/// leaves the pool `Pending` with the validation error recorded.
pub fn desired_pool_status(pool: &AddressPool) -> AddressPoolStatus {
    match address_pool::initialize(&pool.spec, pool.status.as_ref()) {
        Ok(status) => status,
        Err(e) => AddressPoolStatus {
            status: PoolState::Pending,
            address_allocation: pool
                .status
                .as_ref()
                .map(|s| s.address_allocation.clone())
                .unwrap_or_default(),
            error: Some(e.to_string()),
            ..Default::default()
        },
    }
}

impl Reconciler {
    pub async fn reconcile_address_pool(&self, pool: &AddressPool) -> Result<Action, ControllerError> {
        let name = pool.name_any();
        let namespace = pool.namespace().unwrap_or_default();

        info!("Reconciling AddressPool {}/{}", namespace, name);

        let desired = desired_pool_status(pool);
        if pool.status.as_ref() == Some(&desired) {
            debug!("AddressPool {}/{} status is up-to-date, skipping update", namespace, name);
            return Ok(Action::await_change());
        }

        if let Some(message) = &desired.error {
            error!("AddressPool {}/{} is invalid: {}", namespace, name, message);
        }

        // allocations that no longer fit must be nulled out of the merge patch
        let dropped: Vec<String> = pool
            .status
            .as_ref()
            .map(|s| {
                s.address_allocation
                    .keys()
                    .filter(|addr| !desired.address_allocation.contains_key(*addr))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        let patch = pool_status_patch(pool.resource_version().as_deref(), &desired, &dropped)?;
        let api: Api<AddressPool> = self.api(&namespace);
        api.patch_status(&name, &PatchParams::default(), &Patch::Merge(&patch))
            .await?;

        info!(
            "Updated AddressPool {}/{} status: {:?}, {} addresses available",
            namespace, name, desired.status, desired.available_addresses
        );
        Ok(Action::await_change())
    }
}
