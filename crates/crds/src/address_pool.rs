//! AddressPool CRD
//!
//! Defines a range of IPv4 addresses that node leases and cluster VIPs are
//! allocated from.

use crate::references::ObjectReference;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(CustomResource, Debug, Clone, Default, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[kube(
    group = "metal.harvesterhci.io",
    version = "v1alpha1",
    kind = "AddressPool",
    namespaced,
    status = "AddressPoolStatus"
)]
#[serde(rename_all = "camelCase")]
pub struct AddressPoolSpec {
    /// Network the pool lives in (e.g. `192.168.1.0/24`)
    pub cidr: String,

    /// Gateway handed out with every lease. Never allocated.
    pub gateway: String,

    /// Netmask override (derived from the CIDR when unset)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub netmask: Option<String>,

    /// First allocatable address (defaults to the first host address)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_address: Option<String>,

    /// Last allocatable address (defaults to the last host address)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_address: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AddressPoolStatus {
    /// Pool readiness
    #[serde(default)]
    pub status: PoolState,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub start_address: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub last_address: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub netmask: String,

    /// Addresses still free in the pool
    #[serde(default)]
    pub available_addresses: u32,

    /// Allocated address -> owner
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub address_allocation: BTreeMap<String, ObjectReference>,

    /// Validation error, if the spec could not be turned into a pool
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, Default, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub enum PoolState {
    /// Spec not yet processed (or invalid)
    #[default]
    Pending,

    /// Addresses available
    Ready,

    /// Every address is allocated
    Exhausted,
}

impl AddressPool {
    /// Whether the pool has been initialised and still has free addresses
    pub fn is_ready(&self) -> bool {
        self.status
            .as_ref()
            .is_some_and(|s| s.status == PoolState::Ready)
    }
}
