//! Seeder CRD Definitions
//!
//! Kubernetes Custom Resource Definitions read and written by the seeder
//! controller: the `metal.harvesterhci.io` resources describing machines,
//! clusters and address pools, and the Tinkerbell resources generated from
//! them.

pub mod references;
pub mod inventory;
pub mod cluster;
pub mod address_pool;
pub mod tinkerbell;

pub use references::*;
pub use inventory::*;
pub use cluster::*;
pub use address_pool::*;
pub use tinkerbell::*;
