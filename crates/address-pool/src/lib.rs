//! Address Pool Allocator
//!
//! Turns an `AddressPool` spec into an allocatable IPv4 range and hands out
//! leases (address, netmask, gateway) to inventories and cluster VIPs.
//!
//! Pool readiness mirrors availability: a pool is `Ready` while it has free
//! addresses and `Exhausted` once every address is taken.

pub mod allocator;
pub mod error;

pub use allocator::*;
pub use error::*;
