//! Pool validation and lease allocation.
//!
//! All functions are pure over the pool's spec and status. The caller is
//! responsible for persisting the updated status (with optimistic
//! concurrency) before handing a lease to an inventory.

use crate::error::PoolError;
use crds::{AddressPoolSpec, AddressPoolStatus, ObjectReference, PoolState};
use ipnet::Ipv4Net;
use std::net::Ipv4Addr;
use tracing::{debug, warn};

/// Address, netmask and gateway handed to a single owner
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Lease {
    pub address: Ipv4Addr,
    pub netmask: Ipv4Addr,
    pub gateway: Ipv4Addr,
}

/// Validated view of an `AddressPoolSpec`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolRange {
    net: Ipv4Net,
    netmask: Ipv4Addr,
    gateway: Ipv4Addr,
    start: Ipv4Addr,
    end: Ipv4Addr,
}

fn parse_address(field: &'static str, value: &str) -> Result<Ipv4Addr, PoolError> {
    value.trim().parse().map_err(|_| PoolError::InvalidAddress {
        field,
        value: value.to_string(),
    })
}

impl PoolRange {
    /// Validate a pool spec
    ///
    /// The gateway and any explicit start/end address must lie inside the
    /// CIDR. Without explicit bounds the range covers the host addresses of
    /// the network (network and broadcast excluded for prefixes shorter than /31).
    pub fn from_spec(spec: &AddressPoolSpec) -> Result<Self, PoolError> {
        let net: Ipv4Net = spec
            .cidr
            .trim()
            .parse()
            .map_err(|_| PoolError::InvalidCidr(spec.cidr.clone()))?;
        let net = net.trunc();

        let inside = |field: &'static str, value: &str| -> Result<Ipv4Addr, PoolError> {
            let addr = parse_address(field, value)?;
            if !net.contains(&addr) {
                return Err(PoolError::OutsideNetwork {
                    field,
                    value: value.to_string(),
                    cidr: net.to_string(),
                });
            }
            Ok(addr)
        };

        let gateway = inside("gateway", &spec.gateway)?;

        let (first_host, last_host) = if net.prefix_len() < 31 {
            (
                Ipv4Addr::from(u32::from(net.network()) + 1),
                Ipv4Addr::from(u32::from(net.broadcast()) - 1),
            )
        } else {
            (net.network(), net.broadcast())
        };

        let start = match spec.start_address.as_deref() {
            Some(value) => inside("start", value)?,
            None => first_host,
        };
        let end = match spec.end_address.as_deref() {
            Some(value) => inside("end", value)?,
            None => last_host,
        };
        if start > end {
            return Err(PoolError::InvertedRange {
                start: start.to_string(),
                end: end.to_string(),
            });
        }

        let netmask = match spec.netmask.as_deref() {
            Some(value) => parse_address("netmask", value)?,
            None => net.netmask(),
        };

        Ok(Self {
            net,
            netmask,
            gateway,
            start,
            end,
        })
    }

    /// Whether `addr` may be handed out by this pool
    pub fn is_allocatable(&self, addr: Ipv4Addr) -> bool {
        addr >= self.start && addr <= self.end && addr != self.gateway
    }

    /// Number of addresses the pool can hand out in total
    pub fn capacity(&self) -> u32 {
        let span = u32::from(self.end) - u32::from(self.start) + 1;
        if self.gateway >= self.start && self.gateway <= self.end {
            span - 1
        } else {
            span
        }
    }

    fn lease(&self, address: Ipv4Addr) -> Lease {
        Lease {
            address,
            netmask: self.netmask,
            gateway: self.gateway,
        }
    }

    /// Network the pool lives in
    pub fn network(&self) -> Ipv4Net {
        self.net
    }
}

fn state_for(available: u32) -> PoolState {
    if available == 0 {
        PoolState::Exhausted
    } else {
        PoolState::Ready
    }
}

/// Build the pool status for a spec
///
/// Allocations from `previous` that are still allocatable under the new spec
/// are carried over; the rest are dropped with a warning.
pub fn initialize(
    spec: &AddressPoolSpec,
    previous: Option<&AddressPoolStatus>,
) -> Result<AddressPoolStatus, PoolError> {
    let range = PoolRange::from_spec(spec)?;

    let mut address_allocation = previous
        .map(|p| p.address_allocation.clone())
        .unwrap_or_default();
    address_allocation.retain(|addr, owner| {
        let keep = addr
            .parse::<Ipv4Addr>()
            .is_ok_and(|a| range.is_allocatable(a));
        if !keep {
            warn!("Dropping allocation of {} to {}: no longer inside pool {}", addr, owner, range.net);
        }
        keep
    });

    let used = u32::try_from(address_allocation.len()).unwrap_or(u32::MAX);
    let available = range.capacity().saturating_sub(used);

    debug!(
        "Initialised pool {}: {} - {}, {} of {} addresses available",
        range.net,
        range.start,
        range.end,
        available,
        range.capacity()
    );

    Ok(AddressPoolStatus {
        status: state_for(available),
        start_address: range.start.to_string(),
        last_address: range.end.to_string(),
        netmask: range.netmask.to_string(),
        available_addresses: available,
        address_allocation,
        error: None,
    })
}

/// Allocate an address to `owner`
///
/// Allocation is idempotent: an owner that already holds an address gets the
/// same lease back. Otherwise the lowest free address is taken.
pub fn allocate(
    spec: &AddressPoolSpec,
    status: &mut AddressPoolStatus,
    owner: &ObjectReference,
) -> Result<Lease, PoolError> {
    if status.status == PoolState::Pending {
        return Err(PoolError::NotInitialised);
    }
    let range = PoolRange::from_spec(spec)?;

    if let Some((addr, _)) = status
        .address_allocation
        .iter()
        .find(|(_, holder)| *holder == owner)
    {
        let address = parse_address("allocated", addr)?;
        debug!("{} already holds {}", owner, address);
        return Ok(range.lease(address));
    }

    let free = (u32::from(range.start)..=u32::from(range.end))
        .map(Ipv4Addr::from)
        .filter(|addr| *addr != range.gateway)
        .find(|addr| !status.address_allocation.contains_key(&addr.to_string()));

    let Some(address) = free else {
        status.available_addresses = 0;
        status.status = PoolState::Exhausted;
        return Err(PoolError::Exhausted(range.net.to_string()));
    };

    status
        .address_allocation
        .insert(address.to_string(), owner.clone());
    status.available_addresses = status.available_addresses.saturating_sub(1);
    status.status = state_for(status.available_addresses);

    debug!("Allocated {} to {}", address, owner);
    Ok(range.lease(address))
}

/// Release whatever address `owner` holds
///
/// Returns the released address, if any.
pub fn release(status: &mut AddressPoolStatus, owner: &ObjectReference) -> Option<Ipv4Addr> {
    let addr = status
        .address_allocation
        .iter()
        .find(|(_, holder)| *holder == owner)
        .map(|(addr, _)| addr.clone())?;

    status.address_allocation.remove(&addr);
    status.available_addresses += 1;
    status.status = state_for(status.available_addresses);

    debug!("Released {} from {}", addr, owner);
    addr.parse().ok()
}
