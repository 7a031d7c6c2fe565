//! Address pool errors

use thiserror::Error;

/// Errors raised while validating a pool or allocating from it
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PoolError {
    /// CIDR could not be parsed as an IPv4 network
    #[error("invalid CIDR {0}")]
    InvalidCidr(String),

    /// An address field could not be parsed
    #[error("invalid {field} address {value}")]
    InvalidAddress { field: &'static str, value: String },

    /// An address lies outside the pool's network
    #[error("{field} address {value} is outside network {cidr}")]
    OutsideNetwork {
        field: &'static str,
        value: String,
        cidr: String,
    },

    /// Start address is after end address
    #[error("start address {start} is after end address {end}")]
    InvertedRange { start: String, end: String },

    /// Pool status has not been initialised yet
    #[error("address pool is not initialised")]
    NotInitialised,

    /// No free addresses left
    #[error("address pool {0} is exhausted")]
    Exhausted(String),
}
