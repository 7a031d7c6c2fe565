//! Tinkerbell provisioning backend resources (`tinkerbell.org/v1alpha1`)

pub mod hardware;
pub mod workflow;

pub use hardware::*;
pub use workflow::*;
