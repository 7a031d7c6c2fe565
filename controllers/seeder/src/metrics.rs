//! Prometheus metrics exposed on `/metrics`.

use crate::error::ControllerError;
use prometheus::{Encoder, IntCounterVec, Opts, Registry, TextEncoder};

/// Counters shared by the reconcilers and the webhook handler
#[derive(Debug, Clone)]
pub struct Metrics {
    registry: Registry,
    reconciliations: IntCounterVec,
    artifacts_applied: IntCounterVec,
    netboot_disabled: IntCounterVec,
}

impl Metrics {
    pub fn new() -> Result<Self, ControllerError> {
        let registry = Registry::new_custom(Some("seeder".to_string()), None)?;

        let reconciliations = IntCounterVec::new(
            Opts::new("reconciliations_total", "Reconciliations by resource kind and result"),
            &["kind", "result"],
        )?;
        let artifacts_applied = IntCounterVec::new(
            Opts::new(
                "install_artifacts_applied_total",
                "Hardware and Workflow pairs applied by install mechanism",
            ),
            &["mechanism"],
        )?;
        let netboot_disabled = IntCounterVec::new(
            Opts::new("netboot_disabled_total", "Completion webhooks received by outcome"),
            &["result"],
        )?;

        registry.register(Box::new(reconciliations.clone()))?;
        registry.register(Box::new(artifacts_applied.clone()))?;
        registry.register(Box::new(netboot_disabled.clone()))?;

        Ok(Self {
            registry,
            reconciliations,
            artifacts_applied,
            netboot_disabled,
        })
    }

    /// Count a reconcile outcome: `ok` or `error`
    pub fn reconciled(&self, kind: &str, result: &str) {
        self.reconciliations.with_label_values(&[kind, result]).inc();
    }

    pub fn artifacts_applied(&self, mechanism: &str) {
        self.artifacts_applied.with_label_values(&[mechanism]).inc();
    }

    pub fn netboot_disabled(&self, result: &str) {
        self.netboot_disabled.with_label_values(&[result]).inc();
    }

    /// Render in the Prometheus text format
    pub fn render(&self) -> Result<String, ControllerError> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer)
            .map_err(|e| ControllerError::Metrics(prometheus::Error::Msg(e.to_string())))
    }
}
