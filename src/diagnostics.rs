// diagnostics.rs — operator-facing device listing.

use std::fmt;

use crate::backend::{ComputeBackend, KernelEntry, KernelLibrary, StableId};
use crate::registry::Registry;
use crate::LOG_TARGET;

/// Names of the registered devices, in registry order.
pub fn list_devices<B: ComputeBackend>(registry: &Registry<B>) -> Vec<String> {
    registry.iter().map(|record| record.name()).collect()
}

/// What one registered device offers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceSummary {
    pub id: StableId,
    pub name: String,
    pub entry_points: Vec<KernelEntry>,
}

impl fmt::Display for DeviceSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}]: {} function(s)", self.name, self.id, self.entry_points.len())
    }
}

/// Summaries of every registered device. Takes each record's lock briefly
/// to read its library.
pub fn describe<B: ComputeBackend>(registry: &Registry<B>) -> Vec<DeviceSummary> {
    registry
        .iter()
        .map(|record| DeviceSummary {
            id: record.id(),
            name: record.name(),
            entry_points: record.lock().entry_points().to_vec(),
        })
        .collect()
}

/// Write the device listing to the log at debug level.
pub fn log_devices<B: ComputeBackend>(registry: &Registry<B>) {
    if registry.is_empty() {
        log::debug!(target: LOG_TARGET, "no compute devices registered");
        return;
    }
    for summary in describe(registry) {
        log::debug!(target: LOG_TARGET, "device: {summary}");
        for entry in &summary.entry_points {
            log::debug!(target: LOG_TARGET, "  function: {entry}");
        }
    }
}
