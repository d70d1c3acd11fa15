//! Metrics instrumentation for zonedns.
//!
//! All metrics are prefixed with `zonedns.`

use metrics::{counter, gauge, histogram};
use std::time::Instant;

/// Record a DNS query.
pub fn record_query(record_type: &str, result: QueryResult, duration: std::time::Duration) {
    let result_str = match result {
        QueryResult::Success => "success",
        QueryResult::NxDomain => "nxdomain",
        QueryResult::NoData => "nodata",
        QueryResult::NotAuthoritative => "not_authoritative",
        QueryResult::Transfer => "transfer",
        QueryResult::NotImplemented => "not_implemented",
        QueryResult::NotReady => "not_ready",
        QueryResult::Error => "error",
    };

    counter!("zonedns.query.count", "type" => record_type.to_string(), "result" => result_str)
        .increment(1);
    histogram!("zonedns.query.duration.seconds", "type" => record_type.to_string())
        .record(duration.as_secs_f64());
}

/// Query result type for metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryResult {
    /// Query returned records.
    Success,
    /// Name does not exist.
    NxDomain,
    /// Empty NOERROR answer inside one of our zones.
    NoData,
    /// Name outside every published zone.
    NotAuthoritative,
    /// Zone transfer streamed.
    Transfer,
    /// Opcode or message type we do not serve.
    NotImplemented,
    /// Nothing published yet.
    NotReady,
    /// Response could not be sent.
    Error,
}

/// Record the end of a sync cycle.
pub fn record_sync_cycle(outcome: SyncOutcome, duration: std::time::Duration) {
    let outcome_str = match outcome {
        SyncOutcome::Published => "published",
        SyncOutcome::Unchanged => "unchanged",
        SyncOutcome::InventoryFailed => "inventory_failed",
        SyncOutcome::ValidationFailed => "validation_failed",
    };

    counter!("zonedns.sync.cycle.count", "outcome" => outcome_str).increment(1);
    histogram!("zonedns.sync.cycle.duration.seconds").record(duration.as_secs_f64());
}

/// Sync cycle outcomes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    /// At least one zone changed and was published.
    Published,
    /// Rebuild matched the live zones.
    Unchanged,
    /// An inventory call failed; live zones kept.
    InventoryFailed,
    /// Rebuilt zones looked truncated; live zones kept.
    ValidationFailed,
}

/// Record an alias grant decision.
pub fn record_alias_decision(granted: bool) {
    let decision = if granted { "granted" } else { "denied" };
    counter!("zonedns.sync.alias.count", "decision" => decision).increment(1);
}

/// Record a VM left out of this cycle.
pub fn record_vm_skipped(reason: &'static str) {
    counter!("zonedns.sync.vm.skipped.count", "reason" => reason).increment(1);
}

/// Record per-zone name count and serial.
pub fn record_zone_state(zone: &str, names: usize, serial: u32) {
    gauge!("zonedns.zone.names", "zone" => zone.to_string()).set(names as f64);
    gauge!("zonedns.zone.serial", "zone" => zone.to_string()).set(serial as f64);
}

/// Record the published generation counter.
pub fn record_generation(generation: u64) {
    gauge!("zonedns.state.generation").set(generation as f64);
}

/// Record the number of records streamed by a zone transfer.
pub fn record_axfr_records(count: usize) {
    histogram!("zonedns.query.axfr.records").record(count as f64);
}

/// Helper for timing operations.
pub struct Timer {
    start: Instant,
}

impl Timer {
    /// Start a new timer.
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// Get elapsed duration since timer start.
    pub fn elapsed(&self) -> std::time::Duration {
        self.start.elapsed()
    }
}
