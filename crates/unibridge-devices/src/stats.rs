//! Engine counters.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Lock-free counters shared by every component of a bridge.
#[derive(Debug, Default)]
pub struct BridgeStats {
    reports_applied: AtomicU64,
    reports_unmapped: AtomicU64,
    reports_malformed: AtomicU64,
    publishes_accepted: AtomicU64,
    publish_failures: AtomicU64,
    endpoints_exposed: AtomicU64,
    endpoints_removed: AtomicU64,
}

/// Point-in-time copy of [`BridgeStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    pub reports_applied: u64,
    /// Reports dropped because no fabric endpoint or attribute mapping existed.
    pub reports_unmapped: u64,
    pub reports_malformed: u64,
    pub publishes_accepted: u64,
    pub publish_failures: u64,
    pub endpoints_exposed: u64,
    pub endpoints_removed: u64,
}

impl BridgeStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn report_applied(&self) {
        self.reports_applied.fetch_add(1, Ordering::Relaxed);
    }

    pub fn report_unmapped(&self) {
        self.reports_unmapped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn report_malformed(&self) {
        self.reports_malformed.fetch_add(1, Ordering::Relaxed);
    }

    /// Record the outcome of a transport publish.
    pub fn publish_result<T, E>(&self, result: &std::result::Result<T, E>) {
        let counter = if result.is_ok() {
            &self.publishes_accepted
        } else {
            &self.publish_failures
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn endpoint_exposed(&self) {
        self.endpoints_exposed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn endpoint_removed(&self) {
        self.endpoints_removed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            reports_applied: self.reports_applied.load(Ordering::Relaxed),
            reports_unmapped: self.reports_unmapped.load(Ordering::Relaxed),
            reports_malformed: self.reports_malformed.load(Ordering::Relaxed),
            publishes_accepted: self.publishes_accepted.load(Ordering::Relaxed),
            publish_failures: self.publish_failures.load(Ordering::Relaxed),
            endpoints_exposed: self.endpoints_exposed.load(Ordering::Relaxed),
            endpoints_removed: self.endpoints_removed.load(Ordering::Relaxed),
        }
    }
}
