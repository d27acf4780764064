//! Decision counters for the admission gate.

use std::sync::atomic::{AtomicU64, Ordering};

/// Running totals, updated by every check.
#[derive(Debug, Default)]
pub(crate) struct GateMetrics {
    pub(crate) checks: AtomicU64,
    pub(crate) allowed: AtomicU64,
    pub(crate) allowed_unverified: AtomicU64,
    pub(crate) denied_credential: AtomicU64,
    pub(crate) denied_unavailable: AtomicU64,
    pub(crate) saturated: AtomicU64,
    pub(crate) timed_out: AtomicU64,
}

impl GateMetrics {
    pub(crate) fn bump(counter: &AtomicU64) -> u64 {
        counter.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub(crate) fn snapshot(&self) -> GateMetricsSnapshot {
        GateMetricsSnapshot {
            checks: self.checks.load(Ordering::Relaxed),
            allowed: self.allowed.load(Ordering::Relaxed),
            allowed_unverified: self.allowed_unverified.load(Ordering::Relaxed),
            denied_credential: self.denied_credential.load(Ordering::Relaxed),
            denied_unavailable: self.denied_unavailable.load(Ordering::Relaxed),
            saturated: self.saturated.load(Ordering::Relaxed),
            timed_out: self.timed_out.load(Ordering::Relaxed),
        }
    }
}

/// A point-in-time copy of the gate's counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GateMetricsSnapshot {
    /// Admission checks started.
    pub checks: u64,
    /// Players admitted with a valid session.
    pub allowed: u64,
    /// Players admitted without a check because of fail-open.
    pub allowed_unverified: u64,
    /// Players denied for an invalid or expired session.
    pub denied_credential: u64,
    /// Players denied because the store was unavailable.
    pub denied_unavailable: u64,
    /// Checks that never got a slot before their deadline.
    pub saturated: u64,
    /// Checks whose validation ran past the deadline.
    pub timed_out: u64,
}
