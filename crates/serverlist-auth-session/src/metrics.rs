//! Failure counters for session stores.
//!
//! A single failed lookup is noise. A steady stream of pool exhaustions
//! means the pool is too small or the database is too slow, and
//! operators need a number to watch.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::StoreError;

/// Running counts of store failures, shared between the store and
/// whoever reports on it.
#[derive(Debug, Default)]
pub struct StoreMetrics {
    pool_exhaustions: AtomicU64,
    unavailable: AtomicU64,
    query_errors: AtomicU64,
}

/// A point-in-time copy of [`StoreMetrics`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreMetricsSnapshot {
    /// Lookups that found every pooled connection busy.
    pub pool_exhaustions: u64,
    /// Lookups that could not reach the backend at all.
    pub unavailable: u64,
    /// Lookups the backend answered with an error.
    pub query_errors: u64,
}

impl StoreMetrics {
    /// Creates zeroed counters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Counts `err` under its category and logs it.
    ///
    /// Pool exhaustion is logged at `warn` with the running total so
    /// saturation shows up in logs without a metrics pipeline.
    pub fn record(&self, err: &StoreError) {
        match err {
            StoreError::PoolExhausted => {
                let total =
                    self.pool_exhaustions.fetch_add(1, Ordering::Relaxed) + 1;
                tracing::warn!(
                    pool_exhaustions = total,
                    "session store pool exhausted"
                );
            }
            StoreError::Unavailable(cause) => {
                let total = self.unavailable.fetch_add(1, Ordering::Relaxed) + 1;
                tracing::warn!(%cause, unavailable = total, "session store unavailable");
            }
            StoreError::Query(cause) => {
                let total =
                    self.query_errors.fetch_add(1, Ordering::Relaxed) + 1;
                tracing::error!(%cause, query_errors = total, "session store query failed");
            }
        }
    }

    /// Copies the current counts.
    pub fn snapshot(&self) -> StoreMetricsSnapshot {
        StoreMetricsSnapshot {
            pool_exhaustions: self.pool_exhaustions.load(Ordering::Relaxed),
            unavailable: self.unavailable.load(Ordering::Relaxed),
            query_errors: self.query_errors.load(Ordering::Relaxed),
        }
    }
}
