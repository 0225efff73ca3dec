//! Process-wide delivery counters.
//!
//! Delivery outcomes never reach the caller of `dispatch`, so these counters
//! (and the dead-letter log event) are the only place exhausted messages show
//! up.

use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::FailureKind;

#[derive(Debug, Default)]
pub struct DispatchStats {
    dispatched: AtomicU64,
    delivered: AtomicU64,
    retried: AtomicU64,
    exhausted: AtomicU64,
    rejected: AtomicU64,
    authentication_failures: AtomicU64,
    connection_failures: AtomicU64,
    timeout_failures: AtomicU64,
    unclassified_failures: AtomicU64,
    /// Unix millis of the last exhausted message, 0 if none.
    last_exhausted_ms: AtomicI64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub dispatched: u64,
    pub delivered: u64,
    pub retried: u64,
    pub exhausted: u64,
    pub rejected: u64,
    pub failures: FailureCounts,
    pub last_exhausted_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailureCounts {
    pub authentication: u64,
    pub connection: u64,
    pub timeout: u64,
    pub unclassified: u64,
}

impl DispatchStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_dispatched(&self) {
        self.dispatched.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_delivered(&self) {
        self.delivered.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_retry(&self) {
        self.retried.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_rejected(&self) {
        self.rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_exhausted(&self) {
        self.exhausted.fetch_add(1, Ordering::Relaxed);
        self.last_exhausted_ms
            .store(Utc::now().timestamp_millis(), Ordering::Relaxed);
    }

    pub fn record_failure(&self, kind: FailureKind) {
        let counter = match kind {
            FailureKind::Authentication => &self.authentication_failures,
            FailureKind::Connection => &self.connection_failures,
            FailureKind::Timeout => &self.timeout_failures,
            FailureKind::Unclassified => &self.unclassified_failures,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn delivered(&self) -> u64 {
        self.delivered.load(Ordering::Relaxed)
    }

    pub fn exhausted(&self) -> u64 {
        self.exhausted.load(Ordering::Relaxed)
    }

    /// Messages that reached any terminal state.
    pub fn finished(&self) -> u64 {
        self.delivered() + self.exhausted() + self.rejected.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        let last = self.last_exhausted_ms.load(Ordering::Relaxed);
        StatsSnapshot {
            dispatched: self.dispatched.load(Ordering::Relaxed),
            delivered: self.delivered(),
            retried: self.retried.load(Ordering::Relaxed),
            exhausted: self.exhausted(),
            rejected: self.rejected.load(Ordering::Relaxed),
            failures: FailureCounts {
                authentication: self.authentication_failures.load(Ordering::Relaxed),
                connection: self.connection_failures.load(Ordering::Relaxed),
                timeout: self.timeout_failures.load(Ordering::Relaxed),
                unclassified: self.unclassified_failures.load(Ordering::Relaxed),
            },
            last_exhausted_at: (last != 0)
                .then(|| DateTime::<Utc>::from_timestamp_millis(last))
                .flatten(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_counts() {
        let stats = DispatchStats::new();
        stats.record_dispatched();
        stats.record_dispatched();
        stats.record_failure(FailureKind::Timeout);
        stats.record_failure(FailureKind::Authentication);
        stats.record_retry();
        stats.record_delivered();

        let snap = stats.snapshot();
        assert_eq!(snap.dispatched, 2);
        assert_eq!(snap.delivered, 1);
        assert_eq!(snap.retried, 1);
        assert_eq!(snap.failures.timeout, 1);
        assert_eq!(snap.failures.authentication, 1);
        assert_eq!(snap.failures.connection, 0);
        assert!(snap.last_exhausted_at.is_none());
        assert_eq!(stats.finished(), 1);
    }

    #[test]
    fn test_exhausted_sets_timestamp() {
        let stats = DispatchStats::new();
        stats.record_exhausted();
        let snap = stats.snapshot();
        assert_eq!(snap.exhausted, 1);
        assert!(snap.last_exhausted_at.is_some());
    }
}
