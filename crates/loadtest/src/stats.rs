//! Per-run response statistics
//!
//! `RunStats` is shared by every worker of a run: the replica distribution
//! sits behind one mutex, the completed/error counters are plain atomics.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use serde::Serialize;

/// Thread-safe aggregator for one test run
#[derive(Debug, Default)]
pub struct RunStats {
    distribution: Mutex<HashMap<String, u64>>,
    completed: AtomicU64,
    errors: AtomicU64,
}

impl RunStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one response from the replica identified by `key`.
    pub fn record(&self, key: &str) {
        let mut distribution = self.distribution.lock();
        match distribution.get_mut(key) {
            Some(count) => *count += 1,
            None => {
                distribution.insert(key.to_string(), 1);
            }
        }
    }

    pub fn record_completed(&self) {
        self.completed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn completed(&self) -> u64 {
        self.completed.load(Ordering::Relaxed)
    }

    pub fn errors(&self) -> u64 {
        self.errors.load(Ordering::Relaxed)
    }

    /// Distribution sorted by count descending, ties broken by key ascending.
    pub fn snapshot(&self) -> StatsSnapshot {
        let mut entries: Vec<ReplicaCount> = self
            .distribution
            .lock()
            .iter()
            .map(|(key, count)| ReplicaCount {
                key: key.clone(),
                count: *count,
            })
            .collect();
        entries.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.key.cmp(&b.key)));
        StatsSnapshot { entries }
    }
}

/// Hits attributed to one replica
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReplicaCount {
    pub key: String,
    pub count: u64,
}

/// Immutable, ordered view of a run's replica distribution
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    entries: Vec<ReplicaCount>,
}

impl StatsSnapshot {
    pub fn entries(&self) -> &[ReplicaCount] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of distinct replicas that answered
    pub fn unique_replicas(&self) -> usize {
        self.entries.len()
    }

    /// Sum of all recorded counts (successful responses only)
    pub fn total(&self) -> u64 {
        self.entries.iter().map(|entry| entry.count).sum()
    }

    pub fn count_for(&self, key: &str) -> Option<u64> {
        self.entries
            .iter()
            .find(|entry| entry.key == key)
            .map(|entry| entry.count)
    }

    /// `(key, share of successful responses in percent)` in snapshot order
    pub fn percentages(&self) -> Vec<(&str, f64)> {
        let total = self.total();
        if total == 0 {
            return Vec::new();
        }
        self.entries
            .iter()
            .map(|entry| (entry.key.as_str(), entry.count as f64 / total as f64 * 100.0))
            .collect()
    }
}

impl fmt::Display for StatsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.entries.is_empty() {
            return writeln!(f, "No responses received");
        }

        writeln!(f, "=== Replica Distribution ===")?;
        for (entry, (_, pct)) in self.entries.iter().zip(self.percentages()) {
            writeln!(f, "  {:>6} ({:.1}%) - {}", entry.count, pct, entry.key)?;
        }
        writeln!(f)?;
        writeln!(f, "Total responses: {}", self.total())?;
        writeln!(f, "Unique replicas: {}", self.unique_replicas())
    }
}
