//! Load test configuration
//!
//! A single explicit value handed to the orchestrator; nothing is read from
//! process-global state once a run starts.

use std::time::Duration;

use serde::Serialize;

use crate::error::{LoadTestError, Result};

pub const DEFAULT_TARGET: &str = "grpc-server.test.svc.cluster.local:9000";
pub const DEFAULT_TOTAL: u64 = 1_000;
pub const DEFAULT_CONCURRENCY: usize = 50;
pub const DEFAULT_CONNECTIONS: usize = 3;
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_DIAL_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_LOOP_INTERVAL: Duration = Duration::from_secs(10);

/// Largest per-cycle request count the work queue can hold.
pub const MAX_TOTAL: u64 = (usize::MAX >> 3) as u64;

/// Repeat settings for loop mode
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoopConfig {
    /// Pause between the end of one cycle and the start of the next
    pub interval: Duration,
    /// Stop after this many cycles; `None` runs until shut down
    pub max_cycles: Option<u64>,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_LOOP_INTERVAL,
            max_cycles: None,
        }
    }
}

/// Load test configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoadTestConfig {
    /// `host:port` of the load balancer (or a single replica)
    pub target: String,
    /// Requests issued per cycle
    pub total: u64,
    /// Number of concurrently running workers
    pub concurrency: usize,
    /// Size of the connection pool
    pub connections: usize,
    /// Deadline applied to every echo call
    pub request_timeout: Duration,
    /// Deadline for establishing each pooled connection
    pub dial_timeout: Duration,
    /// Loop mode settings; `None` runs exactly one cycle
    pub repeat: Option<LoopConfig>,
    /// Log every response and every failed request
    pub verbose: bool,
}

impl Default for LoadTestConfig {
    fn default() -> Self {
        Self {
            target: DEFAULT_TARGET.to_string(),
            total: DEFAULT_TOTAL,
            concurrency: DEFAULT_CONCURRENCY,
            connections: DEFAULT_CONNECTIONS,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            dial_timeout: DEFAULT_DIAL_TIMEOUT,
            repeat: None,
            verbose: false,
        }
    }
}

impl LoadTestConfig {
    /// Reject settings the engine cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.target.trim().is_empty() {
            return Err(LoadTestError::InvalidConfig("target must not be empty".into()));
        }
        if self.total > MAX_TOTAL {
            return Err(LoadTestError::InvalidConfig(format!(
                "total must not exceed {MAX_TOTAL}"
            )));
        }
        if self.concurrency == 0 {
            return Err(LoadTestError::InvalidConfig(
                "concurrency must be at least 1".into(),
            ));
        }
        if self.connections == 0 {
            return Err(LoadTestError::InvalidConfig(
                "connection count must be at least 1".into(),
            ));
        }
        if self.request_timeout.is_zero() {
            return Err(LoadTestError::InvalidConfig(
                "request timeout must be greater than zero".into(),
            ));
        }
        if self.dial_timeout.is_zero() {
            return Err(LoadTestError::InvalidConfig(
                "dial timeout must be greater than zero".into(),
            ));
        }
        if let Some(repeat) = &self.repeat {
            if repeat.interval.is_zero() {
                return Err(LoadTestError::InvalidConfig(
                    "loop interval must be greater than zero".into(),
                ));
            }
        }
        Ok(())
    }

    /// Upper bound on workers sharing one connection: `ceil(concurrency / connections)`.
    pub fn workers_per_connection(&self) -> usize {
        if self.connections == 0 {
            return self.concurrency;
        }
        self.concurrency.div_ceil(self.connections)
    }
}
