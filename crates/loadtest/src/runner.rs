//! Run orchestration and loop driver
//!
//! Each cycle gets a fresh `RunStats`, queue and worker set; only the
//! connection pool outlives a cycle. Nothing is carried from one cycle's
//! report into the next.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::info;

use crate::config::LoadTestConfig;
use crate::dispatch::{run_workers, DispatchSettings};
use crate::pool::ConnectionPool;
use crate::stats::{RunStats, StatsSnapshot};
use crate::transport::EchoConnection;

const SEPARATOR: &str = "==================================================";

/// Outcome of one completed test cycle
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub target: String,
    pub total: u64,
    pub concurrency: usize,
    pub connections: usize,
    pub duration: Duration,
    pub completed: u64,
    pub errors: u64,
    pub stats: StatsSnapshot,
}

impl RunReport {
    /// Offered load: every requested call, failed ones included, over wall time.
    pub fn requests_per_second(&self) -> f64 {
        let secs = self.duration.as_secs_f64();
        if secs > 0.0 {
            self.total as f64 / secs
        } else {
            0.0
        }
    }

    /// Share of requests that completed successfully, in percent.
    pub fn success_rate(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.completed as f64 / self.total as f64 * 100.0
        }
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f)?;
        writeln!(f, "{SEPARATOR}")?;
        writeln!(f, "Test completed in {:.2?}", self.duration)?;
        writeln!(f, "Successful: {}", self.completed)?;
        writeln!(f, "Errors:     {}", self.errors)?;
        writeln!(f, "Success:    {:.1}%", self.success_rate())?;
        writeln!(f, "RPS:        {:.2}", self.requests_per_second())?;
        writeln!(f)?;
        write!(f, "{}", self.stats)?;
        writeln!(f, "{SEPARATOR}")
    }
}

/// Drives test cycles against one long-lived connection pool
#[derive(Debug)]
pub struct RunOrchestrator<C> {
    pool: ConnectionPool<C>,
    config: LoadTestConfig,
}

impl<C> RunOrchestrator<C>
where
    C: EchoConnection,
{
    pub fn new(pool: ConnectionPool<C>, config: LoadTestConfig) -> Self {
        Self { pool, config }
    }

    pub fn config(&self) -> &LoadTestConfig {
        &self.config
    }

    pub fn pool(&self) -> &ConnectionPool<C> {
        &self.pool
    }

    /// Run one full cycle: fill queue, run workers, wait for all, report.
    pub async fn execute_once(&self) -> RunReport {
        let stats = Arc::new(RunStats::new());
        let settings = DispatchSettings {
            total: self.config.total,
            concurrency: self.config.concurrency,
            request_timeout: self.config.request_timeout,
            verbose: self.config.verbose,
        };

        let start = Instant::now();
        run_workers(&self.pool, settings, Arc::clone(&stats)).await;
        let duration = start.elapsed();

        let report = RunReport {
            target: self.pool.target().to_string(),
            total: self.config.total,
            concurrency: self.config.concurrency,
            connections: self.pool.len(),
            duration,
            completed: stats.completed(),
            errors: stats.errors(),
            stats: stats.snapshot(),
        };
        info!(
            completed = report.completed,
            errors = report.errors,
            rps = report.requests_per_second(),
            "test cycle finished"
        );
        report
    }

    /// Repeat `execute_once` every `interval` until `max_cycles` cycles have
    /// run or `shutdown` resolves. Shutdown is only observed between cycles.
    /// Returns the number of cycles that completed.
    pub async fn run_loop<S, F>(
        &self,
        interval: Duration,
        max_cycles: Option<u64>,
        shutdown: S,
        mut on_report: F,
    ) -> u64
    where
        S: Future<Output = ()>,
        F: FnMut(&RunReport),
    {
        tokio::pin!(shutdown);
        let mut cycles = 0u64;

        loop {
            let report = self.execute_once().await;
            cycles += 1;
            on_report(&report);

            if max_cycles.is_some_and(|max| cycles >= max) {
                break;
            }

            info!(?interval, "waiting before next run");
            tokio::select! {
                _ = tokio::time::sleep(interval) => {}
                _ = &mut shutdown => {
                    info!(cycles, "loop stopped");
                    break;
                }
            }
        }

        cycles
    }
}
