//! lbprobe load engine
//!
//! Measures how evenly a load balancer spreads unary gRPC calls across its
//! replicas. A fixed pool of connections is dialed once; each test cycle
//! drains a pre-filled work queue with a fixed set of workers and tallies
//! which replica answered every successful call.
//!
//! ## Modules
//! - `config`: explicit run configuration and validation
//! - `transport`: connector/connection seam and the tonic implementation
//! - `pool`: fixed-size connection pool with round-robin assignment
//! - `dispatch`: work queue and worker pool
//! - `stats`: thread-safe replica distribution and counters
//! - `identity`: replica identity keys derived from responses
//! - `runner`: single-cycle orchestration and the loop driver

pub mod config;
pub mod dispatch;
pub mod error;
pub mod identity;
pub mod pool;
pub mod runner;
pub mod stats;
pub mod transport;

#[cfg(test)]
mod testing;

pub use config::{LoadTestConfig, LoopConfig};
pub use dispatch::{run_workers, DispatchSettings};
pub use error::{LoadTestError, RequestError, Result};
pub use identity::ReplicaKey;
pub use pool::ConnectionPool;
pub use runner::{RunOrchestrator, RunReport};
pub use stats::{ReplicaCount, RunStats, StatsSnapshot};
pub use transport::{EchoConnection, EchoConnector, EchoReply, GrpcConnection, GrpcConnector};
