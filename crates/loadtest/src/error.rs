//! Error types for the load engine

use std::time::Duration;

use thiserror::Error;

/// Failures that abort a load test before any request is sent.
#[derive(Error, Debug)]
pub enum LoadTestError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid target {target}: {reason}")]
    InvalidTarget { target: String, reason: String },

    #[error("Failed to connect to {target} (connection {index}): {reason}")]
    Connection {
        target: String,
        index: usize,
        reason: String,
    },

    #[error("Connection {index} to {target} timed out after {timeout:?}")]
    ConnectTimeout {
        target: String,
        index: usize,
        timeout: Duration,
    },
}

/// Failure of a single echo call. Always contained to the issuing worker.
#[derive(Error, Debug)]
pub enum RequestError {
    #[error("Deadline of {0:?} exceeded")]
    DeadlineExceeded(Duration),

    #[error("RPC failed: {0}")]
    Status(#[from] tonic::Status),

    #[error("Echo call panicked on worker {worker}")]
    Panicked { worker: usize },
}

pub type Result<T> = std::result::Result<T, LoadTestError>;
