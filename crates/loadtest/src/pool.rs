//! Fixed-size connection pool
//!
//! All connections are dialed up front. The pool is immutable afterwards, so
//! workers read from it concurrently without locking.

use std::time::Duration;

use tracing::{debug, info};

use crate::error::{LoadTestError, Result};
use crate::transport::EchoConnector;

/// Pre-established connections to a single target
#[derive(Debug)]
pub struct ConnectionPool<C> {
    target: String,
    connections: Vec<C>,
}

impl<C> ConnectionPool<C> {
    /// Dial `count` connections to `target`, each bounded by `dial_timeout`.
    ///
    /// The first failure aborts construction; connections dialed so far are
    /// dropped with the partial vector.
    pub async fn connect<K>(
        connector: &K,
        target: &str,
        count: usize,
        dial_timeout: Duration,
    ) -> Result<Self>
    where
        K: EchoConnector<Connection = C>,
    {
        if count == 0 {
            return Err(LoadTestError::InvalidConfig(
                "connection pool size must be at least 1".into(),
            ));
        }

        info!(endpoint = %target, count, "establishing connections");
        let mut connections = Vec::with_capacity(count);
        for index in 0..count {
            let connection = connector.connect(target, index, dial_timeout).await?;
            connections.push(connection);
        }
        info!(endpoint = %target, count, "connected");

        Ok(Self {
            target: target.to_string(),
            connections,
        })
    }

    /// Build a pool from connections that are already established.
    pub fn from_connections(target: impl Into<String>, connections: Vec<C>) -> Result<Self> {
        if connections.is_empty() {
            return Err(LoadTestError::InvalidConfig(
                "connection pool size must be at least 1".into(),
            ));
        }
        Ok(Self {
            target: target.into(),
            connections,
        })
    }

    /// Round-robin assignment: worker `w` always gets connection `w mod len`.
    pub fn connection(&self, worker_index: usize) -> &C {
        &self.connections[self.slot(worker_index)]
    }

    /// Index of the connection assigned to `worker_index`.
    pub fn slot(&self, worker_index: usize) -> usize {
        worker_index % self.connections.len()
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    pub fn target(&self) -> &str {
        &self.target
    }
}

impl<C> Drop for ConnectionPool<C> {
    fn drop(&mut self) {
        debug!(endpoint = %self.target, count = self.connections.len(), "releasing connections");
    }
}
