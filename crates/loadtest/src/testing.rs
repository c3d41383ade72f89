//! In-memory transport used by unit tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::error::{LoadTestError, RequestError, Result};
use crate::transport::{EchoConnection, EchoConnector, EchoReply};

/// How a fake connection answers.
#[derive(Debug, Clone)]
pub enum Behavior {
    /// Answer as replica `<name>-<connection index>`
    PerConnection(&'static str),
    /// Answer as the same replica regardless of connection
    Fixed(&'static str),
    /// Sleep for the given time before answering
    Slow(Duration),
    /// Fail every call with an `UNAVAILABLE` status
    Fail,
    /// Panic on calls whose message matches
    PanicOn(&'static str),
}

#[derive(Debug, Default)]
pub struct CallLog {
    calls: Mutex<Vec<(usize, String)>>,
}

impl CallLog {
    /// `(connection index, request message)` in arrival order
    pub fn calls(&self) -> Vec<(usize, String)> {
        self.calls.lock().clone()
    }
}

#[derive(Debug, Clone)]
pub struct FakeConnector {
    pub behavior: Behavior,
    pub fail_at: Option<usize>,
    pub log: Arc<CallLog>,
    pub dialed: Arc<AtomicUsize>,
}

impl FakeConnector {
    pub fn new(behavior: Behavior) -> Self {
        Self {
            behavior,
            fail_at: None,
            log: Arc::new(CallLog::default()),
            dialed: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn failing_at(mut self, index: usize) -> Self {
        self.fail_at = Some(index);
        self
    }
}

#[async_trait]
impl EchoConnector for FakeConnector {
    type Connection = FakeConnection;

    async fn connect(
        &self,
        target: &str,
        index: usize,
        _dial_timeout: Duration,
    ) -> Result<FakeConnection> {
        if self.fail_at == Some(index) {
            return Err(LoadTestError::Connection {
                target: target.to_string(),
                index,
                reason: "connection refused".into(),
            });
        }
        self.dialed.fetch_add(1, Ordering::SeqCst);
        Ok(FakeConnection {
            index,
            behavior: self.behavior.clone(),
            log: Arc::clone(&self.log),
        })
    }
}

#[derive(Debug, Clone)]
pub struct FakeConnection {
    pub index: usize,
    behavior: Behavior,
    log: Arc<CallLog>,
}

#[async_trait]
impl EchoConnection for FakeConnection {
    async fn echo(
        &self,
        message: String,
        deadline: Duration,
    ) -> std::result::Result<EchoReply, RequestError> {
        self.log.calls.lock().push((self.index, message.clone()));

        let name = match &self.behavior {
            Behavior::PerConnection(prefix) => format!("{prefix}-{}", self.index),
            Behavior::Fixed(name) => name.to_string(),
            Behavior::Slow(delay) => {
                if *delay >= deadline {
                    tokio::time::sleep(deadline).await;
                    return Err(RequestError::DeadlineExceeded(deadline));
                }
                tokio::time::sleep(*delay).await;
                "slow".to_string()
            }
            Behavior::Fail => {
                return Err(RequestError::Status(tonic::Status::unavailable("broken pipe")));
            }
            Behavior::PanicOn(trigger) => {
                if message == *trigger {
                    panic!("fake transport fault");
                }
                "steady".to_string()
            }
        };

        Ok(EchoReply {
            message,
            hostname: String::new(),
            replica_name: name,
            replica_address: "127.0.0.1".into(),
        })
    }
}
