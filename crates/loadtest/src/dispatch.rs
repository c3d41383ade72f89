//! Worker pool dispatch
//!
//! A run fills a bounded queue with `total` tokens, closes it, then lets
//! `concurrency` workers drain it. Worker `w` sends every request over
//! connection `w mod pool_size`. `run_workers` returns only after every
//! worker has terminated, so counters read afterwards are final.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, error, info, warn};

use crate::error::RequestError;
use crate::identity::ReplicaKey;
use crate::pool::ConnectionPool;
use crate::stats::RunStats;
use crate::transport::EchoConnection;

/// Parameters of one dispatch round
#[derive(Debug, Clone, Copy)]
pub struct DispatchSettings {
    pub total: u64,
    pub concurrency: usize,
    pub request_timeout: Duration,
    pub verbose: bool,
}

type WorkQueue = Arc<Mutex<mpsc::Receiver<u64>>>;

/// Pre-filled, closed queue holding tokens `0..total`.
///
/// `total` must not exceed [`MAX_TOTAL`](crate::config::MAX_TOTAL); `LoadTestConfig::validate` enforces it.
async fn fill_queue(total: u64) -> WorkQueue {
    let capacity = usize::try_from(total).unwrap_or(usize::MAX).max(1);
    let (tx, rx) = mpsc::channel(capacity);
    for token in 0..total {
        if tx.send(token).await.is_err() {
            break;
        }
    }
    // Dropping the only sender closes the queue.
    drop(tx);
    Arc::new(Mutex::new(rx))
}

/// Payload sent by a worker; replicas echo it back unchanged.
pub fn request_message(worker: usize) -> String {
    format!("test-{worker}")
}

/// Run one dispatch round over `pool`, recording outcomes into `stats`.
pub async fn run_workers<C>(
    pool: &ConnectionPool<C>,
    settings: DispatchSettings,
    stats: Arc<RunStats>,
) where
    C: EchoConnection,
{
    let queue = fill_queue(settings.total).await;

    let mut workers = Vec::with_capacity(settings.concurrency);
    for worker in 0..settings.concurrency {
        let connection = pool.connection(worker).clone();
        let slot = pool.slot(worker);
        let queue = Arc::clone(&queue);
        let stats = Arc::clone(&stats);
        workers.push(tokio::spawn(async move {
            run_worker(worker, slot, connection, queue, stats, settings).await
        }));
    }

    // Join barrier: nothing reads the counters until every worker is gone.
    for (worker, handle) in workers.into_iter().enumerate() {
        if let Err(err) = handle.await {
            error!(worker, error = %err, "worker terminated abnormally");
        }
    }
}

async fn run_worker<C>(
    worker: usize,
    slot: usize,
    connection: C,
    queue: WorkQueue,
    stats: Arc<RunStats>,
    settings: DispatchSettings,
) -> u64
where
    C: EchoConnection,
{
    let message = request_message(worker);
    let mut handled = 0u64;

    loop {
        let token = {
            let mut rx = queue.lock().await;
            rx.recv().await
        };
        let Some(token) = token else { break };
        handled += 1;

        let call = connection.echo(message.clone(), settings.request_timeout);
        let outcome = match AssertUnwindSafe(call).catch_unwind().await {
            Ok(result) => result,
            Err(_) => Err(RequestError::Panicked { worker }),
        };

        match outcome {
            Ok(reply) => {
                let key = ReplicaKey::from_reply(&reply);
                stats.record(key.as_str());
                stats.record_completed();
                if settings.verbose {
                    info!(worker, token, message = %reply.message, replica = %key, "response");
                }
            }
            Err(err) => {
                stats.record_error();
                if matches!(err, RequestError::Panicked { .. }) {
                    error!(worker, token, error = %err, "request failed");
                } else if settings.verbose {
                    warn!(worker, token, error = %err, "request failed");
                }
            }
        }
    }

    debug!(worker, connection = slot, handled, "worker finished");
    handled
}
