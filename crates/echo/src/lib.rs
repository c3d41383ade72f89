//! lbprobe echo replica
//!
//! Answers every `Echo` call with the request message plus the identity of
//! the replica that served it. Identity comes from the Kubernetes downward
//! API variables (`POD_NAME`, `POD_IP`) with the OS hostname as fallback.
//! Server reflection is registered alongside `Echo` for debugging with
//! tools such as `grpcurl`.

use std::future::Future;
use std::time::Duration;

use anyhow::Result;
use lbprobe_proto::{Echo, EchoRequest, EchoResponse, EchoServer, FILE_DESCRIPTOR_SET};
use sysinfo::{System, SystemExt};
use tokio::net::TcpListener;
use tokio_stream::wrappers::TcpListenerStream;
use tonic::{Request, Response, Status};
use tracing::{debug, info, warn};

pub const UNKNOWN: &str = "unknown";

/// Identity fields reported in every response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplicaInfo {
    pub hostname: String,
    pub replica_name: String,
    pub replica_address: String,
}

impl ReplicaInfo {
    pub fn new(
        hostname: impl Into<String>,
        replica_name: impl Into<String>,
        replica_address: impl Into<String>,
    ) -> Self {
        Self {
            hostname: hostname.into(),
            replica_name: replica_name.into(),
            replica_address: replica_address.into(),
        }
    }

    /// Identity of the current process.
    pub fn from_env() -> Self {
        Self::resolve(|name| std::env::var(name).ok(), os_hostname)
    }

    /// Resolve identity from an environment lookup and a hostname source.
    ///
    /// Hostname: `hostname_source`, then `"unknown"`.
    /// Name: `POD_NAME`, then the hostname. Address: `POD_IP`, then `"unknown"`.
    pub fn resolve<E, H>(lookup: E, hostname_source: H) -> Self
    where
        E: Fn(&str) -> Option<String>,
        H: FnOnce() -> Option<String>,
    {
        let non_empty = |value: Option<String>| {
            value
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let hostname = non_empty(hostname_source()).unwrap_or_else(|| UNKNOWN.to_string());
        let replica_name = non_empty(lookup("POD_NAME")).unwrap_or_else(|| hostname.clone());
        let replica_address = non_empty(lookup("POD_IP")).unwrap_or_else(|| UNKNOWN.to_string());

        Self {
            hostname,
            replica_name,
            replica_address,
        }
    }
}

/// Hostname as reported by the operating system.
fn os_hostname() -> Option<String> {
    let hostname = System::new().host_name();
    if hostname.is_none() {
        warn!("failed to get hostname from the OS");
    }
    hostname
}

/// `Echo` service implementation
#[derive(Debug, Clone)]
pub struct EchoService {
    replica: ReplicaInfo,
    delay: Duration,
}

impl EchoService {
    pub fn new(replica: ReplicaInfo) -> Self {
        Self {
            replica,
            delay: Duration::ZERO,
        }
    }

    /// Hold every response for `delay` before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn replica(&self) -> &ReplicaInfo {
        &self.replica
    }
}

#[tonic::async_trait]
impl Echo for EchoService {
    async fn echo(&self, request: Request<EchoRequest>) -> Result<Response<EchoResponse>, Status> {
        let message = request.into_inner().message;
        debug!(message = %message, "echo");

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        Ok(Response::new(EchoResponse {
            message,
            hostname: self.replica.hostname.clone(),
            replica_name: self.replica.replica_name.clone(),
            replica_address: self.replica.replica_address.clone(),
        }))
    }
}

/// Serve `service` and server reflection on an already-bound listener until
/// `shutdown` resolves.
pub async fn serve<F>(listener: TcpListener, service: EchoService, shutdown: F) -> Result<()>
where
    F: Future<Output = ()>,
{
    let reflection = tonic_reflection::server::Builder::configure()
        .register_encoded_file_descriptor_set(FILE_DESCRIPTOR_SET)
        .build()?;

    if let Ok(addr) = listener.local_addr() {
        info!(%addr, replica = %service.replica.replica_name, "echo server listening");
    }

    tonic::transport::Server::builder()
        .add_service(EchoServer::new(service))
        .add_service(reflection)
        .serve_with_incoming_shutdown(TcpListenerStream::new(listener), shutdown)
        .await?;
    Ok(())
}
