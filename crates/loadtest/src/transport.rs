//! Transport seam for the unary echo call
//!
//! The engine only needs two things from the RPC layer: a way to open one
//! connection to a target and a way to issue one deadline-bounded echo over
//! it. `GrpcConnector` provides both on top of tonic; tests plug in fakes.

use std::time::Duration;

use async_trait::async_trait;
use lbprobe_proto::{EchoClient, EchoRequest, EchoResponse};
use tonic::transport::{Channel, Endpoint};
use tracing::debug;

use crate::error::{LoadTestError, RequestError, Result};

/// Transport-neutral echo response
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EchoReply {
    pub message: String,
    pub hostname: String,
    pub replica_name: String,
    pub replica_address: String,
}

impl From<EchoResponse> for EchoReply {
    fn from(response: EchoResponse) -> Self {
        Self {
            message: response.message,
            hostname: response.hostname,
            replica_name: response.replica_name,
            replica_address: response.replica_address,
        }
    }
}

/// Opens single connections to a target.
#[async_trait]
pub trait EchoConnector: Send + Sync {
    type Connection: EchoConnection;

    /// Establish connection number `index` to `target` within `dial_timeout`.
    async fn connect(
        &self,
        target: &str,
        index: usize,
        dial_timeout: Duration,
    ) -> Result<Self::Connection>;
}

/// One established connection able to carry concurrent echo calls.
#[async_trait]
pub trait EchoConnection: Clone + Send + Sync + 'static {
    async fn echo(
        &self,
        message: String,
        deadline: Duration,
    ) -> std::result::Result<EchoReply, RequestError>;
}

/// Normalise a `host:port` target into a URI tonic can dial.
pub fn endpoint_uri(target: &str) -> Result<String> {
    let trimmed = target.trim();
    if trimmed.is_empty() {
        return Err(LoadTestError::InvalidTarget {
            target: target.to_string(),
            reason: "empty target".into(),
        });
    }
    if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        Ok(trimmed.to_string())
    } else {
        Ok(format!("http://{trimmed}"))
    }
}

/// Plaintext gRPC connector; every `connect` opens a dedicated HTTP/2 channel.
#[derive(Debug, Clone, Default)]
pub struct GrpcConnector;

#[async_trait]
impl EchoConnector for GrpcConnector {
    type Connection = GrpcConnection;

    async fn connect(
        &self,
        target: &str,
        index: usize,
        dial_timeout: Duration,
    ) -> Result<GrpcConnection> {
        let uri = endpoint_uri(target)?;
        let endpoint = Endpoint::from_shared(uri).map_err(|err| LoadTestError::InvalidTarget {
            target: target.to_string(),
            reason: err.to_string(),
        })?;
        let endpoint = endpoint.connect_timeout(dial_timeout);

        let channel = match tokio::time::timeout(dial_timeout, endpoint.connect()).await {
            Ok(Ok(channel)) => channel,
            Ok(Err(err)) => {
                return Err(LoadTestError::Connection {
                    target: target.to_string(),
                    index,
                    reason: err.to_string(),
                })
            }
            Err(_) => {
                return Err(LoadTestError::ConnectTimeout {
                    target: target.to_string(),
                    index,
                    timeout: dial_timeout,
                })
            }
        };

        debug!(endpoint = %target, index, "connection established");
        Ok(GrpcConnection {
            client: EchoClient::new(channel),
        })
    }
}

/// Echo client bound to one channel. Clones share the underlying connection.
#[derive(Debug, Clone)]
pub struct GrpcConnection {
    client: EchoClient<Channel>,
}

#[async_trait]
impl EchoConnection for GrpcConnection {
    async fn echo(
        &self,
        message: String,
        deadline: Duration,
    ) -> std::result::Result<EchoReply, RequestError> {
        let mut client = self.client.clone();
        let mut request = tonic::Request::new(EchoRequest { message });
        request.set_timeout(deadline);

        match tokio::time::timeout(deadline, client.echo(request)).await {
            Ok(Ok(response)) => Ok(response.into_inner().into()),
            Ok(Err(status)) if status.code() == tonic::Code::DeadlineExceeded => {
                Err(RequestError::DeadlineExceeded(deadline))
            }
            Ok(Err(status)) => Err(RequestError::Status(status)),
            Err(_) => Err(RequestError::DeadlineExceeded(deadline)),
        }
    }
}
