//! lbprobe wire contract
//!
//! Generated tonic/prost bindings for the `echo.Echo` unary service.

pub mod echo {
    tonic::include_proto!("echo");
}

/// Encoded descriptors for the server reflection service
pub const FILE_DESCRIPTOR_SET: &[u8] = tonic::include_file_descriptor_set!("echo_descriptor");

pub use echo::echo_client::EchoClient;
pub use echo::echo_server::{Echo, EchoServer};
pub use echo::{EchoRequest, EchoResponse};
