//! Replica identity keys derived from echo responses

use std::fmt;

use crate::transport::EchoReply;

/// Canonical identity of the replica that produced a response.
///
/// Rendered as `name (address)`, or `name / hostname (address)` when the
/// replica reports a hostname different from its name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ReplicaKey(String);

impl ReplicaKey {
    pub fn new(name: &str, hostname: &str, address: &str) -> Self {
        if !hostname.is_empty() && hostname != name {
            Self(format!("{name} / {hostname} ({address})"))
        } else {
            Self(format!("{name} ({address})"))
        }
    }

    pub fn from_reply(reply: &EchoReply) -> Self {
        Self::new(&reply.replica_name, &reply.hostname, &reply.replica_address)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ReplicaKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
