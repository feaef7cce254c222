//! Per-request context handed to handlers.

use std::fmt;
use std::net::SocketAddr;

/// The transport a request arrived on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Protocol {
    Http,
    WsServer,
    WsClient,
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Http => "http",
            Self::WsServer => "ws-server",
            Self::WsClient => "ws-client",
        })
    }
}

/// Information about where a request came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestContext {
    pub protocol: Protocol,
    /// Peer address, when the transport knows it.
    pub remote_addr: Option<SocketAddr>,
    /// Connection identifier for WebSocket transports.
    pub connection_id: Option<u64>,
}

impl RequestContext {
    pub fn new(protocol: Protocol) -> Self {
        Self {
            protocol,
            remote_addr: None,
            connection_id: None,
        }
    }

    pub fn with_remote_addr(mut self, addr: Option<SocketAddr>) -> Self {
        self.remote_addr = addr;
        self
    }

    pub fn with_connection_id(mut self, id: u64) -> Self {
        self.connection_id = Some(id);
        self
    }
}
