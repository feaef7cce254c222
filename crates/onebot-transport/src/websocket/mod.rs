//! WebSocket transports.
//!
//! Both directions share [`WsConnection`]: a serialized writer plus a read
//! loop answering action frames in arrival order.

pub mod connection;
pub use connection::{ConnectionGroup, ConnectionRole, FrameSink, WsConnection};

#[cfg(feature = "ws-client")]
mod client;
#[cfg(feature = "ws-client")]
pub use client::{ClientState, WsClient};

#[cfg(feature = "ws-server")]
mod server;
#[cfg(feature = "ws-server")]
pub use server::WsServer;
