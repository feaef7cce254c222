//! # OneBot Transport
//!
//! Network transports for OneBot v11 actions and events.
//!
//! Every transport takes its handlers from `onebot-core`: an
//! [`ActionRequestHandler`](onebot_core::ActionRequestHandler) for actions and,
//! where events are ingested, an
//! [`EventRequestHandler`](onebot_core::EventRequestHandler).
//!
//! ## Features
//!
//! - `http-server`: actions over HTTP plus event ingestion on a POST route
//! - `http-client`: calls actions on a remote HTTP endpoint
//! - `ws-server`: forward WebSocket (`/api`, `/event`, universal)
//! - `ws-client`: reverse WebSocket with automatic reconnection
//! - `unified`: HTTP and WebSocket behind one listener
//! - `full` (default): all of the above
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────┐
//! │  onebot-runtime          │  (config, lifecycle)
//! ├──────────────────────────┤
//! │  onebot-transport        │  <- This crate
//! │  HttpServer  WsServer    │
//! │  WsClient    Unified     │
//! ├──────────────────────────┤
//! │  onebot-core             │  (envelopes, dispatchers)
//! ├──────────────────────────┤
//! │  Network (TCP/HTTP/WS)   │
//! └──────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use onebot_core::{ActionDispatcher, ActionRawResponse, HttpServerConfig};
//! use onebot_transport::HttpServer;
//! use tokio_util::sync::CancellationToken;
//!
//! let mut actions = ActionDispatcher::new();
//! actions.register_fn("get_status", |_ctx, _params| async {
//!     Ok(Some(ActionRawResponse::ok(serde_json::json!({"online": true}))))
//! });
//!
//! let server = HttpServer::new(HttpServerConfig::new("127.0.0.1:5700"), Arc::new(actions));
//! server.start(CancellationToken::new()).await?;
//! ```

pub mod error;

#[cfg(any(feature = "http-server", feature = "ws-server"))]
pub mod access;
#[cfg(any(feature = "http-server", feature = "ws-server"))]
pub mod server;

#[cfg(any(feature = "http-client", feature = "http-server"))]
pub mod http;

#[cfg(any(feature = "ws-client", feature = "ws-server"))]
pub mod websocket;

#[cfg(feature = "unified")]
mod unified;

pub use error::{TransportError, TransportResult};

#[cfg(feature = "http-client")]
pub use error::{ClientError, ClientResult};

#[cfg(any(feature = "http-server", feature = "ws-server"))]
pub use access::{AccessError, OriginCheck, allow_any_origin, check_access};

#[cfg(feature = "http-server")]
pub use http::HttpServer;

#[cfg(feature = "http-client")]
pub use http::HttpActionClient;

#[cfg(feature = "ws-server")]
pub use websocket::WsServer;

#[cfg(feature = "ws-client")]
pub use websocket::{ClientState, WsClient};

#[cfg(feature = "unified")]
pub use unified::UnifiedServer;
