//! # OneBot
//!
//! OneBot v11 actions and events over HTTP and WebSocket.
//!
//! ## Architecture
//!
//! ```text
//!                ┌────────────────┐      ┌──────────────────┐
//!  HTTP ────────▶│                │─────▶│ ActionDispatcher │──▶ action handlers
//!  WS (fwd) ────▶│   transports   │      └──────────────────┘
//!  WS (rev) ────▶│                │      ┌──────────────────┐
//!  Unified ─────▶│                │─────▶│ EventDispatcher  │──▶ event handlers
//!                └────────────────┘      └──────────────────┘
//! ```
//!
//! - **core**: envelopes, error taxonomy, dispatchers, event registry
//! - **event**: OneBot v11 event types and the default registry
//! - **transport**: HTTP server/client, WebSocket server/client, unified server
//! - **runtime**: configuration, logging and lifecycle
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use onebot::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut actions = ActionDispatcher::new();
//!     actions.register_fn("get_status", |_ctx, _params| async {
//!         Ok(Some(ActionRawResponse::ok(serde_json::json!({"online": true}))))
//!     });
//!
//!     let runtime = OneBotRuntime::builder().actions(actions).build()?;
//!     runtime.run_until_ctrl_c().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - `toml-config` (default): load `onebot.toml`
//! - `yaml-config`: load `onebot.yaml`
//! - `json-log`: JSON log output

pub use onebot_core as core;
pub use onebot_event as event;
pub use onebot_runtime as runtime;
pub use onebot_transport as transport;

/// Prelude module for convenient imports.
///
/// ```rust,ignore
/// use onebot::prelude::*;
/// ```
pub mod prelude {
    // Runtime - main entry point
    pub use onebot_runtime::{OneBotConfig, OneBotRuntime};

    // Dispatch
    pub use onebot_core::{
        ActionDispatcher, ActionError, ActionRawResponse, ActionResult, Binder, BoxedEvent,
        EventDispatcher, EventHandlerResult, Params, QuickOperation, RequestContext,
    };

    // Events
    pub use onebot_event::{GroupMessageEvent, PrivateMessageEvent};

    // Transports
    pub use onebot_transport::{
        HttpActionClient, HttpServer, UnifiedServer, WsClient, WsServer,
    };
}
