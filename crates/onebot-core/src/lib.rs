//! # OneBot Core
//!
//! Transport-independent building blocks of the OneBot v11 transport layer.
//!
//! ```text
//!               ┌──────────────────┐   name    ┌───────────────┐
//! action ──────▶│ ActionDispatcher │──────────▶│ ActionHandler │
//!               └──────────────────┘           └───────────────┘
//!               ┌───────────────────┐  post_type/type/sub_type  ┌──────────────┐
//! payload ─────▶│ EventTypeRegistry │──▶ BoxedEvent ──▶ EventDispatcher ──▶ EventHandler │
//!               └───────────────────┘                           └──────────────┘
//! ```
//!
//! - [`envelope`]: action wire shapes and retcodes
//! - [`error`]: the error taxonomy and its retcode mapping
//! - [`action`]: [`ActionDispatcher`] and frame handling
//! - [`binder`]: typed action handlers
//! - [`event`], [`event_dispatcher`], [`registry`]: event decoding and routing
//! - [`config`]: serde configuration for every transport

pub mod action;
pub mod binder;
pub mod config;
pub mod context;
pub mod envelope;
pub mod error;
pub mod event;
pub mod event_dispatcher;
pub mod registry;

pub use action::{
    ActionDispatcher, ActionHandler, ActionRequestHandler, FnHandler, RejectActions,
    handle_action_frame, into_raw_response,
};
pub use binder::{Binder, decode_params};
pub use config::{
    HttpClientConfig, HttpServerConfig, UnifiedConfig, WsClientConfig, WsServerConfig,
};
pub use context::{Protocol, RequestContext};
pub use envelope::{
    ActionRawResponse, ActionRequest, ActionRequestEnvelope, ActionResponseEnvelope,
    ActionStatus, Params, retcode,
};
pub use error::{ActionError, ActionResult, BoxError, EventError, EventResult};
pub use event::{BoxedEvent, Event, EventOutcome, PostType, QuickOperation};
pub use event_dispatcher::{
    EventDispatcher, EventHandler, EventHandlerResult, EventRequestHandler, FnEventHandler,
    candidate_keys,
};
pub use registry::{EventDecoder, EventNode, EventTree, EventTypeRegistry};
