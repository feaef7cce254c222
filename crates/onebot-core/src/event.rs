//! Type-erased events.
//!
//! Concrete event types live outside this crate; everything here works on
//! [`BoxedEvent`] and the discriminator accessors of [`Event`].

use std::any::Any;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde_json::{Map, Value};

/// The top-level `post_type` of an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PostType {
    Message,
    Notice,
    Request,
    MetaEvent,
}

impl PostType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Message => "message",
            Self::Notice => "notice",
            Self::Request => "request",
            Self::MetaEvent => "meta_event",
        }
    }

    /// Name of the field that carries the second-level discriminator.
    pub fn detail_field(&self) -> &'static str {
        match self {
            Self::Message => "message_type",
            Self::Notice => "notice_type",
            Self::Request => "request_type",
            Self::MetaEvent => "meta_event_type",
        }
    }
}

impl FromStr for PostType {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "message" => Self::Message,
            "notice" => Self::Notice,
            "request" => Self::Request,
            "meta_event" => Self::MetaEvent,
            _ => return Err(()),
        })
    }
}

impl fmt::Display for PostType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A decoded event.
pub trait Event: Any + Send + Sync + fmt::Debug {
    fn time(&self) -> i64;

    fn self_id(&self) -> i64;

    fn post_type(&self) -> &str;

    /// Value of the post_type specific discriminator, e.g. `message_type`.
    fn detail_type(&self) -> &str;

    /// Empty when the event has no `sub_type`.
    fn sub_type(&self) -> &str {
        ""
    }

    fn as_any(&self) -> &dyn Any;

    /// Re-encodes the event for delivery to WebSocket peers.
    fn to_json(&self) -> serde_json::Result<Value>;
}

/// Shared, type-erased event.
#[derive(Clone)]
pub struct BoxedEvent {
    inner: Arc<dyn Event>,
}

impl BoxedEvent {
    pub fn new<E: Event>(event: E) -> Self {
        Self {
            inner: Arc::new(event),
        }
    }

    pub fn inner(&self) -> &Arc<dyn Event> {
        &self.inner
    }

    pub fn downcast_ref<E: Event>(&self) -> Option<&E> {
        self.inner.as_any().downcast_ref()
    }

    pub fn is<E: Event>(&self) -> bool {
        self.inner.as_any().is::<E>()
    }
}

impl std::ops::Deref for BoxedEvent {
    type Target = dyn Event;

    fn deref(&self) -> &Self::Target {
        self.inner.as_ref()
    }
}

impl fmt::Debug for BoxedEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoxedEvent")
            .field("post_type", &self.post_type())
            .field("detail_type", &self.detail_type())
            .field("sub_type", &self.sub_type())
            .finish()
    }
}

/// A synchronous reply attached to an event response.
pub type QuickOperation = Map<String, Value>;

/// What happened to an event after dispatch.
#[derive(Debug, Clone, PartialEq)]
pub enum EventOutcome {
    /// A handler answered with a non-empty quick operation.
    Reply(QuickOperation),
    /// A handler ran and has nothing to reply.
    NoReply,
    /// No registration matched the event.
    Unhandled,
}

impl EventOutcome {
    /// Normalizes a handler result: an empty map counts as no reply.
    pub fn from_quick_operation(op: Option<QuickOperation>) -> Self {
        match op {
            Some(op) if !op.is_empty() => Self::Reply(op),
            _ => Self::NoReply,
        }
    }

    pub fn into_reply(self) -> Option<QuickOperation> {
        match self {
            Self::Reply(op) => Some(op),
            Self::NoReply | Self::Unhandled => None,
        }
    }
}
