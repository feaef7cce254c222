//! Error taxonomy shared by every transport.
//!
//! [`ActionError`] is the single source of truth for the action error to
//! retcode mapping. HTTP, forward WebSocket and reverse WebSocket all go
//! through [`ActionError::retcode`] and [`ActionError::into_response`].

use thiserror::Error;

use crate::envelope::{ActionRawResponse, retcode};

/// Boxed error returned by business handlers.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

// =============================================================================
// Action Errors
// =============================================================================

/// Errors produced while dispatching an action request.
#[derive(Debug, Error)]
pub enum ActionError {
    /// No handler is registered for the action.
    #[error("action not found: {0}")]
    NotFound(String),

    /// The request could not be understood (malformed params, bad JSON).
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Opaque failure raised by a business handler.
    #[error("handler error: {0}")]
    Handler(#[source] BoxError),

    /// Unclassified internal failure.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ActionError {
    /// Creates a bad-request error from anything displayable.
    pub fn bad_request(msg: impl std::fmt::Display) -> Self {
        Self::BadRequest(msg.to_string())
    }

    /// Wraps an arbitrary business error.
    pub fn handler<E>(err: E) -> Self
    where
        E: Into<BoxError>,
    {
        Self::Handler(err.into())
    }

    /// The protocol retcode for this error.
    pub fn retcode(&self) -> i64 {
        match self {
            Self::NotFound(_) => retcode::NOT_FOUND,
            Self::BadRequest(_) => retcode::BAD_REQUEST,
            Self::Handler(_) | Self::Internal(_) => retcode::INTERNAL,
        }
    }

    /// Converts the error into a failed response carrying its retcode.
    pub fn into_response(self) -> ActionRawResponse {
        ActionRawResponse::failed(self.retcode(), self.to_string())
    }
}

impl From<serde_json::Error> for ActionError {
    fn from(err: serde_json::Error) -> Self {
        Self::Internal(format!("encode response: {err}"))
    }
}

/// Result type of a single action invocation.
///
/// `Ok(None)` means the handler produced no response; transports answer it
/// with [`ActionRawResponse::empty`].
pub type ActionResult = Result<Option<ActionRawResponse>, ActionError>;

// =============================================================================
// Event Errors
// =============================================================================

/// Errors produced while decoding an inbound event.
#[derive(Debug, Error)]
pub enum EventError {
    /// A discriminator field required at `path` is absent or not a string.
    #[error("missing type field '{field}' at path '{path}'")]
    MissingTypeField {
        /// Name of the absent field.
        field: &'static str,
        /// Discriminator values resolved so far, joined with '/'.
        path: String,
    },

    /// The discriminator value is not known to the registry.
    #[error("unknown event type at path '{path}'")]
    UnknownType {
        /// Full path including the unknown value.
        path: String,
    },

    /// The registry tree itself is inconsistent.
    #[error("invalid event tree structure at path '{path}'")]
    InvalidTreeStructure {
        /// Path at which resolution gave up.
        path: String,
    },

    /// The payload is not valid JSON or does not fit the resolved shape.
    #[error("decode event: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for event decoding.
pub type EventResult<T> = Result<T, EventError>;
