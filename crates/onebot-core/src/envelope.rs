//! Action wire shapes.
//!
//! ```text
//! request:  {"action": "...", "params": {...}, "echo": <any>?}
//! response: {"status": "ok|async|failed", "retcode": 0, "data": <any>?, "message": "..."?, "echo": <any>?}
//! ```

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Weakly typed action parameters.
pub type Params = Map<String, Value>;

/// Protocol retcodes.
pub mod retcode {
    /// Success.
    pub const OK: i64 = 0;
    /// Accepted for asynchronous processing.
    pub const ASYNC: i64 = 1;
    /// Malformed input.
    pub const BAD_REQUEST: i64 = 1400;
    /// Missing access token.
    pub const UNAUTHORIZED: i64 = 1401;
    /// Mismatched access token.
    pub const FORBIDDEN: i64 = 1403;
    /// Unknown action.
    pub const NOT_FOUND: i64 = 1404;
    /// Any other handler failure.
    pub const INTERNAL: i64 = 1500;
    /// The handler returned no response.
    pub const EMPTY: i64 = -1;
}

/// Response status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionStatus {
    Ok,
    Async,
    Failed,
}

impl ActionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::Async => "async",
            Self::Failed => "failed",
        }
    }
}

impl std::fmt::Display for ActionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Request
// ============================================================================

/// An action request as seen by dispatchers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActionRequest {
    #[serde(default)]
    pub action: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub params: Params,
}

impl ActionRequest {
    pub fn new(action: impl Into<String>, params: Params) -> Self {
        Self {
            action: action.into(),
            params,
        }
    }
}

/// Request frame carried over a WebSocket.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActionRequestEnvelope {
    #[serde(default)]
    pub action: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub params: Params,
    /// Correlation token. `Some(Value::Null)` is distinct from absent.
    #[serde(
        default,
        deserialize_with = "present",
        skip_serializing_if = "Option::is_none"
    )]
    pub echo: Option<Value>,
}

impl ActionRequestEnvelope {
    /// Splits the frame into the dispatchable request and its echo.
    pub fn into_parts(self) -> (ActionRequest, Option<Value>) {
        (
            ActionRequest {
                action: self.action,
                params: self.params,
            },
            self.echo,
        )
    }
}

// ============================================================================
// Response
// ============================================================================

/// Untyped action response.
///
/// Constructors keep `retcode == 0` if and only if `status == ok`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionRawResponse {
    status: ActionStatus,
    retcode: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    data: Option<Value>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    message: String,
}

impl ActionRawResponse {
    /// A successful response carrying `data`.
    pub fn ok(data: Value) -> Self {
        Self {
            status: ActionStatus::Ok,
            retcode: retcode::OK,
            data: Some(data),
            message: String::new(),
        }
    }

    /// A successful response without a payload.
    pub fn ok_empty() -> Self {
        Self {
            status: ActionStatus::Ok,
            retcode: retcode::OK,
            data: None,
            message: String::new(),
        }
    }

    /// Serializes `data` into a successful response.
    pub fn from_data<T: Serialize>(data: &T) -> serde_json::Result<Self> {
        serde_json::to_value(data).map(Self::ok)
    }

    /// The request was accepted and will complete asynchronously.
    pub fn accepted() -> Self {
        Self {
            status: ActionStatus::Async,
            retcode: retcode::ASYNC,
            data: None,
            message: String::new(),
        }
    }

    /// A failed response. A zero retcode is promoted to
    /// [`retcode::INTERNAL`] since zero always means success.
    pub fn failed(code: i64, message: impl Into<String>) -> Self {
        let code = if code == retcode::OK {
            retcode::INTERNAL
        } else {
            code
        };
        Self {
            status: ActionStatus::Failed,
            retcode: code,
            data: None,
            message: message.into(),
        }
    }

    /// Response used when a handler produced nothing.
    pub fn empty() -> Self {
        Self::failed(retcode::EMPTY, "empty response")
    }

    pub fn status(&self) -> ActionStatus {
        self.status
    }

    pub fn retcode(&self) -> i64 {
        self.retcode
    }

    pub fn data(&self) -> Option<&Value> {
        self.data.as_ref()
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn is_ok(&self) -> bool {
        self.status == ActionStatus::Ok
    }

    /// Decodes `data` into `T`, treating an absent payload as `null`.
    pub fn decode_data<T: DeserializeOwned>(&self) -> serde_json::Result<T> {
        T::deserialize(self.data.clone().unwrap_or(Value::Null))
    }
}

/// Response frame carried over a WebSocket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionResponseEnvelope {
    #[serde(flatten)]
    pub response: ActionRawResponse,
    #[serde(
        default,
        deserialize_with = "present",
        skip_serializing_if = "Option::is_none"
    )]
    pub echo: Option<Value>,
}

impl ActionResponseEnvelope {
    pub fn new(response: ActionRawResponse, echo: Option<Value>) -> Self {
        Self { response, echo }
    }
}

fn present<'de, D>(deserializer: D) -> Result<Option<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<Params, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<Params>::deserialize(deserializer).map(Option::unwrap_or_default)
}
