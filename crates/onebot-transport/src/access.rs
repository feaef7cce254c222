//! Access token check shared by the HTTP and WebSocket servers.

use std::sync::Arc;

use axum::http::{HeaderMap, StatusCode, header};
use onebot_core::retcode;
use thiserror::Error;

/// Why a request failed the access check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AccessError {
    #[error("missing access token")]
    MissingToken,
    #[error("forbidden")]
    Forbidden,
}

impl AccessError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::MissingToken => StatusCode::UNAUTHORIZED,
            Self::Forbidden => StatusCode::FORBIDDEN,
        }
    }

    /// Retcode used when the failure is reported as an action envelope.
    pub fn retcode(&self) -> i64 {
        match self {
            Self::MissingToken => retcode::UNAUTHORIZED,
            Self::Forbidden => retcode::FORBIDDEN,
        }
    }
}

/// Compares the presented token with `expected`.
///
/// A `Bearer` authorization header wins. Without any authorization header
/// the `access_token` query parameter is used. Any other header value is
/// compared as is, and a header that is not valid text never matches. An
/// empty or absent `expected` disables the check.
pub fn check_access(
    expected: Option<&str>,
    headers: &HeaderMap,
    query: Option<&str>,
) -> Result<(), AccessError> {
    let Some(expected) = expected.filter(|t| !t.is_empty()) else {
        return Ok(());
    };

    let authorization = match headers.get(header::AUTHORIZATION) {
        Some(value) => value.to_str().map_err(|_| AccessError::Forbidden)?,
        None => "",
    };

    let presented = match authorization.strip_prefix("Bearer ") {
        Some(token) => token.to_string(),
        None if authorization.is_empty() => query_token(query).unwrap_or_default(),
        None => authorization.to_string(),
    };

    if presented.is_empty() {
        return Err(AccessError::MissingToken);
    }
    if presented != expected {
        return Err(AccessError::Forbidden);
    }
    Ok(())
}

fn query_token(query: Option<&str>) -> Option<String> {
    url::form_urlencoded::parse(query?.as_bytes())
        .find(|(key, _)| key == "access_token")
        .map(|(_, value)| value.into_owned())
}

// ============================================================================
// Origin check
// ============================================================================

/// Decides whether a WebSocket handshake with the given `Origin` is allowed.
pub type OriginCheck = Arc<dyn Fn(Option<&str>) -> bool + Send + Sync>;

/// An origin check that accepts every handshake.
pub fn allow_any_origin() -> OriginCheck {
    Arc::new(|_: Option<&str>| true)
}
