//! Action parameter extraction for HTTP requests.
//!
//! Query values and urlencoded form fields seed the parameter map. A JSON
//! object body is merged on top of them.

use axum::http::{HeaderMap, Method, StatusCode, header};
use onebot_core::Params;
use serde_json::map::Entry;
use serde_json::{Map, Value};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParamsError {
    #[error("invalid form data")]
    InvalidForm,
    #[error("invalid json")]
    InvalidJson,
    #[error("unsupported content type")]
    UnsupportedContentType,
    #[error("request body too large")]
    BodyTooLarge,
}

impl ParamsError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::BodyTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            _ => StatusCode::BAD_REQUEST,
        }
    }
}

const JSON: &str = "application/json";
const FORM: &str = "application/x-www-form-urlencoded";

/// Builds the parameter map of an action request.
pub fn parse_params(
    method: &Method,
    headers: &HeaderMap,
    query: Option<&str>,
    body: &[u8],
) -> Result<Params, ParamsError> {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();

    let mut params = Map::new();

    let has_form_body = [Method::POST, Method::PUT, Method::PATCH].contains(method)
        && content_type.starts_with(FORM);
    if has_form_body {
        merge_form(&mut params, body)?;
    }
    if let Some(query) = query {
        merge_form(&mut params, query.as_bytes())?;
    }

    if *method != Method::POST {
        return Ok(params);
    }

    if content_type.starts_with(JSON) {
        let object = serde_json::Deserializer::from_slice(body)
            .into_iter::<Option<Map<String, Value>>>()
            .next()
            .ok_or(ParamsError::InvalidJson)?
            .map_err(|_| ParamsError::InvalidJson)?;
        params.extend(object.unwrap_or_default());
        return Ok(params);
    }

    if !content_type.is_empty() && !content_type.starts_with(FORM) {
        return Err(ParamsError::UnsupportedContentType);
    }

    Ok(params)
}

/// Adds urlencoded pairs to `params`. A repeated key turns into an array.
fn merge_form(params: &mut Params, raw: &[u8]) -> Result<(), ParamsError> {
    if !is_valid_form(raw) {
        return Err(ParamsError::InvalidForm);
    }

    for (key, value) in url::form_urlencoded::parse(raw) {
        let value = Value::String(value.into_owned());
        match params.entry(key.into_owned()) {
            Entry::Vacant(slot) => {
                slot.insert(value);
            }
            Entry::Occupied(mut slot) => match slot.get_mut() {
                Value::Array(values) => values.push(value),
                existing => {
                    let first = existing.take();
                    *existing = Value::Array(vec![first, value]);
                }
            },
        }
    }
    Ok(())
}

/// Rejects semicolon separators and malformed percent escapes.
fn is_valid_form(raw: &[u8]) -> bool {
    let mut i = 0;
    while i < raw.len() {
        match raw[i] {
            b';' => return false,
            b'%' => {
                let escape = raw.get(i + 1..i + 3);
                if !escape.is_some_and(|hex| hex.iter().all(u8::is_ascii_hexdigit)) {
                    return false;
                }
                i += 3;
            }
            _ => i += 1,
        }
    }
    true
}
