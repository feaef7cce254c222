//! Message events.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::EventHeader;

// ============================================================================
// Shared Types
// ============================================================================

/// Message sender information.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Sender {
    #[serde(default)]
    pub user_id: Option<i64>,
    #[serde(default)]
    pub nickname: Option<String>,
    /// "male", "female" or "unknown".
    #[serde(default)]
    pub sex: Option<String>,
    #[serde(default)]
    pub age: Option<i32>,
    /// Group card (group nickname).
    #[serde(default)]
    pub card: Option<String>,
    #[serde(default)]
    pub area: Option<String>,
    #[serde(default)]
    pub level: Option<String>,
    /// "owner", "admin" or "member".
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
}

/// Anonymous user information for anonymous group messages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Anonymous {
    pub id: i64,
    pub name: String,
    /// Needed when muting the anonymous user.
    pub flag: String,
}

// ============================================================================
// PrivateMessageEvent
// ============================================================================

/// Private message event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrivateMessageEvent {
    #[serde(flatten)]
    pub header: EventHeader,
    pub message_type: String,
    /// "friend", "group" or "other".
    #[serde(default)]
    pub sub_type: String,
    pub message_id: i32,
    pub user_id: i64,
    /// Message content, either a segment array or a CQ string.
    pub message: Value,
    #[serde(default)]
    pub raw_message: String,
    #[serde(default)]
    pub font: i32,
    #[serde(default)]
    pub sender: Sender,
}

impl PrivateMessageEvent {
    pub fn plain_text(&self) -> String {
        extract_plain_text(&self.message)
    }
}

impl_event!(PrivateMessageEvent => message_type, sub_type);

// ============================================================================
// GroupMessageEvent
// ============================================================================

/// Group message event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupMessageEvent {
    #[serde(flatten)]
    pub header: EventHeader,
    pub message_type: String,
    /// "normal", "anonymous" or "notice".
    #[serde(default)]
    pub sub_type: String,
    pub message_id: i32,
    pub group_id: i64,
    pub user_id: i64,
    #[serde(default)]
    pub anonymous: Option<Anonymous>,
    pub message: Value,
    #[serde(default)]
    pub raw_message: String,
    #[serde(default)]
    pub font: i32,
    #[serde(default)]
    pub sender: Sender,
}

impl GroupMessageEvent {
    pub fn plain_text(&self) -> String {
        extract_plain_text(&self.message)
    }
}

impl_event!(GroupMessageEvent => message_type, sub_type);

/// Concatenates the text segments of a message.
///
/// A plain string message is returned unchanged.
pub fn extract_plain_text(message: &Value) -> String {
    match message {
        Value::String(s) => s.clone(),
        Value::Array(segments) => segments
            .iter()
            .filter_map(|seg| {
                if seg.get("type")?.as_str()? == "text" {
                    seg.get("data")?.get("text")?.as_str()
                } else {
                    None
                }
            })
            .collect(),
        _ => String::new(),
    }
}
