//! Notice events.
//!
//! ```text
//! notice_type
//! ├── group_upload, group_admin, group_decrease, group_increase, group_ban
//! ├── friend_add, group_recall, friend_recall
//! └── notify ──(sub_type)──▶ poke | lucky_king | honor
//! ```

use serde::{Deserialize, Serialize};

use crate::EventHeader;

// ============================================================================
// Group Upload Event
// ============================================================================

/// Uploaded file info.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadedFile {
    pub id: String,
    pub name: String,
    /// Size in bytes.
    pub size: i64,
    pub busid: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupUploadEvent {
    #[serde(flatten)]
    pub header: EventHeader,
    pub notice_type: String,
    pub group_id: i64,
    pub user_id: i64,
    pub file: UploadedFile,
}

impl_event!(GroupUploadEvent => notice_type);

// ============================================================================
// Group Admin Event
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupAdminEvent {
    #[serde(flatten)]
    pub header: EventHeader,
    pub notice_type: String,
    /// "set" or "unset".
    pub sub_type: String,
    pub group_id: i64,
    pub user_id: i64,
}

impl_event!(GroupAdminEvent => notice_type, sub_type);

// ============================================================================
// Member Change Events
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupDecreaseEvent {
    #[serde(flatten)]
    pub header: EventHeader,
    pub notice_type: String,
    /// "leave", "kick" or "kick_me".
    pub sub_type: String,
    pub group_id: i64,
    pub user_id: i64,
    #[serde(default)]
    pub operator_id: Option<i64>,
}

impl_event!(GroupDecreaseEvent => notice_type, sub_type);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupIncreaseEvent {
    #[serde(flatten)]
    pub header: EventHeader,
    pub notice_type: String,
    /// "approve" or "invite".
    pub sub_type: String,
    pub group_id: i64,
    pub user_id: i64,
    #[serde(default)]
    pub operator_id: Option<i64>,
}

impl_event!(GroupIncreaseEvent => notice_type, sub_type);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupBanEvent {
    #[serde(flatten)]
    pub header: EventHeader,
    pub notice_type: String,
    /// "ban" or "lift_ban".
    pub sub_type: String,
    pub group_id: i64,
    pub user_id: i64,
    #[serde(default)]
    pub operator_id: Option<i64>,
    /// Ban length in seconds; zero lifts the ban.
    pub duration: i64,
}

impl_event!(GroupBanEvent => notice_type, sub_type);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FriendAddEvent {
    #[serde(flatten)]
    pub header: EventHeader,
    pub notice_type: String,
    pub user_id: i64,
}

impl_event!(FriendAddEvent => notice_type);

// ============================================================================
// Recall Events
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupRecallEvent {
    #[serde(flatten)]
    pub header: EventHeader,
    pub notice_type: String,
    pub group_id: i64,
    /// Author of the recalled message.
    pub user_id: i64,
    #[serde(default)]
    pub operator_id: Option<i64>,
    pub message_id: i64,
}

impl_event!(GroupRecallEvent => notice_type);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FriendRecallEvent {
    #[serde(flatten)]
    pub header: EventHeader,
    pub notice_type: String,
    pub user_id: i64,
    pub message_id: i64,
}

impl_event!(FriendRecallEvent => notice_type);

// ============================================================================
// Notify Events
// ============================================================================

/// Someone poked `target_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PokeEvent {
    #[serde(flatten)]
    pub header: EventHeader,
    pub notice_type: String,
    pub sub_type: String,
    /// Absent for private pokes.
    #[serde(default)]
    pub group_id: Option<i64>,
    pub user_id: i64,
    pub target_id: i64,
}

impl_event!(PokeEvent => notice_type, sub_type);

/// `target_id` became the lucky king of a red packet sent by `user_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LuckyKingEvent {
    #[serde(flatten)]
    pub header: EventHeader,
    pub notice_type: String,
    pub sub_type: String,
    pub group_id: i64,
    pub user_id: i64,
    pub target_id: i64,
}

impl_event!(LuckyKingEvent => notice_type, sub_type);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HonorEvent {
    #[serde(flatten)]
    pub header: EventHeader,
    pub notice_type: String,
    pub sub_type: String,
    pub group_id: i64,
    /// "talkative", "performer" or "emotion".
    pub honor_type: String,
    pub user_id: i64,
}

impl_event!(HonorEvent => notice_type, sub_type);
