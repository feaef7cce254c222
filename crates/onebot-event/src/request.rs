//! Request events.

use serde::{Deserialize, Serialize};

use crate::EventHeader;

/// A friend request. Answer it with `set_friend_add_request` and `flag`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FriendRequestEvent {
    #[serde(flatten)]
    pub header: EventHeader,
    pub request_type: String,
    pub user_id: i64,
    #[serde(default)]
    pub comment: String,
    pub flag: String,
}

impl_event!(FriendRequestEvent => request_type);

/// A join request or an invitation to a group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupRequestEvent {
    #[serde(flatten)]
    pub header: EventHeader,
    pub request_type: String,
    /// "add" or "invite".
    pub sub_type: String,
    pub group_id: i64,
    pub user_id: i64,
    #[serde(default)]
    pub comment: String,
    pub flag: String,
}

impl_event!(GroupRequestEvent => request_type, sub_type);
