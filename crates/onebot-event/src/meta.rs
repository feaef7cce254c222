//! Meta events.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::EventHeader;

/// Lifecycle event: "enable", "disable" or "connect".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LifecycleEvent {
    #[serde(flatten)]
    pub header: EventHeader,
    pub meta_event_type: String,
    pub sub_type: String,
}

impl_event!(LifecycleEvent => meta_event_type, sub_type);

/// Implementation status carried by heartbeats.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HeartbeatStatus {
    #[serde(default)]
    pub online: Option<bool>,
    #[serde(default)]
    pub good: Option<bool>,
    /// Implementation specific fields.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeartbeatEvent {
    #[serde(flatten)]
    pub header: EventHeader,
    pub meta_event_type: String,
    #[serde(default)]
    pub status: HeartbeatStatus,
    /// Milliseconds until the next heartbeat.
    #[serde(default)]
    pub interval: i64,
}

impl_event!(HeartbeatEvent => meta_event_type);
