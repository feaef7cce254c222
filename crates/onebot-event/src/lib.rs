//! OneBot v11 event model.
//!
//! Every concrete event embeds [`EventHeader`] via `#[serde(flatten)]` and keeps
//! its own discriminator fields, so decoding and re-encoding are lossless for
//! the known fields:
//!
//! ```text
//! EventHeader { time, self_id, post_type }
//! ├── message     PrivateMessageEvent, GroupMessageEvent
//! ├── notice      GroupUploadEvent, GroupAdminEvent, ..., FriendRecallEvent
//! │   └── notify  PokeEvent, LuckyKingEvent, HonorEvent
//! ├── request     FriendRequestEvent, GroupRequestEvent
//! └── meta_event  LifecycleEvent, HeartbeatEvent
//! ```
//!
//! [`default_registry`] resolves raw payloads to these types.

use serde::{Deserialize, Serialize};

/// Implements [`onebot_core::Event`] for a struct with a `header` field.
macro_rules! impl_event {
    ($ty:ty => $detail:ident) => {
        impl_event!($ty => $detail, |_e| "");
    };
    ($ty:ty => $detail:ident, sub_type) => {
        impl_event!($ty => $detail, |e| &e.sub_type);
    };
    ($ty:ty => $detail:ident, |$e:ident| $sub:expr) => {
        impl ::onebot_core::Event for $ty {
            fn time(&self) -> i64 {
                self.header.time
            }

            fn self_id(&self) -> i64 {
                self.header.self_id
            }

            fn post_type(&self) -> &str {
                &self.header.post_type
            }

            fn detail_type(&self) -> &str {
                &self.$detail
            }

            fn sub_type(&self) -> &str {
                let $e = self;
                $sub
            }

            fn as_any(&self) -> &dyn ::std::any::Any {
                self
            }

            fn to_json(&self) -> ::serde_json::Result<::serde_json::Value> {
                ::serde_json::to_value(self)
            }
        }
    };
}

pub mod message;
pub mod meta;
pub mod notice;
pub mod registry;
pub mod request;

pub use message::*;
pub use meta::*;
pub use notice::*;
pub use registry::{default_registry, default_tree};
pub use request::*;

/// Fields shared by every OneBot event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventHeader {
    /// Unix timestamp when the event occurred.
    pub time: i64,
    /// The bot account that received the event.
    pub self_id: i64,
    pub post_type: String,
}
