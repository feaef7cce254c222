//! The standard OneBot v11 event tree.

use std::sync::{Arc, OnceLock};

use onebot_core::{EventNode, EventTree, EventTypeRegistry, PostType};

use crate::*;

/// Builds the lookup tree for every event type in this crate.
pub fn default_tree() -> EventTree {
    let message = EventNode::branch(
        PostType::Message.detail_field(),
        [
            ("private", EventNode::leaf::<PrivateMessageEvent>()),
            ("group", EventNode::leaf::<GroupMessageEvent>()),
        ],
    );

    let notify = EventNode::branch(
        "sub_type",
        [
            ("poke", EventNode::leaf::<PokeEvent>()),
            ("lucky_king", EventNode::leaf::<LuckyKingEvent>()),
            ("honor", EventNode::leaf::<HonorEvent>()),
        ],
    );
    let notice = EventNode::branch(
        PostType::Notice.detail_field(),
        [
            ("group_upload", EventNode::leaf::<GroupUploadEvent>()),
            ("group_admin", EventNode::leaf::<GroupAdminEvent>()),
            ("group_decrease", EventNode::leaf::<GroupDecreaseEvent>()),
            ("group_increase", EventNode::leaf::<GroupIncreaseEvent>()),
            ("group_ban", EventNode::leaf::<GroupBanEvent>()),
            ("friend_add", EventNode::leaf::<FriendAddEvent>()),
            ("group_recall", EventNode::leaf::<GroupRecallEvent>()),
            ("friend_recall", EventNode::leaf::<FriendRecallEvent>()),
            ("notify", notify),
        ],
    );

    let request = EventNode::branch(
        PostType::Request.detail_field(),
        [
            ("friend", EventNode::leaf::<FriendRequestEvent>()),
            ("group", EventNode::leaf::<GroupRequestEvent>()),
        ],
    );

    let meta = EventNode::branch(
        PostType::MetaEvent.detail_field(),
        [
            ("lifecycle", EventNode::leaf::<LifecycleEvent>()),
            ("heartbeat", EventNode::leaf::<HeartbeatEvent>()),
        ],
    );

    EventTree::new()
        .with(PostType::Message.as_str(), message)
        .with(PostType::Notice.as_str(), notice)
        .with(PostType::Request.as_str(), request)
        .with(PostType::MetaEvent.as_str(), meta)
}

/// Process-wide registry over [`default_tree`].
///
/// The tree itself is only built on the first decode.
pub fn default_registry() -> Arc<EventTypeRegistry> {
    static REGISTRY: OnceLock<Arc<EventTypeRegistry>> = OnceLock::new();
    REGISTRY
        .get_or_init(|| Arc::new(EventTypeRegistry::new(default_tree)))
        .clone()
}

#[cfg(test)]
mod tests {
    use super::*;
    use onebot_core::{EventError, candidate_keys};
    use serde_json::json;

    fn decode(value: serde_json::Value) -> onebot_core::EventResult<onebot_core::BoxedEvent> {
        default_registry().decode(value.to_string().as_bytes())
    }

    #[test]
    fn test_private_message() {
        let event = decode(json!({
            "time": 1700000000,
            "self_id": 10001,
            "post_type": "message",
            "message_type": "private",
            "sub_type": "friend",
            "message_id": 5,
            "user_id": 42,
            "message": [{"type": "text", "data": {"text": "hi"}}],
            "raw_message": "hi",
            "font": 0,
            "sender": {"user_id": 42, "nickname": "alice"}
        }))
        .unwrap();

        let msg = event.downcast_ref::<PrivateMessageEvent>().unwrap();
        assert_eq!(msg.user_id, 42);
        assert_eq!(msg.plain_text(), "hi");
        assert_eq!(event.self_id(), 10001);
        assert_eq!(
            candidate_keys(&*event),
            vec!["message/private/friend", "message/private", "message"]
        );
    }

    #[test]
    fn test_notify_resolves_by_sub_type() {
        let event = decode(json!({
            "time": 1,
            "self_id": 2,
            "post_type": "notice",
            "notice_type": "notify",
            "sub_type": "poke",
            "group_id": 3,
            "user_id": 4,
            "target_id": 2
        }))
        .unwrap();
        let poke = event.downcast_ref::<PokeEvent>().unwrap();
        assert_eq!(poke.target_id, 2);
        assert_eq!(event.sub_type(), "poke");

        let err = decode(json!({
            "time": 1, "self_id": 2, "post_type": "notice", "notice_type": "notify"
        }))
        .unwrap_err();
        assert!(
            matches!(err, EventError::MissingTypeField { field: "sub_type", ref path } if path == "notice/notify")
        );
    }

    #[test]
    fn test_meta_and_request_events() {
        let heartbeat = decode(json!({
            "time": 1, "self_id": 2, "post_type": "meta_event",
            "meta_event_type": "heartbeat", "interval": 5000,
            "status": {"online": true, "good": true, "stat": {"packet_received": 1}}
        }))
        .unwrap();
        let hb = heartbeat.downcast_ref::<HeartbeatEvent>().unwrap();
        assert_eq!(hb.interval, 5000);
        assert!(hb.status.extra.contains_key("stat"));

        let request = decode(json!({
            "time": 1, "self_id": 2, "post_type": "request", "request_type": "group",
            "sub_type": "invite", "group_id": 9, "user_id": 8, "flag": "f"
        }))
        .unwrap();
        assert!(request.is::<GroupRequestEvent>());
        assert_eq!(candidate_keys(&*request)[0], "request/group/invite");
    }

    #[test]
    fn test_unknown_detail_type() {
        let err = decode(json!({
            "time": 1, "self_id": 2, "post_type": "notice", "notice_type": "essence"
        }))
        .unwrap_err();
        assert!(matches!(err, EventError::UnknownType { ref path } if path == "notice/essence"));
    }

    #[test]
    fn test_re_encoding_keeps_discriminators() {
        let raw = json!({
            "time": 1, "self_id": 2, "post_type": "notice", "notice_type": "friend_add",
            "user_id": 77
        });
        let event = decode(raw.clone()).unwrap();
        assert_eq!(event.to_json().unwrap(), raw);
    }
}
