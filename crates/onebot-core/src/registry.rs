//! Polymorphic event decoding.
//!
//! Every event shares one envelope, but its payload shape depends on the
//! discriminator fields. The registry walks a tree keyed by those fields
//! until it reaches a leaf decoder:
//!
//! ```text
//! post_type
//! ├── message ──(message_type)──▶ private | group
//! ├── notice  ──(notice_type)───▶ group_upload | ... | notify ──(sub_type)──▶ poke | ...
//! ├── request ──(request_type)──▶ friend | group
//! └── meta_event ──(meta_event_type)──▶ lifecycle | heartbeat
//! ```
//!
//! The tree is built on first use and never mutated afterwards.

use std::collections::HashMap;
use std::fmt;
use std::sync::OnceLock;

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::{EventError, EventResult};
use crate::event::{BoxedEvent, Event};

/// Deepest path a tree may describe: post_type, type, sub_type.
pub const MAX_DEPTH: usize = 3;

/// Decodes a full payload into a concrete event.
pub type EventDecoder = fn(Value) -> serde_json::Result<BoxedEvent>;

/// Leaf decoder for `E`.
pub fn decoder<E>(value: Value) -> serde_json::Result<BoxedEvent>
where
    E: Event + DeserializeOwned,
{
    serde_json::from_value::<E>(value).map(BoxedEvent::new)
}

/// A node of the lookup tree.
pub enum EventNode {
    Leaf(EventDecoder),
    Branch {
        /// Field whose value selects the child.
        field: &'static str,
        children: HashMap<String, EventNode>,
    },
}

impl EventNode {
    pub fn leaf<E>() -> Self
    where
        E: Event + DeserializeOwned,
    {
        Self::Leaf(decoder::<E>)
    }

    pub fn branch<I, K>(field: &'static str, children: I) -> Self
    where
        I: IntoIterator<Item = (K, EventNode)>,
        K: Into<String>,
    {
        Self::Branch {
            field,
            children: children.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}

impl fmt::Debug for EventNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Leaf(_) => f.write_str("Leaf"),
            Self::Branch { field, children } => f
                .debug_struct("Branch")
                .field("field", field)
                .field("children", children)
                .finish(),
        }
    }
}

/// Root of the lookup tree, keyed by `post_type`.
#[derive(Debug, Default)]
pub struct EventTree {
    roots: HashMap<String, EventNode>,
}

impl EventTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, post_type: impl Into<String>, node: EventNode) -> Self {
        self.roots.insert(post_type.into(), node);
        self
    }
}

type TreeBuilder = Box<dyn Fn() -> EventTree + Send + Sync>;

/// Maps raw event payloads to concrete event types.
pub struct EventTypeRegistry {
    tree: OnceLock<EventTree>,
    build: TreeBuilder,
}

impl EventTypeRegistry {
    /// Creates a registry whose tree is built by `build` on first use.
    pub fn new<F>(build: F) -> Self
    where
        F: Fn() -> EventTree + Send + Sync + 'static,
    {
        Self {
            tree: OnceLock::new(),
            build: Box::new(build),
        }
    }

    /// Creates a registry around an already built tree.
    pub fn from_tree(tree: EventTree) -> Self {
        Self {
            tree: OnceLock::from(tree),
            build: Box::new(EventTree::new),
        }
    }

    fn tree(&self) -> &EventTree {
        self.tree.get_or_init(|| (self.build)())
    }

    /// Parses and decodes a raw payload.
    pub fn decode(&self, payload: &[u8]) -> EventResult<BoxedEvent> {
        let value: Value = serde_json::from_slice(payload)?;
        self.decode_value(value)
    }

    /// Decodes an already parsed payload.
    pub fn decode_value(&self, value: Value) -> EventResult<BoxedEvent> {
        let decode = self.resolve(&value)?;
        Ok(decode(value)?)
    }

    /// Walks the tree using the discriminator fields of `value`.
    pub fn resolve(&self, value: &Value) -> EventResult<EventDecoder> {
        let post_type = discriminator(value, "post_type").ok_or(EventError::MissingTypeField {
            field: "post_type",
            path: String::new(),
        })?;

        let mut path = post_type.to_string();
        let mut node = self
            .tree()
            .roots
            .get(post_type)
            .ok_or_else(|| EventError::UnknownType { path: path.clone() })?;
        let mut depth = 1;

        loop {
            match node {
                EventNode::Leaf(decode) => return Ok(*decode),
                EventNode::Branch { field, children } => {
                    if depth >= MAX_DEPTH || children.is_empty() {
                        return Err(EventError::InvalidTreeStructure { path });
                    }
                    let key = discriminator(value, field).ok_or_else(|| {
                        EventError::MissingTypeField {
                            field: *field,
                            path: path.clone(),
                        }
                    })?;
                    path.push('/');
                    path.push_str(key);
                    node = children
                        .get(key)
                        .ok_or_else(|| EventError::UnknownType { path: path.clone() })?;
                    depth += 1;
                }
            }
        }
    }
}

impl fmt::Debug for EventTypeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventTypeRegistry")
            .field("initialized", &self.tree.get().is_some())
            .finish()
    }
}

fn discriminator<'a>(value: &'a Value, field: &str) -> Option<&'a str> {
    value
        .get(field)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};
    use std::any::Any;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug, Serialize, Deserialize)]
    struct Ping {
        time: i64,
        self_id: i64,
        post_type: String,
        kind: String,
        #[serde(default)]
        sub_type: String,
        seq: u32,
    }

    #[derive(Debug, Serialize, Deserialize)]
    struct Pong {
        time: i64,
        self_id: i64,
        post_type: String,
        kind: String,
    }

    macro_rules! probe_event {
        ($ty:ty, |$e:ident| $sub:expr) => {
            impl Event for $ty {
                fn time(&self) -> i64 {
                    self.time
                }
                fn self_id(&self) -> i64 {
                    self.self_id
                }
                fn post_type(&self) -> &str {
                    &self.post_type
                }
                fn detail_type(&self) -> &str {
                    &self.kind
                }
                fn sub_type(&self) -> &str {
                    let $e = self;
                    $sub
                }
                fn as_any(&self) -> &dyn Any {
                    self
                }
                fn to_json(&self) -> serde_json::Result<Value> {
                    serde_json::to_value(self)
                }
            }
        };
    }

    probe_event!(Ping, |e| &e.sub_type);
    probe_event!(Pong, |_e| "");

    fn tree() -> EventTree {
        EventTree::new().with(
            "probe",
            EventNode::branch(
                "kind",
                [
                    ("ping", EventNode::leaf::<Ping>()),
                    ("pong", EventNode::leaf::<Pong>()),
                    (
                        "nested",
                        EventNode::branch(
                            "sub_type",
                            [("deeper", EventNode::branch("extra", [("x", EventNode::leaf::<Ping>())]))],
                        ),
                    ),
                    ("hollow", EventNode::branch("sub_type", Vec::<(String, EventNode)>::new())),
                ],
            ),
        )
    }

    #[test]
    fn test_decodes_to_concrete_type() {
        let registry = EventTypeRegistry::new(tree);
        let event = registry
            .decode(br#"{"time":1,"self_id":2,"post_type":"probe","kind":"ping","seq":9}"#)
            .unwrap();
        assert_eq!(event.downcast_ref::<Ping>().unwrap().seq, 9);

        let event = registry
            .decode(br#"{"time":1,"self_id":2,"post_type":"probe","kind":"pong"}"#)
            .unwrap();
        assert!(event.is::<Pong>());
    }

    #[test]
    fn test_resolution_errors() {
        let registry = EventTypeRegistry::new(tree);

        let err = registry.decode(br#"{"time":1}"#).unwrap_err();
        assert!(matches!(err, EventError::MissingTypeField { field: "post_type", .. }));

        let err = registry.decode(br#"{"post_type":"unknown"}"#).unwrap_err();
        assert!(matches!(err, EventError::UnknownType { ref path } if path == "unknown"));

        let err = registry.decode(br#"{"post_type":"probe"}"#).unwrap_err();
        assert!(
            matches!(err, EventError::MissingTypeField { field: "kind", ref path } if path == "probe")
        );

        let err = registry
            .decode(br#"{"post_type":"probe","kind":"zap"}"#)
            .unwrap_err();
        assert!(matches!(err, EventError::UnknownType { ref path } if path == "probe/zap"));

        let err = registry.decode(b"not json").unwrap_err();
        assert!(matches!(err, EventError::Json(_)));
    }

    #[test]
    fn test_malformed_tree_is_reported() {
        let registry = EventTypeRegistry::new(tree);

        let err = registry
            .decode(br#"{"post_type":"probe","kind":"nested","sub_type":"deeper","extra":"x"}"#)
            .unwrap_err();
        assert!(matches!(err, EventError::InvalidTreeStructure { .. }));

        let err = registry
            .decode(br#"{"post_type":"probe","kind":"hollow","sub_type":"a"}"#)
            .unwrap_err();
        assert!(matches!(err, EventError::InvalidTreeStructure { .. }));
    }

    #[test]
    fn test_tree_is_built_once() {
        let builds = Arc::new(AtomicUsize::new(0));
        let counter = builds.clone();
        let registry = EventTypeRegistry::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            tree()
        });
        assert_eq!(builds.load(Ordering::SeqCst), 0);

        std::thread::scope(|s| {
            for _ in 0..8 {
                s.spawn(|| {
                    registry
                        .decode(br#"{"time":1,"self_id":2,"post_type":"probe","kind":"pong"}"#)
                        .unwrap();
                });
            }
        });
        assert_eq!(builds.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_payload_shape_mismatch_is_json_error() {
        let registry = EventTypeRegistry::from_tree(tree());
        let err = registry
            .decode(br#"{"time":1,"self_id":2,"post_type":"probe","kind":"ping","seq":"x"}"#)
            .unwrap_err();
        assert!(matches!(err, EventError::Json(_)));
    }
}
