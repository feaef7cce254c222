//! Hierarchical event dispatch.
//!
//! Handlers register under keys of one to three segments:
//!
//! ```text
//! message                  any message
//! message/private          any private message
//! message/private/friend   private messages from friends
//! ```
//!
//! An event is offered to the most specific registered key only.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::trace;

use crate::context::RequestContext;
use crate::error::BoxError;
use crate::event::{BoxedEvent, Event, EventOutcome, QuickOperation};

/// Result of a single event handler.
pub type EventHandlerResult = Result<Option<QuickOperation>, BoxError>;

/// Handles events registered under one key.
#[async_trait]
pub trait EventHandler: Send + Sync {
    async fn handle(&self, ctx: &RequestContext, event: BoxedEvent) -> EventHandlerResult;
}

/// Anything that can take a decoded event from a transport.
#[async_trait]
pub trait EventRequestHandler: Send + Sync {
    async fn handle_event(
        &self,
        ctx: &RequestContext,
        event: BoxedEvent,
    ) -> Result<EventOutcome, BoxError>;
}

/// Adapts an async closure into an [`EventHandler`].
pub struct FnEventHandler<F>(F);

impl<F> FnEventHandler<F> {
    pub fn new(f: F) -> Self {
        Self(f)
    }
}

#[async_trait]
impl<F, Fut> EventHandler for FnEventHandler<F>
where
    F: Fn(RequestContext, BoxedEvent) -> Fut + Send + Sync,
    Fut: Future<Output = EventHandlerResult> + Send,
{
    async fn handle(&self, ctx: &RequestContext, event: BoxedEvent) -> EventHandlerResult {
        (self.0)(ctx.clone(), event).await
    }
}

/// Candidate registration keys for `event`, most specific first.
///
/// The sub type only contributes when both it and the detail type are
/// non-empty.
pub fn candidate_keys(event: &dyn Event) -> Vec<String> {
    let post_type = event.post_type();
    let detail_type = event.detail_type();
    let sub_type = event.sub_type();

    let mut keys = Vec::with_capacity(3);
    if !detail_type.is_empty() {
        if !sub_type.is_empty() {
            keys.push(format!("{post_type}/{detail_type}/{sub_type}"));
        }
        keys.push(format!("{post_type}/{detail_type}"));
    }
    keys.push(post_type.to_string());
    keys
}

/// Routes events to handlers by `post_type[/type[/sub_type]]`.
#[derive(Default, Clone)]
pub struct EventDispatcher {
    handlers: HashMap<String, Arc<dyn EventHandler>>,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `handler` under `key`, replacing any previous handler.
    pub fn register<H>(&mut self, key: &str, handler: H) -> &mut Self
    where
        H: EventHandler + 'static,
    {
        self.handlers
            .insert(key.trim_matches('/').to_string(), Arc::new(handler));
        self
    }

    pub fn register_fn<F, Fut>(&mut self, key: &str, f: F) -> &mut Self
    where
        F: Fn(RequestContext, BoxedEvent) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = EventHandlerResult> + Send + 'static,
    {
        self.register(key, FnEventHandler::new(f))
    }

    /// Finds the most specific handler for `event` and the key it matched.
    pub fn resolve(&self, event: &dyn Event) -> Option<(String, Arc<dyn EventHandler>)> {
        candidate_keys(event)
            .into_iter()
            .find_map(|key| self.handlers.get(&key).cloned().map(|h| (key, h)))
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

#[async_trait]
impl EventRequestHandler for EventDispatcher {
    async fn handle_event(
        &self,
        ctx: &RequestContext,
        event: BoxedEvent,
    ) -> Result<EventOutcome, BoxError> {
        let Some((key, handler)) = self.resolve(&*event) else {
            trace!(post_type = %event.post_type(), "No event handler matched");
            return Ok(EventOutcome::Unhandled);
        };
        trace!(key = %key, "Dispatching event");
        let op = handler.handle(ctx, event).await?;
        Ok(EventOutcome::from_quick_operation(op))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Protocol;
    use serde_json::{Value, json};
    use std::any::Any;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug)]
    struct Probe {
        post_type: &'static str,
        detail_type: &'static str,
        sub_type: &'static str,
    }

    impl Event for Probe {
        fn time(&self) -> i64 {
            0
        }
        fn self_id(&self) -> i64 {
            0
        }
        fn post_type(&self) -> &str {
            self.post_type
        }
        fn detail_type(&self) -> &str {
            self.detail_type
        }
        fn sub_type(&self) -> &str {
            self.sub_type
        }
        fn as_any(&self) -> &dyn Any {
            self
        }
        fn to_json(&self) -> serde_json::Result<Value> {
            Ok(json!({"post_type": self.post_type}))
        }
    }

    fn probe(post_type: &'static str, detail_type: &'static str, sub_type: &'static str) -> Probe {
        Probe {
            post_type,
            detail_type,
            sub_type,
        }
    }

    fn ctx() -> RequestContext {
        RequestContext::new(Protocol::Http)
    }

    fn tagged(tag: &'static str) -> impl Fn(RequestContext, BoxedEvent) -> futures::future::Ready<EventHandlerResult> {
        move |_, _| {
            let mut op = QuickOperation::new();
            op.insert("reply".into(), json!(tag));
            futures::future::ready(Ok(Some(op)))
        }
    }

    #[test]
    fn test_candidate_keys_order() {
        assert_eq!(
            candidate_keys(&probe("message", "private", "friend")),
            vec!["message/private/friend", "message/private", "message"]
        );
        assert_eq!(
            candidate_keys(&probe("notice", "group_upload", "")),
            vec!["notice/group_upload", "notice"]
        );
        assert_eq!(candidate_keys(&probe("custom", "", "x")), vec!["custom"]);
    }

    #[tokio::test]
    async fn test_falls_back_to_less_specific_key() {
        let mut dispatcher = EventDispatcher::new();
        dispatcher.register_fn("message/private", tagged("private"));

        let outcome = dispatcher
            .handle_event(&ctx(), BoxedEvent::new(probe("message", "private", "friend")))
            .await
            .unwrap();
        assert_eq!(outcome.into_reply().unwrap()["reply"], json!("private"));
    }

    #[tokio::test]
    async fn test_most_specific_key_wins() {
        let mut dispatcher = EventDispatcher::new();
        dispatcher
            .register_fn("message", tagged("any"))
            .register_fn("message/private/friend", tagged("friend"))
            .register_fn("message/private", tagged("private"));

        let reply = |outcome: EventOutcome| outcome.into_reply().unwrap()["reply"].clone();

        let friend = dispatcher
            .handle_event(&ctx(), BoxedEvent::new(probe("message", "private", "friend")))
            .await
            .unwrap();
        assert_eq!(reply(friend), json!("friend"));

        let group = dispatcher
            .handle_event(&ctx(), BoxedEvent::new(probe("message", "group", "normal")))
            .await
            .unwrap();
        assert_eq!(reply(group), json!("any"));
    }

    #[tokio::test]
    async fn test_unmatched_and_empty_reply() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let mut dispatcher = EventDispatcher::new();
        dispatcher.register_fn("meta_event", move |_, _| {
            counter.fetch_add(1, Ordering::SeqCst);
            async { Ok(Some(QuickOperation::new())) }
        });

        let outcome = dispatcher
            .handle_event(&ctx(), BoxedEvent::new(probe("meta_event", "heartbeat", "")))
            .await
            .unwrap();
        assert_eq!(outcome, EventOutcome::NoReply);
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let outcome = dispatcher
            .handle_event(&ctx(), BoxedEvent::new(probe("request", "friend", "")))
            .await
            .unwrap();
        assert_eq!(outcome, EventOutcome::Unhandled);
    }

    #[tokio::test]
    async fn test_handler_error_propagates() {
        let mut dispatcher = EventDispatcher::new();
        dispatcher.register_fn("notice", |_, _| async { Err(BoxError::from("storage offline")) });

        let err = dispatcher
            .handle_event(&ctx(), BoxedEvent::new(probe("notice", "friend_add", "")))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "storage offline");
    }
}
