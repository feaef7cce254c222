//! Action dispatch.
//!
//! ```text
//! frame ──▶ ActionRequestEnvelope ──▶ ActionRequestHandler ──▶ ActionRawResponse + echo
//!                                       (ActionDispatcher)
//!                                             │
//!                                   name ─▶ Arc<dyn ActionHandler>
//! ```

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, trace};

use crate::context::RequestContext;
use crate::envelope::{
    ActionRawResponse, ActionRequest, ActionRequestEnvelope, ActionResponseEnvelope, Params,
    retcode,
};
use crate::error::{ActionError, ActionResult};

// ============================================================================
// Handler traits
// ============================================================================

/// A handler for a single named action.
#[async_trait]
pub trait ActionHandler: Send + Sync {
    async fn call(&self, ctx: &RequestContext, params: Params) -> ActionResult;
}

/// Anything that can answer a full action request.
///
/// Transports only see this trait, so a dispatcher can be swapped for a
/// fixed handler (for instance one that rejects every action).
#[async_trait]
pub trait ActionRequestHandler: Send + Sync {
    async fn handle_action_request(
        &self,
        ctx: &RequestContext,
        request: ActionRequest,
    ) -> ActionResult;
}

/// Adapts an async closure into an [`ActionHandler`].
pub struct FnHandler<F>(F);

impl<F> FnHandler<F> {
    pub fn new(f: F) -> Self {
        Self(f)
    }
}

#[async_trait]
impl<F, Fut> ActionHandler for FnHandler<F>
where
    F: Fn(RequestContext, Params) -> Fut + Send + Sync,
    Fut: Future<Output = ActionResult> + Send,
{
    async fn call(&self, ctx: &RequestContext, params: Params) -> ActionResult {
        (self.0)(ctx.clone(), params).await
    }
}

// ============================================================================
// ActionDispatcher
// ============================================================================

/// Routes action requests by name.
///
/// Registration happens before the dispatcher is shared; afterwards it is
/// read-only and calls are never serialized against each other.
#[derive(Default, Clone)]
pub struct ActionDispatcher {
    handlers: HashMap<String, Arc<dyn ActionHandler>>,
}

impl ActionDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `handler` under `action`, replacing any previous handler.
    pub fn register<H>(&mut self, action: impl Into<String>, handler: H) -> &mut Self
    where
        H: ActionHandler + 'static,
    {
        let action = action.into();
        if self
            .handlers
            .insert(action.clone(), Arc::new(handler))
            .is_some()
        {
            debug!(action = %action, "Replaced existing action handler");
        }
        self
    }

    /// Registers an async closure.
    pub fn register_fn<F, Fut>(&mut self, action: impl Into<String>, f: F) -> &mut Self
    where
        F: Fn(RequestContext, Params) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ActionResult> + Send + 'static,
    {
        self.register(action, FnHandler::new(f))
    }

    pub fn contains(&self, action: &str) -> bool {
        self.handlers.contains_key(action)
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

#[async_trait]
impl ActionRequestHandler for ActionDispatcher {
    async fn handle_action_request(
        &self,
        ctx: &RequestContext,
        request: ActionRequest,
    ) -> ActionResult {
        let Some(handler) = self.handlers.get(&request.action) else {
            return Err(ActionError::NotFound(request.action));
        };
        trace!(action = %request.action, protocol = %ctx.protocol, "Dispatching action");
        handler.call(ctx, request.params).await
    }
}

/// Rejects every action with [`ActionError::NotFound`].
#[derive(Debug, Default, Clone, Copy)]
pub struct RejectActions;

#[async_trait]
impl ActionRequestHandler for RejectActions {
    async fn handle_action_request(
        &self,
        _ctx: &RequestContext,
        request: ActionRequest,
    ) -> ActionResult {
        Err(ActionError::NotFound(request.action))
    }
}

// ============================================================================
// Envelope handling
// ============================================================================

/// Maps a dispatch result onto the wire response.
pub fn into_raw_response(result: ActionResult) -> ActionRawResponse {
    match result {
        Ok(Some(response)) => response,
        Ok(None) => ActionRawResponse::empty(),
        Err(err) => err.into_response(),
    }
}

/// Decodes a request frame, dispatches it and builds the reply frame.
///
/// A frame that is not a valid request yields a 1400 reply without echo.
pub async fn handle_action_frame(
    handler: &dyn ActionRequestHandler,
    ctx: &RequestContext,
    frame: &[u8],
) -> ActionResponseEnvelope {
    let envelope: ActionRequestEnvelope = match serde_json::from_slice(frame) {
        Ok(envelope) => envelope,
        Err(e) => {
            debug!(error = %e, "Rejected malformed action frame");
            return ActionResponseEnvelope::new(
                ActionRawResponse::failed(retcode::BAD_REQUEST, "invalid json"),
                None,
            );
        }
    };

    let (request, echo) = envelope.into_parts();
    let result = handler.handle_action_request(ctx, request).await;
    ActionResponseEnvelope::new(into_raw_response(result), echo)
}
