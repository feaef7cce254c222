//! Echo Bot Example
//!
//! Serves a few OneBot v11 actions and answers message events pushed over
//! HTTP with a quick operation.
//!
//! # Commands
//!
//! - `/echo <text>` - Echoes back the text
//! - `/ping` - Replies with "Pong!"
//! - `/group` - Group only, replies with the group id
//!
//! # Actions
//!
//! - `echo` - returns its `message` param
//! - `get_status` - reports the bot as online
//!
//! # Running
//!
//! ```bash
//! cargo run -p echo-bot -- --config onebot.toml
//! ```

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use onebot::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info};

#[derive(Parser, Debug)]
#[command(name = "echo-bot", about = "OneBot v11 echo bot")]
struct Args {
    /// Configuration file, searched in the working directory when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Configuration profile (also read from ONEBOT_PROFILE).
    #[arg(short, long)]
    profile: Option<String>,
}

#[derive(Deserialize)]
struct EchoParams {
    message: String,
}

#[derive(Serialize)]
struct EchoReply {
    message: String,
}

// ============================================================================
// Handlers
// ============================================================================

/// Builds the quick reply for a command, if the text is one.
fn command_reply(text: &str, group_id: Option<i64>) -> Option<String> {
    let text = text.trim();
    if let Some(rest) = text.strip_prefix("/echo ") {
        return Some(rest.to_string());
    }
    match text {
        "/ping" => Some("Pong! 🏓".to_string()),
        "/group" => group_id.map(|id| format!("✅ This is a group-only command!\n• Group ID: {id}")),
        _ => None,
    }
}

fn quick_reply(reply: String) -> QuickOperation {
    let mut op = QuickOperation::new();
    op.insert("reply".into(), json!(reply));
    op
}

/// Replies to private messages that carry a command.
async fn private_message(_ctx: RequestContext, event: BoxedEvent) -> EventHandlerResult {
    let Some(msg) = event.downcast_ref::<PrivateMessageEvent>() else {
        return Ok(None);
    };
    let text = msg.plain_text();
    info!(user_id = msg.user_id, text = %text, "Private message");
    Ok(command_reply(&text, None).map(quick_reply))
}

/// Replies to group messages that carry a command.
async fn group_message(_ctx: RequestContext, event: BoxedEvent) -> EventHandlerResult {
    let Some(msg) = event.downcast_ref::<GroupMessageEvent>() else {
        return Ok(None);
    };
    let text = msg.plain_text();
    info!(
        group_id = msg.group_id,
        user_id = msg.user_id,
        text = %text,
        "Group message"
    );
    Ok(command_reply(&text, Some(msg.group_id)).map(quick_reply))
}

async fn meta_event(_ctx: RequestContext, event: BoxedEvent) -> EventHandlerResult {
    debug!(event = ?event.inner(), "Meta event");
    Ok(None)
}

async fn echo(_ctx: RequestContext, params: EchoParams) -> Result<EchoReply, ActionError> {
    Ok(EchoReply {
        message: params.message,
    })
}

async fn get_status(ctx: RequestContext, _params: Params) -> ActionResult {
    debug!(protocol = ?ctx.protocol, "Status requested");
    Ok(Some(ActionRawResponse::ok(json!({ "online": true, "good": true }))))
}

fn actions() -> ActionDispatcher {
    let mut actions = ActionDispatcher::new();
    actions.bind("echo", echo).register_fn("get_status", get_status);
    actions
}

fn events() -> EventDispatcher {
    let mut events = EventDispatcher::new();
    events
        .register_fn("message/private", private_message)
        .register_fn("message/group", group_message)
        .register_fn("meta_event", meta_event);
    events
}

// ============================================================================
// Main Entry Point
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut builder = OneBotRuntime::builder().actions(actions()).events(events());
    if let Some(path) = args.config {
        builder = builder.config_file(path);
    }
    if let Some(profile) = args.profile {
        builder = builder.profile(profile);
    }

    let runtime = builder.build()?;
    info!("Echo bot starting");
    runtime.run_until_ctrl_c().await?;
    info!("Echo bot stopped");

    Ok(())
}
