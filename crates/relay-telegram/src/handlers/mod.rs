//! Telegram update handlers.
//!
//! Each handler maps a Telegram update onto a `relay-core` inbound event and
//! hands it to the engine on its own task. Teloxide serializes updates per
//! chat, so awaiting a whole batch here would hold back the stop command.

use std::sync::Arc;

use teloxide::{
    prelude::*,
    types::{CallbackQuery, Message, UpdateKind},
};
use tracing::{debug, warn};

use relay_core::{domain::ChatId, messaging::types::InboundEvent};

use crate::router::AppState;

mod callback;
mod commands;
mod document;
mod text;

/// What a single message turns into.
#[derive(Debug)]
pub enum Routed {
    Event(InboundEvent),
    /// Answered directly by the adapter (greeting, usage hints).
    Reply(ChatId, String),
}

pub async fn handle_callback(q: CallbackQuery, state: Arc<AppState>) -> ResponseResult<()> {
    match callback::route_callback(&q) {
        Some(event) => spawn_event(state, event),
        None => {
            if let Err(e) = state.messenger.answer_callback_query(&q.id, None).await {
                warn!(error = %e, "failed to answer callback query");
            }
        }
    }
    Ok(())
}

pub async fn handle_message(msg: Message, state: Arc<AppState>) -> ResponseResult<()> {
    match route_message(&msg) {
        Some(Routed::Event(event)) => spawn_event(state, event),
        Some(Routed::Reply(chat_id, text)) => {
            if let Err(e) = state.messenger.send_text(chat_id, &text).await {
                warn!(error = %e, "failed to send reply");
            }
        }
        None => debug!(chat = msg.chat.id.0, "ignoring unsupported message"),
    }
    Ok(())
}

/// Webhook entry point: route a decoded update without blocking the caller.
pub fn dispatch_update(state: Arc<AppState>, update: Update) {
    tokio::spawn(async move {
        let res = match update.kind {
            UpdateKind::Message(msg) => handle_message(msg, state).await,
            UpdateKind::CallbackQuery(q) => handle_callback(q, state).await,
            other => {
                debug!(?other, "ignoring update kind");
                Ok(())
            }
        };
        if let Err(e) = res {
            warn!(error = %e, "update handling failed");
        }
    });
}

pub fn route_message(msg: &Message) -> Option<Routed> {
    if let Some(text) = msg.text() {
        if text.starts_with('/') {
            return commands::route_command(msg, text);
        }
        return text::route_text(msg, text);
    }
    if let Some(doc) = msg.document() {
        return document::route_document(msg, doc);
    }
    None
}

fn spawn_event(state: Arc<AppState>, event: InboundEvent) {
    tokio::spawn(async move {
        let outcome = state.engine.handle(event).await;
        debug!(?outcome, "event handled");
    });
}
