//! Chat Event Logger
//!
//! Conversation events (messages, state changes, errors) written through
//! `tracing` under the `chat_events` target.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

use crate::redact::redact_sensitive_data;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChatEvent {
    Message { role: String, content: String },
    StateChanged { state: String },
    ConversationStored { created: bool },
    ConversationDeleted,
    Error { error_msg: String },
}

impl ChatEvent {
    fn redacted(mut self) -> Self {
        match &mut self {
            ChatEvent::Message { content, .. } => *content = redact_sensitive_data(content),
            ChatEvent::Error { error_msg } => *error_msg = redact_sensitive_data(error_msg),
            _ => {}
        }
        self
    }
}

#[derive(Debug, Serialize)]
pub struct EventLogEntry {
    pub conversation_id: String,
    pub timestamp: DateTime<Utc>,
    pub event: ChatEvent,
}

impl EventLogEntry {
    pub fn new(conversation_id: &str, event: ChatEvent) -> Self {
        Self {
            conversation_id: conversation_id.to_string(),
            timestamp: Utc::now(),
            event: event.redacted(),
        }
    }
}

pub struct ChatEventLogger;

impl ChatEventLogger {
    /// Redact and emit one event.
    pub fn log_event(conversation_id: &str, event: ChatEvent) {
        let entry = EventLogEntry::new(conversation_id, event);
        let json = serde_json::to_string(&entry).unwrap_or_default();
        info!(target: "chat_events", conversation_id = %entry.conversation_id, event = %json, "Chat event");
    }
}
