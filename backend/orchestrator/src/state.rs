//! Working state of the active conversation.

use chatdeck_core::{Configuration, Conversation, History, Message, Role, Script, ScriptItem};
use serde::Serialize;

/// Named states of the submission state machine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Default)]
#[serde(tag = "state", content = "message", rename_all = "snake_case")]
pub enum SubmissionState {
    #[default]
    Idle,
    /// Request sent, no response yet.
    Submitting,
    /// Assistant placeholder appended and receiving chunks.
    Streaming,
    /// Last submission failed; the message is also kept in `error`.
    Error(String),
}

impl SubmissionState {
    /// True while a submission is in flight.
    pub fn is_loading(&self) -> bool {
        matches!(self, SubmissionState::Submitting | SubmissionState::Streaming)
    }
}

/// Result of a submission attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Nothing to submit: no messages, or the last one is assistant-authored.
    Skipped,
    /// Another submission was already in flight; this one was dropped.
    Busy,
    /// A script item was appended instead of calling the network.
    Scripted,
    /// The network completion streamed to the end.
    Streamed,
    /// The working conversation was replaced while streaming.
    Abandoned,
    /// The transport failed; partial content is kept.
    Failed(String),
}

/// The orchestrator's copy of the active conversation.
#[derive(Debug, Clone)]
pub struct ChatSession {
    /// Empty until the conversation is first persisted.
    pub conversation_id: String,
    pub conversation_name: String,
    pub system_message: Message,
    pub messages: Vec<Message>,
    pub config: Configuration,
    /// Cached view of the history store.
    pub conversations: History,
    pub script: Option<Script>,
    /// Next script item to hand out. Not persisted.
    pub script_position: usize,
    pub state: SubmissionState,
    pub error: String,
    pub token: String,
    /// Bumped whenever the working conversation is replaced, so an
    /// in-flight stream can tell its target is gone.
    pub generation: u64,
}

impl ChatSession {
    pub fn new(system_message: &str, config: Configuration, token: String) -> Self {
        Self {
            conversation_id: String::new(),
            conversation_name: String::new(),
            system_message: Message::system(system_message),
            messages: Vec::new(),
            config,
            conversations: History::new(),
            script: None,
            script_position: 0,
            state: SubmissionState::Idle,
            error: String::new(),
            token,
            generation: 0,
        }
    }

    /// Append a message with a position-derived id.
    pub fn push_message(&mut self, role: Role, content: impl Into<String>) -> Message {
        let message = Message::new(self.messages.len(), role, content);
        self.messages.push(message.clone());
        message
    }

    pub fn find_message_mut(&mut self, id: usize) -> Option<&mut Message> {
        self.messages.iter_mut().find(|m| m.id == id)
    }

    pub fn last_is_assistant(&self) -> bool {
        self.messages
            .last()
            .is_some_and(|m| m.role == Role::Assistant)
    }

    /// The script item to answer with, if the most recent user message asks
    /// for one and the loaded script still has an item at the cursor.
    pub fn pending_script_item(&self) -> Option<ScriptItem> {
        let last_user = self.messages.iter().rev().find(|m| m.role == Role::User)?;
        if !last_user.requests_script() {
            return None;
        }
        self.script
            .as_ref()?
            .script_items
            .get(self.script_position)
            .cloned()
    }

    pub fn snapshot(&self, last_message: i64) -> Conversation {
        Conversation {
            name: self.conversation_name.clone(),
            system_message: self.system_message.clone(),
            messages: self.messages.clone(),
            config: self.config.clone(),
            last_message,
        }
    }

    /// Reset to an empty, unsaved conversation.
    pub fn reset(&mut self, system_message: &str) {
        self.conversation_id.clear();
        self.conversation_name.clear();
        self.system_message = Message::system(system_message);
        self.messages.clear();
        self.generation += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session_with_script(values: &[&str]) -> ChatSession {
        let mut session = ChatSession::new("sys", Configuration::default(), String::new());
        session.script = Some(Script {
            name: "default".into(),
            script_items: values
                .iter()
                .enumerate()
                .map(|(i, v)| ScriptItem {
                    id: i.to_string(),
                    value: v.to_string(),
                    prompt: None,
                })
                .collect(),
        });
        session
    }

    #[test]
    fn loading_only_while_in_flight() {
        assert!(!SubmissionState::Idle.is_loading());
        assert!(SubmissionState::Submitting.is_loading());
        assert!(SubmissionState::Streaming.is_loading());
        assert!(!SubmissionState::Error("x".into()).is_loading());
    }

    #[test]
    fn ids_follow_position() {
        let mut session = ChatSession::new("sys", Configuration::default(), String::new());
        assert_eq!(session.push_message(Role::User, "a").id, 0);
        assert_eq!(session.push_message(Role::Assistant, "b").id, 1);
        assert!(session.last_is_assistant());
    }

    #[test]
    fn script_item_requires_leading_space_on_last_user_message() {
        let mut session = session_with_script(&["Hello World"]);
        session.push_message(Role::User, "go");
        assert!(session.pending_script_item().is_none());

        session.push_message(Role::User, " go");
        assert_eq!(session.pending_script_item().unwrap().value, "Hello World");

        session.script_position = 1;
        assert!(session.pending_script_item().is_none());
    }

    #[test]
    fn script_item_looks_past_trailing_assistant_message() {
        let mut session = session_with_script(&["one", "two"]);
        session.push_message(Role::User, " go");
        session.push_message(Role::Assistant, "one");
        session.script_position = 1;
        assert_eq!(session.pending_script_item().unwrap().value, "two");
    }

    #[test]
    fn reset_bumps_generation() {
        let mut session = ChatSession::new("sys", Configuration::default(), String::new());
        session.conversation_id = "abc".into();
        session.push_message(Role::User, "hi");
        session.reset("fresh");
        assert!(session.conversation_id.is_empty());
        assert!(session.messages.is_empty());
        assert_eq!(session.system_message.content, "fresh");
        assert_eq!(session.generation, 1);
    }
}
