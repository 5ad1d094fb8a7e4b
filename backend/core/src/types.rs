use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::models::Configuration;

/// System prompt of a fresh conversation.
pub const DEFAULT_SYSTEM_MESSAGE: &str = "You are a helpful AI chatbot.";

/// Author of a message.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    User,
    Assistant,
    System,
}

impl Role {
    /// The role a message flips to when the user toggles it.
    pub fn toggled(self) -> Self {
        match self {
            Role::User => Role::Assistant,
            Role::Assistant => Role::User,
            Role::System => Role::System,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::System => "system",
        };
        f.write_str(s)
    }
}

/// One entry of a conversation.
///
/// `id` is the length of the message list at append time, so it is only
/// unique until a message is removed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Message {
    pub id: usize,
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn new(id: usize, role: Role, content: impl Into<String>) -> Self {
        Self {
            id,
            role,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(0, Role::System, content)
    }

    /// True when the content starts with exactly the space the script
    /// routing convention looks for.
    pub fn requests_script(&self) -> bool {
        self.content.starts_with(' ')
    }
}

/// A persisted chat session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    #[serde(default)]
    pub name: String,
    pub system_message: Message,
    #[serde(default)]
    pub messages: Vec<Message>,
    #[serde(default)]
    pub config: Configuration,
    /// Unix timestamp in milliseconds of the last persisted change.
    #[serde(default)]
    pub last_message: i64,
}

impl Conversation {
    /// Short label for listings: the name, or the first user message.
    pub fn title(&self) -> String {
        if !self.name.trim().is_empty() {
            return self.name.clone();
        }
        self.messages
            .iter()
            .find(|m| m.role == Role::User)
            .map(|m| m.content.trim().chars().take(40).collect())
            .unwrap_or_else(|| "Untitled".to_string())
    }
}

/// Conversation id → conversation.
pub type History = HashMap<String, Conversation>;

/// Field-level partial update of a [`Conversation`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConversationPatch {
    pub name: Option<String>,
    pub system_message: Option<Message>,
    pub messages: Option<Vec<Message>>,
    pub config: Option<Configuration>,
    pub last_message: Option<i64>,
}

impl ConversationPatch {
    pub fn name(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Default::default()
        }
    }

    pub fn apply(self, conversation: &mut Conversation) {
        if let Some(name) = self.name {
            conversation.name = name;
        }
        if let Some(system_message) = self.system_message {
            conversation.system_message = system_message;
        }
        if let Some(messages) = self.messages {
            conversation.messages = messages;
        }
        if let Some(config) = self.config {
            conversation.config = config;
        }
        if let Some(last_message) = self.last_message {
            conversation.last_message = last_message;
        }
    }
}

/// One canned response.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScriptItem {
    pub id: String,
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
}

/// An ordered list of canned responses.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Script {
    pub name: String,
    #[serde(default)]
    pub script_items: Vec<ScriptItem>,
}

/// Script id → script.
pub type Scripts = HashMap<String, Script>;

/// Field-level partial update of a [`Script`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScriptPatch {
    pub name: Option<String>,
    pub script_items: Option<Vec<ScriptItem>>,
}

impl ScriptPatch {
    pub fn apply(self, script: &mut Script) {
        if let Some(name) = self.name {
            script.name = name;
        }
        if let Some(items) = self.script_items {
            script.script_items = items;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn toggle_swaps_user_and_assistant_only() {
        assert_eq!(Role::User.toggled(), Role::Assistant);
        assert_eq!(Role::Assistant.toggled(), Role::User);
        assert_eq!(Role::System.toggled(), Role::System);
    }

    #[test]
    fn leading_space_requests_script() {
        assert!(Message::new(0, Role::User, " go").requests_script());
        assert!(Message::new(0, Role::User, " ").requests_script());
        assert!(!Message::new(0, Role::User, "go").requests_script());
        assert!(!Message::new(0, Role::User, "\tgo").requests_script());
        assert!(!Message::new(0, Role::User, "").requests_script());
    }

    #[test]
    fn conversation_uses_camel_case_keys() {
        let conversation = Conversation {
            name: "demo".into(),
            system_message: Message::system(DEFAULT_SYSTEM_MESSAGE),
            messages: vec![Message::new(0, Role::User, "hi")],
            config: Configuration::default(),
            last_message: 42,
        };
        let value = serde_json::to_value(&conversation).unwrap();
        assert_eq!(value["systemMessage"]["role"], "system");
        assert_eq!(value["lastMessage"], 42);
        assert_eq!(value["messages"][0]["role"], "user");
    }

    #[test]
    fn patch_only_touches_present_fields() {
        let mut conversation = Conversation {
            name: "old".into(),
            system_message: Message::system("sys"),
            messages: vec![Message::new(0, Role::User, "hi")],
            config: Configuration::default(),
            last_message: 1,
        };
        ConversationPatch::name("new").apply(&mut conversation);
        assert_eq!(conversation.name, "new");
        assert_eq!(conversation.messages.len(), 1);
        assert_eq!(conversation.last_message, 1);
    }

    #[test]
    fn title_falls_back_to_first_user_message() {
        let conversation = Conversation {
            name: String::new(),
            system_message: Message::system("sys"),
            messages: vec![Message::new(0, Role::User, "  what is rust?")],
            config: Configuration::default(),
            last_message: 0,
        };
        assert_eq!(conversation.title(), "what is rust?");
    }
}
