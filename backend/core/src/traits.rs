use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;
use serde::{Deserialize, Serialize};

use crate::error::TransportError;
use crate::models::Configuration;
use crate::types::{Message, Role};

/// Incrementally decoded text of a streaming completion.
pub type TextStream = Pin<Box<dyn Stream<Item = Result<String, TransportError>> + Send>>;

/// Trait for anything that can stream a completion for a conversation.
#[async_trait]
pub trait CompletionTransport: Send + Sync {
    /// Transport name (e.g., "http", "mock").
    fn name(&self) -> &str;

    /// Issue one request and return the response body as text chunks.
    ///
    /// A non-success response is reported as an error here; the returned
    /// stream only ever carries a successful body.
    async fn stream_completion(
        &self,
        request: &CompletionRequest,
        token: &str,
    ) -> Result<TextStream, TransportError>;
}

/// A message as sent over the wire: role and content, no id.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WireMessage {
    pub role: Role,
    pub content: String,
}

impl From<&Message> for WireMessage {
    fn from(message: &Message) -> Self {
        Self {
            role: message.role,
            content: message.content.clone(),
        }
    }
}

/// Request body: configuration fields plus the message list.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CompletionRequest {
    #[serde(flatten)]
    pub config: Configuration,
    pub messages: Vec<WireMessage>,
}

impl CompletionRequest {
    /// Build a request with the system message prepended.
    pub fn new(system_message: &Message, messages: &[Message], config: &Configuration) -> Self {
        let messages = std::iter::once(system_message)
            .chain(messages.iter())
            .map(WireMessage::from)
            .collect();
        Self {
            config: config.clone(),
            messages,
        }
    }
}
