//! Core types for the ChatDeck client: messages, conversations, scripts,
//! the model catalog, and the completion transport trait.

pub mod error;
pub mod models;
pub mod traits;
pub mod types;

pub use error::{ChatError, Result, TransportError};
pub use models::{ChatModel, Configuration, ConfigurationUpdate, ModelCatalog, DEFAULT_MODEL};
pub use traits::{CompletionRequest, CompletionTransport, TextStream, WireMessage};
pub use types::{
    Conversation, ConversationPatch, History, Message, Role, Script, ScriptItem, ScriptPatch,
    Scripts, DEFAULT_SYSTEM_MESSAGE,
};
