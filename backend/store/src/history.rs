//! Conversation history persistence.
//!
//! All conversations live in one JSON mapping under [`HISTORY_KEY`]. Every
//! operation reads the whole mapping, changes it, and writes it back, so two
//! processes sharing a storage directory see last-writer-wins semantics.

use std::sync::Arc;

use chatdeck_core::{Conversation, ConversationPatch, History, Result};
use tracing::{debug, info};
use uuid::Uuid;

use crate::blob::{read_map, write_map};
use crate::storage::KeyValueStorage;

/// Storage key of the history mapping.
pub const HISTORY_KEY: &str = "HISTORY_KEY";

/// Keyed store of persisted conversations.
#[derive(Clone)]
pub struct HistoryStore {
    storage: Arc<dyn KeyValueStorage>,
}

impl HistoryStore {
    pub fn new(storage: Arc<dyn KeyValueStorage>) -> Self {
        Self { storage }
    }

    /// All stored conversations; empty when nothing valid is stored.
    pub fn get(&self) -> History {
        read_map(self.storage.as_ref(), HISTORY_KEY)
    }

    pub fn get_conversation(&self, id: &str) -> Option<Conversation> {
        self.get().remove(id)
    }

    /// Write `conversation` under `id`, generating a fresh id when `id` is
    /// empty. Returns the id used.
    pub fn store(&self, id: &str, conversation: &Conversation) -> Result<String> {
        let id = if id.is_empty() {
            let id = Uuid::new_v4().to_string();
            info!(conversation_id = %id, "Assigned new conversation id");
            id
        } else {
            id.to_string()
        };

        let mut history = self.get();
        history.insert(id.clone(), conversation.clone());
        write_map(self.storage.as_ref(), HISTORY_KEY, &history)?;

        debug!(conversation_id = %id, messages = conversation.messages.len(), "Stored conversation");
        Ok(id)
    }

    /// Apply `patch` to an existing conversation. Returns `false` without
    /// writing when `id` is unknown.
    pub fn update(&self, id: &str, patch: ConversationPatch) -> Result<bool> {
        let mut history = self.get();
        let Some(conversation) = history.get_mut(id) else {
            debug!(conversation_id = %id, "Update skipped; conversation not found");
            return Ok(false);
        };
        patch.apply(conversation);
        write_map(self.storage.as_ref(), HISTORY_KEY, &history)?;
        Ok(true)
    }

    /// Remove a conversation. Returns whether it existed.
    pub fn delete(&self, id: &str) -> Result<bool> {
        let mut history = self.get();
        if history.remove(id).is_none() {
            return Ok(false);
        }
        write_map(self.storage.as_ref(), HISTORY_KEY, &history)?;
        info!(conversation_id = %id, "Deleted conversation");
        Ok(true)
    }

    /// Remove every stored conversation.
    pub fn clear(&self) -> Result<()> {
        self.storage.remove_item(HISTORY_KEY)?;
        info!("Cleared conversation history");
        Ok(())
    }
}
