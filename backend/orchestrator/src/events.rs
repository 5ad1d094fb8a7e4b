use chatdeck_core::Message;
use serde::Serialize;

use crate::state::SubmissionState;

/// Change notifications broadcast to UI consumers.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OrchestratorEvent {
    MessageAppended { message: Message },
    /// A message changed in place (streaming chunk, edit, role toggle).
    MessageUpdated { message: Message },
    MessageRemoved { id: usize },
    SystemMessageUpdated { content: String },
    StateChanged { state: SubmissionState },
    /// `created` is true the first time an id is assigned.
    ConversationStored { id: String, created: bool },
    ConversationLoaded { id: String },
    ConversationDeleted { id: String },
    ConversationCleared,
    HistoryCleared,
}
