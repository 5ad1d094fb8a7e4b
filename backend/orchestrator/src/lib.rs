//! Conversation orchestration for ChatDeck.
//!
//! [`ChatOrchestrator`] owns the working conversation, keeps the history
//! store in sync with it, and answers user messages from a script or a
//! streaming completion transport.

pub mod events;
pub mod orchestrator;
pub mod state;

pub use events::OrchestratorEvent;
pub use orchestrator::{ChatOrchestrator, OrchestratorOptions};
pub use state::{ChatSession, SubmissionState, SubmitOutcome};
