//! Local persistence for ChatDeck: keyed blob storage plus the history and
//! script stores built on top of it.

mod blob;
pub mod history;
pub mod scripts;
pub mod storage;

pub use history::{HistoryStore, HISTORY_KEY};
pub use scripts::{create_script, ScriptStore, SCRIPT_DEFAULT_ID, SCRIPT_KEY};
pub use storage::{FileStorage, KeyValueStorage, MemoryStorage};
