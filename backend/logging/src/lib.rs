//! Telemetry and structured logging for ChatDeck.
//!
//! Console and rolling NDJSON file output, log redaction, and chat event
//! logging.

pub mod event_logger;
pub mod logger;
pub mod redact;

pub use event_logger::{ChatEvent, ChatEventLogger, EventLogEntry};
pub use logger::init_logger;
pub use redact::redact_sensitive_data;
