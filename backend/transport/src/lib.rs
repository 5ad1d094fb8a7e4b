//! Completion transports for ChatDeck.
//!
//! [`HttpTransport`] talks to the real endpoint; [`MockTransport`] replays
//! canned chunks for tests and offline sessions.

pub mod decoder;
pub mod http;
pub mod mock;

pub use decoder::{decode_text_stream, Utf8ChunkDecoder};
pub use http::{HttpTransport, FALLBACK_ERROR_MESSAGE};
pub use mock::{MockReply, MockTransport};
