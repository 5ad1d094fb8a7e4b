use thiserror::Error;

/// Top-level error type for the ChatDeck client.
#[derive(Debug, Error)]
pub enum ChatError {
    #[error("unknown model: {0}")]
    UnknownModel(String),

    #[error("invalid configuration ({field}): {message}")]
    InvalidConfiguration { field: String, message: String },

    #[error("storage error: {0}")]
    Storage(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ChatError {
    pub fn invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        ChatError::InvalidConfiguration {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Failures raised by a completion transport.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    /// The request never produced a response (connection refused, DNS, ...).
    #[error("completion request failed: {0}")]
    Request(String),

    /// The endpoint answered with a non-success status.
    #[error("{message}")]
    Api { status: u16, message: String },

    /// Reading the response body failed midway.
    #[error("stream read error: {0}")]
    Stream(String),
}

pub type Result<T, E = ChatError> = std::result::Result<T, E>;
