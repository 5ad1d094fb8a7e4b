use async_trait::async_trait;
use chatdeck_core::{CompletionRequest, CompletionTransport, TextStream, TransportError};
use futures::StreamExt;
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::decoder::decode_text_stream;

/// Message used when an error body carries no `error.message`.
pub const FALLBACK_ERROR_MESSAGE: &str =
    "Failed to fetch response, check your API key and try again.";

/// Completion endpoint reached over HTTP.
///
/// One `POST` per submission. No retry, backoff, or timeout.
pub struct HttpTransport {
    client: Client,
    endpoint: String,
}

impl HttpTransport {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            endpoint: endpoint.into(),
        }
    }

    pub fn with_client(mut self, client: Client) -> Self {
        self.client = client;
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[derive(Deserialize)]
struct ErrorBody {
    error: Option<ErrorDetail>,
}

#[derive(Deserialize)]
struct ErrorDetail {
    message: Option<String>,
}

/// Extract `error.message` from the first chunk of an error body.
fn error_message(chunk: &[u8]) -> String {
    serde_json::from_slice::<ErrorBody>(chunk)
        .ok()
        .and_then(|body| body.error)
        .and_then(|detail| detail.message)
        .filter(|message| !message.is_empty())
        .unwrap_or_else(|| FALLBACK_ERROR_MESSAGE.to_string())
}

#[async_trait]
impl CompletionTransport for HttpTransport {
    fn name(&self) -> &str {
        "http"
    }

    async fn stream_completion(
        &self,
        request: &CompletionRequest,
        token: &str,
    ) -> Result<TextStream, TransportError> {
        debug!(
            endpoint = %self.endpoint,
            model = %request.config.model,
            messages = request.messages.len(),
            "Sending completion request"
        );

        let response = self
            .client
            .post(&self.endpoint)
            .header(CONTENT_TYPE, "application/json")
            .bearer_auth(token)
            .json(request)
            .send()
            .await
            .map_err(|e| TransportError::Request(e.to_string()))?;

        let status = response.status();
        let mut body = response.bytes_stream();

        if !status.is_success() {
            // Only the first chunk is read; the rest of the body is dropped.
            let first = match body.next().await {
                Some(Ok(bytes)) => bytes.to_vec(),
                Some(Err(e)) => return Err(TransportError::Stream(e.to_string())),
                None => Vec::new(),
            };
            let message = error_message(&first);
            warn!(status = status.as_u16(), %message, "Completion endpoint returned an error");
            return Err(TransportError::Api {
                status: status.as_u16(),
                message,
            });
        }

        Ok(decode_text_stream(body))
    }
}
