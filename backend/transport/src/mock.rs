use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chatdeck_core::{CompletionRequest, CompletionTransport, TextStream, TransportError};
use tokio::sync::Notify;

/// One scripted reply of a [`MockTransport`].
#[derive(Debug, Clone)]
pub enum MockReply {
    /// Stream these chunks, then end.
    Chunks(Vec<String>),
    /// Stream these chunks, then fail mid-body.
    Interrupted {
        chunks: Vec<String>,
        error: TransportError,
    },
    /// Fail before any body is produced.
    Fail(TransportError),
}

impl MockReply {
    pub fn chunks<I, S>(chunks: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        MockReply::Chunks(chunks.into_iter().map(Into::into).collect())
    }
}

/// A transport that replays canned replies and records every request.
///
/// Once the queue is empty it answers with a fixed "Mock response".
#[derive(Default)]
pub struct MockTransport {
    replies: Mutex<VecDeque<MockReply>>,
    requests: Mutex<Vec<CompletionRequest>>,
    gate: Option<Arc<Notify>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_reply(self, reply: MockReply) -> Self {
        lock(&self.replies).push_back(reply);
        self
    }

    /// Hold every request until `gate` is notified.
    pub fn with_gate(mut self, gate: Arc<Notify>) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn push_reply(&self, reply: MockReply) {
        lock(&self.replies).push_back(reply);
    }

    /// Requests received so far, in order.
    pub fn requests(&self) -> Vec<CompletionRequest> {
        lock(&self.requests).clone()
    }

    pub fn call_count(&self) -> usize {
        lock(&self.requests).len()
    }
}

#[async_trait]
impl CompletionTransport for MockTransport {
    fn name(&self) -> &str {
        "mock"
    }

    async fn stream_completion(
        &self,
        request: &CompletionRequest,
        _token: &str,
    ) -> Result<TextStream, TransportError> {
        lock(&self.requests).push(request.clone());

        if let Some(gate) = &self.gate {
            gate.notified().await;
        }

        let reply = lock(&self.replies)
            .pop_front()
            .unwrap_or_else(|| MockReply::chunks(["Mock response"]));

        let items: Vec<Result<String, TransportError>> = match reply {
            MockReply::Chunks(chunks) => chunks.into_iter().map(Ok).collect(),
            MockReply::Interrupted { chunks, error } => chunks
                .into_iter()
                .map(Ok)
                .chain(std::iter::once(Err(error)))
                .collect(),
            MockReply::Fail(error) => return Err(error),
        };
        Ok(Box::pin(futures::stream::iter(items)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chatdeck_core::{Configuration, Message};
    use futures::StreamExt;

    fn request() -> CompletionRequest {
        CompletionRequest::new(&Message::system("sys"), &[], &Configuration::default())
    }

    #[tokio::test]
    async fn replays_queue_then_falls_back() {
        let transport = MockTransport::new()
            .with_reply(MockReply::chunks(["a", "b"]))
            .with_reply(MockReply::Fail(TransportError::Request("down".into())));

        let first: Vec<_> = transport
            .stream_completion(&request(), "t")
            .await
            .unwrap()
            .collect()
            .await;
        assert_eq!(first, vec![Ok("a".to_string()), Ok("b".to_string())]);

        assert!(transport.stream_completion(&request(), "t").await.is_err());

        let fallback: Vec<_> = transport
            .stream_completion(&request(), "t")
            .await
            .unwrap()
            .collect()
            .await;
        assert_eq!(fallback, vec![Ok("Mock response".to_string())]);
        assert_eq!(transport.call_count(), 3);
    }
}
