//! Turns orchestrator events into terminal output and chat event logs.

use std::future::Future;
use std::io::{self, Write};

use anyhow::Result;
use chatdeck_core::{Message, Role};
use chatdeck_logging::{ChatEvent, ChatEventLogger};
use chatdeck_orchestrator::{OrchestratorEvent, SubmissionState, SubmitOutcome};
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::warn;

use crate::terminal_output::{note_error, note_warn, stream_write, styled, BOLD, DIM, MAGENTA};

const ASSISTANT_PREFIX: &str = "assistant> ";

/// Writes assistant replies as they stream in.
pub struct Renderer<W: Write> {
    out: W,
    conversation_id: String,
    /// Id and printed byte length of the reply being streamed.
    streaming: Option<(usize, usize)>,
    last_reply: Option<Message>,
}

impl<W: Write> Renderer<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            conversation_id: String::new(),
            streaming: None,
            last_reply: None,
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    pub fn handle(&mut self, event: &OrchestratorEvent) -> io::Result<()> {
        match event {
            OrchestratorEvent::MessageAppended { message } => {
                if !message.content.is_empty() {
                    self.log(ChatEvent::Message {
                        role: message.role.to_string(),
                        content: message.content.clone(),
                    });
                }
                if message.role == Role::Assistant {
                    self.start_reply(message)?;
                }
            }
            OrchestratorEvent::MessageUpdated { message } => self.continue_reply(message)?,
            OrchestratorEvent::StateChanged { state } => self.state_changed(state)?,
            OrchestratorEvent::ConversationStored { id, created } => {
                self.conversation_id = id.clone();
                if *created {
                    self.log(ChatEvent::ConversationStored { created: true });
                }
            }
            OrchestratorEvent::ConversationLoaded { id } => self.conversation_id = id.clone(),
            OrchestratorEvent::ConversationDeleted { id } => {
                ChatEventLogger::log_event(id, ChatEvent::ConversationDeleted);
            }
            OrchestratorEvent::ConversationCleared | OrchestratorEvent::HistoryCleared => {
                self.conversation_id.clear();
            }
            OrchestratorEvent::MessageRemoved { .. }
            | OrchestratorEvent::SystemMessageUpdated { .. } => {}
        }
        Ok(())
    }

    fn log(&self, event: ChatEvent) {
        ChatEventLogger::log_event(&self.conversation_id, event);
    }

    fn start_reply(&mut self, message: &Message) -> io::Result<()> {
        stream_write(&mut self.out, &styled(MAGENTA, ASSISTANT_PREFIX))?;
        stream_write(&mut self.out, &message.content)?;
        if message.content.is_empty() {
            // Placeholder of a network reply; chunks follow.
            self.streaming = Some((message.id, 0));
        } else {
            writeln!(self.out)?;
        }
        Ok(())
    }

    fn continue_reply(&mut self, message: &Message) -> io::Result<()> {
        let Some((id, printed)) = self.streaming else {
            return Ok(());
        };
        if message.id != id || message.role != Role::Assistant {
            return Ok(());
        }
        // Content only grows by appending, so `printed` is a char boundary.
        if let Some(delta) = message.content.get(printed..) {
            stream_write(&mut self.out, delta)?;
            self.streaming = Some((id, message.content.len()));
        }
        self.last_reply = Some(message.clone());
        Ok(())
    }

    fn state_changed(&mut self, state: &SubmissionState) -> io::Result<()> {
        match state {
            SubmissionState::Idle | SubmissionState::Error(_) => {
                if self.streaming.take().is_some() {
                    writeln!(self.out)?;
                }
                if let Some(reply) = self.last_reply.take() {
                    self.log(ChatEvent::Message {
                        role: reply.role.to_string(),
                        content: reply.content,
                    });
                }
            }
            SubmissionState::Submitting | SubmissionState::Streaming => {}
        }
        match state {
            SubmissionState::Error(message) => self.log(ChatEvent::Error {
                error_msg: message.clone(),
            }),
            other => self.log(ChatEvent::StateChanged {
                state: format!("{other:?}").to_lowercase(),
            }),
        }
        Ok(())
    }
}

/// Run `turn` on its own task while rendering the events it produces.
pub async fn run_turn<T, F, W>(
    events: &mut broadcast::Receiver<OrchestratorEvent>,
    renderer: &mut Renderer<W>,
    turn: F,
) -> Result<T>
where
    T: Send + 'static,
    F: Future<Output = T> + Send + 'static,
    W: Write,
{
    let mut handle = tokio::spawn(turn);
    let mut closed = false;
    let outcome = loop {
        tokio::select! {
            joined = &mut handle => break joined?,
            event = events.recv(), if !closed => match event {
                Ok(event) => renderer.handle(&event)?,
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "Renderer fell behind"),
                Err(RecvError::Closed) => closed = true,
            },
        }
    };
    while let Ok(event) = events.try_recv() {
        renderer.handle(&event)?;
    }
    Ok(outcome)
}

/// Print a conversation the way the chat loop shows it.
pub fn print_transcript(out: &mut impl Write, system: &Message, messages: &[Message]) -> io::Result<()> {
    writeln!(out, "{}", styled(DIM, &format!("system: {}", system.content)))?;
    for message in messages {
        let label = format!("[{}] {}:", message.id, message.role);
        writeln!(out, "{} {}", styled(BOLD, &label), message.content)?;
    }
    Ok(())
}

/// Report a failed or dropped submission.
pub fn report_outcome(outcome: &SubmitOutcome) {
    match outcome {
        SubmitOutcome::Failed(message) => note_error(message),
        SubmitOutcome::Busy => note_warn("A reply is still streaming"),
        SubmitOutcome::Abandoned => note_warn("Reply abandoned; the conversation changed"),
        SubmitOutcome::Skipped | SubmitOutcome::Scripted | SubmitOutcome::Streamed => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chatdeck_core::ModelCatalog;
    use chatdeck_orchestrator::{ChatOrchestrator, OrchestratorOptions};
    use chatdeck_store::{HistoryStore, MemoryStorage, ScriptStore};
    use chatdeck_transport::{MockReply, MockTransport};
    use std::sync::Arc;

    fn streamed(chunks: &[&str]) -> Vec<OrchestratorEvent> {
        let mut events = vec![
            OrchestratorEvent::StateChanged {
                state: SubmissionState::Submitting,
            },
            OrchestratorEvent::MessageAppended {
                message: Message::new(1, Role::Assistant, ""),
            },
        ];
        let mut content = String::new();
        for chunk in chunks {
            content.push_str(chunk);
            events.push(OrchestratorEvent::MessageUpdated {
                message: Message::new(1, Role::Assistant, content.clone()),
            });
        }
        events.push(OrchestratorEvent::StateChanged {
            state: SubmissionState::Idle,
        });
        events
    }

    fn render(events: &[OrchestratorEvent]) -> String {
        let mut renderer = Renderer::new(Vec::new());
        for event in events {
            renderer.handle(event).unwrap();
        }
        String::from_utf8(renderer.into_inner()).unwrap()
    }

    #[test]
    fn streamed_reply_is_printed_once() {
        let output = render(&streamed(&["Hel", "lo", " there"]));
        assert!(output.ends_with("Hello there\n"));
        assert_eq!(output.matches("Hel").count(), 1);
    }

    #[test]
    fn scripted_reply_is_printed_whole() {
        let output = render(&[OrchestratorEvent::MessageAppended {
            message: Message::new(1, Role::Assistant, "Hello World"),
        }]);
        assert!(output.ends_with("Hello World\n"));
    }

    #[test]
    fn user_messages_are_not_echoed() {
        let output = render(&[OrchestratorEvent::MessageAppended {
            message: Message::new(0, Role::User, "hi"),
        }]);
        assert!(output.is_empty());
    }

    #[tokio::test]
    async fn run_turn_renders_whole_reply() {
        let storage = Arc::new(MemoryStorage::new());
        let orchestrator = Arc::new(ChatOrchestrator::new(
            HistoryStore::new(storage.clone()),
            ScriptStore::new(storage),
            Arc::new(MockTransport::new().with_reply(MockReply::chunks(["Hi", " you"]))),
            ModelCatalog::builtin(),
            OrchestratorOptions::default(),
        ));
        let mut events = orchestrator.subscribe();
        let mut renderer = Renderer::new(Vec::new());

        let o = orchestrator.clone();
        let outcome = run_turn(&mut events, &mut renderer, async move {
            o.add_message("hello", Role::User).await
        })
        .await
        .unwrap();

        assert_eq!(outcome, SubmitOutcome::Streamed);
        let output = String::from_utf8(renderer.into_inner()).unwrap();
        assert!(output.ends_with("Hi you\n"));
    }

    #[test]
    fn transcript_lists_messages_with_ids() {
        let mut out = Vec::new();
        print_transcript(
            &mut out,
            &Message::system("sys"),
            &[
                Message::new(0, Role::User, "hi"),
                Message::new(1, Role::Assistant, "hello"),
            ],
        )
        .unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("system: sys"));
        assert!(text.contains("[1] assistant:"));
    }
}
