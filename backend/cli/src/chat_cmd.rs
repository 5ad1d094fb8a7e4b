//! Interactive chat loop and one-shot `send`.

use std::io::{self, Write};
use std::sync::Arc;

use anyhow::{bail, Result};
use chatdeck_core::{ConfigurationUpdate, Role};
use chatdeck_orchestrator::{ChatOrchestrator, OrchestratorEvent, SubmitOutcome};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast;

use crate::context::AppContext;
use crate::history_cmd::render_history;
use crate::render::{print_transcript, report_outcome, run_turn, Renderer};
use crate::terminal_output::{note_error, note_info, note_success, note_warn, styled, BOLD};

const HELP: &str = "\
Commands:
  /new              start a new conversation
  /system TEXT      set the system message
  /model ID         switch model
  /name TEXT        rename the current conversation
  /role N           toggle message N between user and assistant
  /edit N TEXT      replace the content of message N
  /remove N         remove message N
  /retry            submit the conversation again
  /history          list stored conversations
  /load ID          open a stored conversation
  /delete ID        delete a stored conversation
  /script ID        load a script and rewind it
  /show             print the current conversation
  /quit             leave
Start a message with a space to answer it from the loaded script.";

/// One line of chat input.
#[derive(Debug, Clone, PartialEq)]
pub enum ChatInput {
    Message(String),
    New,
    System(String),
    Model(String),
    Name(String),
    Role(usize),
    Edit(usize, String),
    Remove(usize),
    Retry,
    History,
    Load(String),
    Delete(String),
    Script(String),
    Show,
    Help,
    Quit,
}

impl ChatInput {
    /// Parse a line. Plain lines are sent verbatim, leading space included.
    pub fn parse(line: &str) -> Result<Option<Self>, String> {
        if line.is_empty() {
            return Ok(None);
        }
        let Some(command) = line.strip_prefix('/') else {
            return Ok(Some(ChatInput::Message(line.to_string())));
        };

        let (name, rest) = match command.split_once(char::is_whitespace) {
            Some((name, rest)) => (name, rest.trim()),
            None => (command, ""),
        };
        let text = |usage: &str| {
            if rest.is_empty() {
                Err(format!("Usage: {usage}"))
            } else {
                Ok(rest.to_string())
            }
        };
        let index = |s: &str, usage: &str| {
            s.parse::<usize>()
                .map_err(|_| format!("Usage: {usage}"))
        };

        let input = match name {
            "new" => ChatInput::New,
            "system" => ChatInput::System(text("/system TEXT")?),
            "model" => ChatInput::Model(text("/model ID")?),
            "name" => ChatInput::Name(text("/name TEXT")?),
            "role" => ChatInput::Role(index(rest, "/role N")?),
            "edit" => {
                let (n, content) = rest
                    .split_once(char::is_whitespace)
                    .ok_or_else(|| "Usage: /edit N TEXT".to_string())?;
                ChatInput::Edit(index(n, "/edit N TEXT")?, content.to_string())
            }
            "remove" => ChatInput::Remove(index(rest, "/remove N")?),
            "retry" => ChatInput::Retry,
            "history" => ChatInput::History,
            "load" => ChatInput::Load(text("/load ID")?),
            "delete" => ChatInput::Delete(text("/delete ID")?),
            "script" => ChatInput::Script(text("/script ID")?),
            "show" => ChatInput::Show,
            "help" => ChatInput::Help,
            "quit" | "exit" => ChatInput::Quit,
            other => return Err(format!("Unknown command '/{other}'. Try /help")),
        };
        Ok(Some(input))
    }
}

struct ChatLoop<W: Write> {
    orchestrator: Arc<ChatOrchestrator>,
    events: broadcast::Receiver<OrchestratorEvent>,
    renderer: Renderer<W>,
}

impl<W: Write> ChatLoop<W> {
    fn new(orchestrator: Arc<ChatOrchestrator>, out: W) -> Self {
        let events = orchestrator.subscribe();
        Self {
            orchestrator,
            events,
            renderer: Renderer::new(out),
        }
    }

    async fn send(&mut self, content: String) -> Result<SubmitOutcome> {
        let o = self.orchestrator.clone();
        run_turn(&mut self.events, &mut self.renderer, async move {
            o.add_message(content, Role::User).await
        })
        .await
    }

    async fn load(&mut self, id: String) -> Result<Option<SubmitOutcome>> {
        let o = self.orchestrator.clone();
        run_turn(&mut self.events, &mut self.renderer, async move {
            o.load_conversation_by_id(&id).await
        })
        .await
    }

    async fn show(&self) -> Result<()> {
        let system = self.orchestrator.system_message().await;
        let messages = self.orchestrator.messages().await;
        print_transcript(&mut io::stdout(), &system, &messages)?;
        Ok(())
    }

    /// Returns false when the user asked to quit.
    async fn dispatch(&mut self, input: ChatInput) -> Result<bool> {
        let o = self.orchestrator.clone();
        match input {
            ChatInput::Message(content) => report_outcome(&self.send(content).await?),
            ChatInput::New => {
                o.clear_conversation().await;
                note_success("Started a new conversation");
            }
            ChatInput::System(text) => {
                o.update_system_message(text).await;
                note_success("System message updated");
            }
            ChatInput::Model(id) => match o.update_config(ConfigurationUpdate::model(id)).await {
                Ok(config) => note_success(&format!(
                    "Using {} (max tokens {})",
                    config.model, config.max_tokens
                )),
                Err(e) => note_error(&e.to_string()),
            },
            ChatInput::Name(name) => {
                let id = o.conversation_id().await;
                if id.is_empty() {
                    note_warn("Send a message first; unsaved conversations have no name");
                } else if o.update_conversation_name(&id, name).await? {
                    note_success("Conversation renamed");
                }
            }
            ChatInput::Role(n) => {
                let outcome = run_turn(&mut self.events, &mut self.renderer, async move {
                    o.toggle_message_role(n).await
                })
                .await?;
                report_outcome(&outcome);
            }
            ChatInput::Edit(n, content) => {
                let outcome = run_turn(&mut self.events, &mut self.renderer, async move {
                    o.update_message_content(n, content).await
                })
                .await?;
                report_outcome(&outcome);
            }
            ChatInput::Remove(n) => {
                let outcome = run_turn(&mut self.events, &mut self.renderer, async move {
                    o.remove_message(n).await
                })
                .await?;
                report_outcome(&outcome);
            }
            ChatInput::Retry => {
                let outcome = run_turn(&mut self.events, &mut self.renderer, async move {
                    o.submit().await
                })
                .await?;
                report_outcome(&outcome);
            }
            ChatInput::History => {
                print!("{}", render_history(&o.conversations().await));
            }
            ChatInput::Load(id) => match self.load(id.clone()).await? {
                Some(outcome) => {
                    note_info(&format!("Loaded conversation {id}"));
                    self.show().await?;
                    report_outcome(&outcome);
                }
                None => note_warn(&format!("No conversation with id {id}")),
            },
            ChatInput::Delete(id) => {
                if o.delete_conversation(&id).await? {
                    note_success(&format!("Deleted conversation {id}"));
                } else {
                    note_warn(&format!("No conversation with id {id}"));
                }
            }
            ChatInput::Script(id) => {
                if o.reload_script(&id).await {
                    note_success(&format!("Loaded script {id}"));
                } else {
                    note_warn(&format!("No script with id {id}"));
                }
            }
            ChatInput::Show => self.show().await?,
            ChatInput::Help => println!("{HELP}"),
            ChatInput::Quit => return Ok(false),
        }
        Ok(true)
    }
}

/// Interactive chat on stdin/stdout.
pub async fn run_chat(
    ctx: &AppContext,
    conversation: Option<String>,
    offline: bool,
    script: Option<String>,
) -> Result<()> {
    let orchestrator = ctx.orchestrator(offline, script.as_deref()).await?;
    let mut session = ChatLoop::new(orchestrator.clone(), io::stdout());

    if let Some(id) = conversation {
        session.dispatch(ChatInput::Load(id)).await?;
    }
    let config = orchestrator.config().await;
    note_info(&format!(
        "Chatting with {} (max tokens {}). Type /help for commands.",
        config.model, config.max_tokens
    ));

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("{}", styled(BOLD, "you> "));
        io::stdout().flush()?;
        let Some(line) = lines.next_line().await? else {
            break;
        };
        let input = match ChatInput::parse(&line) {
            Ok(Some(input)) => input,
            Ok(None) => continue,
            Err(usage) => {
                note_warn(&usage);
                continue;
            }
        };
        if !session.dispatch(input).await? {
            break;
        }
    }

    orchestrator.shutdown().await;
    Ok(())
}

/// Send one message and print the reply.
pub async fn run_send(
    ctx: &AppContext,
    message: String,
    conversation: Option<String>,
    offline: bool,
    script: Option<String>,
) -> Result<()> {
    let orchestrator = ctx.orchestrator(offline, script.as_deref()).await?;
    let mut session = ChatLoop::new(orchestrator.clone(), io::stdout());

    if let Some(id) = conversation {
        if session.load(id.clone()).await?.is_none() {
            bail!("No conversation with id {id}");
        }
    }

    let outcome = session.send(message).await?;
    orchestrator.shutdown().await;
    match outcome {
        SubmitOutcome::Failed(message) => bail!(message),
        other => {
            report_outcome(&other);
            Ok(())
        }
    }
}
