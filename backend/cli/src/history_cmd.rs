//! `chatdeck history` subcommands.

use std::io;

use anyhow::{bail, Result};
use chatdeck_core::History;
use chrono::DateTime;
use clap::Subcommand;

use crate::context::AppContext;
use crate::render::print_transcript;
use crate::terminal_output::{note_info, note_success, note_warn, render_table, Column};

#[derive(Subcommand)]
pub enum HistoryCommands {
    /// List stored conversations, newest first
    List,
    /// Print one conversation
    Show { id: String },
    /// Rename a conversation
    Rename { id: String, name: String },
    /// Delete a conversation
    Delete { id: String },
    /// Delete every stored conversation
    Clear {
        /// Confirm deletion
        #[arg(long)]
        yes: bool,
    },
}

/// Table of conversations sorted by last change, newest first.
pub fn render_history(history: &History) -> String {
    if history.is_empty() {
        return "  No stored conversations.\n".to_string();
    }
    let mut entries: Vec<_> = history.iter().collect();
    entries.sort_by(|a, b| b.1.last_message.cmp(&a.1.last_message));

    let columns = vec![
        Column::left("ID"),
        Column::left("Title").max_width(40),
        Column::right("Messages"),
        Column::left("Model"),
        Column::left("Updated"),
    ];
    let rows: Vec<Vec<String>> = entries
        .into_iter()
        .map(|(id, conversation)| {
            vec![
                id.clone(),
                conversation.title(),
                conversation.messages.len().to_string(),
                conversation.config.model.clone(),
                format_timestamp(conversation.last_message),
            ]
        })
        .collect();
    render_table(&columns, &rows)
}

fn format_timestamp(millis: i64) -> String {
    DateTime::from_timestamp_millis(millis)
        .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| "-".to_string())
}

pub async fn run(ctx: &AppContext, cmd: HistoryCommands) -> Result<()> {
    match cmd {
        HistoryCommands::List => {
            print!("{}", render_history(&ctx.history().get()));
        }
        HistoryCommands::Show { id } => {
            let Some(conversation) = ctx.history().get_conversation(&id) else {
                bail!("No conversation with id {id}");
            };
            note_info(&format!(
                "{} ({}, max tokens {})",
                conversation.title(),
                conversation.config.model,
                conversation.config.max_tokens
            ));
            print_transcript(
                &mut io::stdout(),
                &conversation.system_message,
                &conversation.messages,
            )?;
        }
        HistoryCommands::Rename { id, name } => {
            let orchestrator = ctx.orchestrator(true, None).await?;
            if !orchestrator.update_conversation_name(&id, name).await? {
                bail!("No conversation with id {id}");
            }
            note_success("Conversation renamed");
        }
        HistoryCommands::Delete { id } => {
            let orchestrator = ctx.orchestrator(true, None).await?;
            if orchestrator.delete_conversation(&id).await? {
                note_success(&format!("Deleted conversation {id}"));
            } else {
                note_warn(&format!("No conversation with id {id}"));
            }
        }
        HistoryCommands::Clear { yes } => {
            if !yes {
                bail!("Refusing to delete all conversations without --yes");
            }
            let orchestrator = ctx.orchestrator(true, None).await?;
            orchestrator.clear_conversations().await?;
            note_success("History cleared");
        }
    }
    Ok(())
}
