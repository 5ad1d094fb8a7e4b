//! `chatdeck scripts` subcommands.

use anyhow::{bail, Result};
use chatdeck_core::ScriptPatch;
use chatdeck_store::{create_script, SCRIPT_DEFAULT_ID};
use clap::Subcommand;

use crate::context::AppContext;
use crate::terminal_output::{note_success, note_warn, render_table, Column};

#[derive(Subcommand)]
pub enum ScriptCommands {
    /// List stored scripts
    List,
    /// Print the items of a script
    Show { id: String },
    /// Create a script with a single "Hello World" item
    Create {
        #[arg(long, default_value = SCRIPT_DEFAULT_ID)]
        id: String,
    },
    /// Append a canned response to a script
    Add {
        id: String,
        value: String,
        /// Note describing when the response is used
        #[arg(long)]
        prompt: Option<String>,
    },
    /// Rename a script
    Rename { id: String, name: String },
    /// Delete a script
    Delete { id: String },
    /// Delete every script
    Clear,
}

pub async fn run(ctx: &AppContext, cmd: ScriptCommands) -> Result<()> {
    let scripts = ctx.scripts();
    match cmd {
        ScriptCommands::List => {
            let mut all: Vec<_> = scripts.get_all().into_iter().collect();
            if all.is_empty() {
                println!("  No scripts. Create one with `chatdeck scripts create`.");
                return Ok(());
            }
            all.sort_by(|a, b| a.0.cmp(&b.0));
            let columns = vec![
                Column::left("ID"),
                Column::left("Name"),
                Column::right("Items"),
            ];
            let rows: Vec<Vec<String>> = all
                .into_iter()
                .map(|(id, script)| vec![id, script.name, script.script_items.len().to_string()])
                .collect();
            print!("{}", render_table(&columns, &rows));
        }
        ScriptCommands::Show { id } => {
            let Some(script) = scripts.get(&id) else {
                bail!("No script with id {id}");
            };
            println!("{}", script.name);
            for (i, item) in script.script_items.iter().enumerate() {
                match &item.prompt {
                    Some(prompt) => println!("  {i}. {} ({prompt})", item.value),
                    None => println!("  {i}. {}", item.value),
                }
            }
        }
        ScriptCommands::Create { id } => {
            let id = scripts.store(&create_script(), Some(id.as_str()))?;
            note_success(&format!("Created script {id}"));
        }
        ScriptCommands::Add { id, value, prompt } => match scripts.add_item(&id, value, prompt)? {
            Some(item) => note_success(&format!("Added item {} to {id}", item.id)),
            None => bail!("No script with id {id}"),
        },
        ScriptCommands::Rename { id, name } => {
            let patch = ScriptPatch {
                name: Some(name),
                ..Default::default()
            };
            if !scripts.update(&id, patch)? {
                bail!("No script with id {id}");
            }
            note_success("Script renamed");
        }
        ScriptCommands::Delete { id } => {
            if scripts.delete(&id)? {
                note_success(&format!("Deleted script {id}"));
            } else {
                note_warn(&format!("No script with id {id}"));
            }
        }
        ScriptCommands::Clear => {
            scripts.clear()?;
            note_success("Scripts cleared");
        }
    }
    Ok(())
}
