//! `chatdeck config` subcommands.

use std::path::Path;

use anyhow::{Context, Result};
use chatdeck_config::{
    defaults::DEFAULT_ENDPOINT_URL, redact, write_config, ChatConfig, ChatDeckConfig,
    EndpointConfig, LoggingConfig,
};
use chatdeck_core::{DEFAULT_MODEL, DEFAULT_SYSTEM_MESSAGE};
use clap::Subcommand;

use crate::context::AppContext;
use crate::terminal_output::{note_success, note_warn};

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Print the effective config with secrets masked
    Show,
    /// Print the config file location
    Path,
    /// Write a starter config file if none exists
    Init,
}

/// Effective config as YAML, secrets masked.
pub fn render_redacted(config: &ChatDeckConfig) -> Result<String> {
    let value = serde_json::to_value(config).context("Failed to serialize config")?;
    serde_yaml::to_string(&redact(&value)).context("Failed to render config as YAML")
}

fn starter_config() -> ChatDeckConfig {
    ChatDeckConfig {
        endpoint: Some(EndpointConfig {
            url: Some(DEFAULT_ENDPOINT_URL.to_string()),
            api_token: None,
        }),
        chat: Some(ChatConfig {
            system_message: Some(DEFAULT_SYSTEM_MESSAGE.to_string()),
            model: Some(DEFAULT_MODEL.to_string()),
            ..Default::default()
        }),
        logging: Some(LoggingConfig {
            level: Some("info".to_string()),
            ..Default::default()
        }),
        ..Default::default()
    }
}

pub async fn run(cmd: ConfigCommands, config_path: &Path) -> Result<()> {
    match cmd {
        ConfigCommands::Show => {
            let ctx = AppContext::load(Some(config_path.to_path_buf())).await?;
            print!("{}", render_redacted(&ctx.config)?);
        }
        ConfigCommands::Path => println!("{}", config_path.display()),
        ConfigCommands::Init => {
            if config_path.exists() {
                note_warn(&format!("{} already exists", config_path.display()));
                return Ok(());
            }
            write_config(&starter_config(), config_path).await?;
            note_success(&format!("Wrote {}", config_path.display()));
        }
    }
    Ok(())
}
