mod chat_cmd;
mod config_cmd;
mod context;
mod history_cmd;
mod models_cmd;
mod render;
mod scripts_cmd;
mod terminal_output;

use std::path::PathBuf;

use anyhow::Result;
use chatdeck_config::{config_dir, config_file_path};
use chatdeck_logging::init_logger;
use clap::{Parser, Subcommand};

use config_cmd::ConfigCommands;
use context::AppContext;
use history_cmd::HistoryCommands;
use scripts_cmd::ScriptCommands;
use terminal_output::note_error;

#[derive(Parser)]
#[command(name = "chatdeck")]
#[command(about = "ChatDeck: streaming chat client with saved conversations and scripted replies")]
#[command(version)]
struct Cli {
    /// Config file (default: $CHATDECK_CONFIG_DIR/config.yaml or ~/.chatdeck/config.yaml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Also log to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Chat interactively
    Chat {
        /// Resume a stored conversation
        #[arg(short, long)]
        conversation: Option<String>,
        /// Answer with canned mock replies instead of the endpoint
        #[arg(long)]
        offline: bool,
        /// Script to answer space-prefixed messages from
        #[arg(long)]
        script: Option<String>,
    },
    /// Send one message and print the reply
    Send {
        message: String,
        #[arg(short, long)]
        conversation: Option<String>,
        #[arg(long)]
        offline: bool,
        #[arg(long)]
        script: Option<String>,
    },
    /// Manage stored conversations
    #[command(subcommand)]
    History(HistoryCommands),
    /// Manage scripts of canned replies
    #[command(subcommand)]
    Scripts(ScriptCommands),
    /// List available models
    Models,
    /// Inspect or create the config file
    #[command(subcommand)]
    Config(ConfigCommands),
}

#[tokio::main]
async fn main() {
    if let Err(e) = run(Cli::parse()).await {
        note_error(&format!("{e:#}"));
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config_path = cli
        .config
        .unwrap_or_else(|| config_file_path(&config_dir()));

    if let Commands::Config(cmd) = cli.command {
        return config_cmd::run(cmd, &config_path).await;
    }

    let ctx = AppContext::load(Some(config_path)).await?;
    init_logger(
        ctx.config.log_dir().as_deref(),
        ctx.config.log_level(),
        ctx.config.log_to_console() || cli.verbose,
    );

    match cli.command {
        Commands::Chat {
            conversation,
            offline,
            script,
        } => chat_cmd::run_chat(&ctx, conversation, offline, script).await,
        Commands::Send {
            message,
            conversation,
            offline,
            script,
        } => chat_cmd::run_send(&ctx, message, conversation, offline, script).await,
        Commands::History(cmd) => history_cmd::run(&ctx, cmd).await,
        Commands::Scripts(cmd) => scripts_cmd::run(&ctx, cmd).await,
        Commands::Models => models_cmd::run(&ctx),
        Commands::Config(_) => Ok(()),
    }
}
