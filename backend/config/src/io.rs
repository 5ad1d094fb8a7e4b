//! Locating, reading and atomically rewriting `config.yaml`.

use crate::schema::ChatDeckConfig;
use anyhow::{Context, Result};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info, warn};

const CONFIG_FILE_NAME: &str = "config.yaml";

/// Number of rolling backups to keep.
const MAX_BACKUPS: usize = 5;

/// Resolve the ChatDeck config directory.
/// Priority: `CHATDECK_CONFIG_DIR` env > `~/.chatdeck/`
pub fn config_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("CHATDECK_CONFIG_DIR") {
        if !dir.is_empty() {
            return PathBuf::from(dir);
        }
    }
    match dirs::home_dir() {
        Some(home) => home.join(".chatdeck"),
        None => PathBuf::from(".chatdeck"),
    }
}

pub fn config_file_path(config_dir: &Path) -> PathBuf {
    config_dir.join(CONFIG_FILE_NAME)
}

/// Read and parse the config at `path`.
///
/// A missing or blank file is a first run and yields the defaults.
pub async fn load_config(path: &Path) -> Result<ChatDeckConfig> {
    let raw = match fs::read_to_string(path).await {
        Ok(raw) => raw,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            debug!(path = %path.display(), "No config file; using defaults");
            return Ok(ChatDeckConfig::default());
        }
        Err(e) => {
            return Err(e).with_context(|| format!("Failed to read config file: {}", path.display()))
        }
    };
    if raw.trim().is_empty() {
        return Ok(ChatDeckConfig::default());
    }

    let config = serde_yaml::from_str(&raw)
        .with_context(|| format!("Failed to parse config YAML at: {}", path.display()))?;
    info!(path = %path.display(), "Loaded config");
    Ok(config)
}

/// Replace the config at `path` through a temp file, keeping the previous
/// contents as `config.yaml.bak.1` and shifting older backups up to
/// [`MAX_BACKUPS`].
pub async fn write_config(config: &ChatDeckConfig, path: &Path) -> Result<()> {
    let yaml = serde_yaml::to_string(config).context("Failed to serialize config to YAML")?;

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .await
            .with_context(|| format!("Failed to create config directory: {}", parent.display()))?;
    }
    if fs::try_exists(path).await.unwrap_or(false) {
        keep_backup(path).await;
    }

    let staged = path.with_extension("yaml.tmp");
    fs::write(&staged, yaml)
        .await
        .with_context(|| format!("Failed to stage config at {}", staged.display()))?;
    fs::rename(&staged, path)
        .await
        .with_context(|| format!("Failed to move staged config to {}", path.display()))?;

    info!(path = %path.display(), "Wrote config");
    Ok(())
}

fn backup_path(path: &Path, n: usize) -> PathBuf {
    path.with_extension(format!("yaml.bak.{n}"))
}

/// Backup failures are logged; they never block the write itself.
async fn keep_backup(path: &Path) {
    for n in (1..MAX_BACKUPS).rev() {
        let from = backup_path(path, n);
        if !fs::try_exists(&from).await.unwrap_or(false) {
            continue;
        }
        if let Err(e) = fs::rename(&from, backup_path(path, n + 1)).await {
            warn!(backup = %from.display(), error = %e, "Could not shift config backup");
        }
    }
    let newest = backup_path(path, 1);
    if let Err(e) = fs::copy(path, &newest).await {
        warn!(backup = %newest.display(), error = %e, "Could not back up config");
    }
}
