//! ChatDeck configuration schema, typed for serde YAML/JSON.

use chatdeck_core::{
    ChatModel, Configuration, ConfigurationUpdate, ModelCatalog, DEFAULT_MODEL,
    DEFAULT_SYSTEM_MESSAGE,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::defaults::{DEFAULT_ENDPOINT_URL, DEFAULT_LOG_LEVEL, DEFAULT_STORAGE_DIR_NAME};

/// Root configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatDeckConfig {
    /// Completion endpoint and credentials
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<EndpointConfig>,

    /// Where history and scripts are kept
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage: Option<StorageConfig>,

    /// Defaults for new conversations
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chat: Option<ChatConfig>,

    /// Models offered in addition to the built-in catalog
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub models: Vec<ModelEntry>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logging: Option<LoggingConfig>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EndpointConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Sent as `Authorization: Bearer <token>`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_token: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dir: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    /// Script id loaded at startup.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub script: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelEntry {
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub max_limit: u32,
}

impl From<&ModelEntry> for ChatModel {
    fn from(entry: &ModelEntry) -> Self {
        let name = if entry.name.is_empty() {
            entry.id.clone()
        } else {
            entry.name.clone()
        };
        ChatModel::new(entry.id.clone(), name, entry.max_limit)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoggingConfig {
    /// `trace`, `debug`, `info`, `warn` or `error`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<String>,
    /// Directory for the rolling JSON log. No file log when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dir: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub console: Option<bool>,
}

impl ChatDeckConfig {
    pub fn endpoint_url(&self) -> &str {
        self.endpoint
            .as_ref()
            .and_then(|e| e.url.as_deref())
            .unwrap_or(DEFAULT_ENDPOINT_URL)
    }

    pub fn api_token(&self) -> &str {
        self.endpoint
            .as_ref()
            .and_then(|e| e.api_token.as_deref())
            .unwrap_or_default()
    }

    /// Storage directory; relative to `config_dir` when unset.
    pub fn storage_dir(&self, config_dir: &Path) -> PathBuf {
        self.storage
            .as_ref()
            .and_then(|s| s.dir.as_deref())
            .map(PathBuf::from)
            .unwrap_or_else(|| config_dir.join(DEFAULT_STORAGE_DIR_NAME))
    }

    pub fn system_message(&self) -> &str {
        self.chat
            .as_ref()
            .and_then(|c| c.system_message.as_deref())
            .unwrap_or(DEFAULT_SYSTEM_MESSAGE)
    }

    pub fn script_id(&self) -> Option<&str> {
        self.chat.as_ref().and_then(|c| c.script.as_deref())
    }

    pub fn log_level(&self) -> &str {
        self.logging
            .as_ref()
            .and_then(|l| l.level.as_deref())
            .unwrap_or(DEFAULT_LOG_LEVEL)
    }

    pub fn log_dir(&self) -> Option<PathBuf> {
        self.logging
            .as_ref()
            .and_then(|l| l.dir.as_deref())
            .map(PathBuf::from)
    }

    pub fn log_to_console(&self) -> bool {
        self.logging
            .as_ref()
            .and_then(|l| l.console)
            .unwrap_or(false)
    }

    /// Built-in models plus the configured ones. Configured entries replace
    /// built-ins with the same id.
    pub fn catalog(&self) -> ModelCatalog {
        ModelCatalog::builtin().with_models(self.models.iter().map(ChatModel::from))
    }

    /// Configuration for new conversations: the chosen model at half its
    /// limit, with the configured temperature.
    pub fn conversation_config(&self) -> chatdeck_core::Result<Configuration> {
        let catalog = self.catalog();
        let chat = self.chat.clone().unwrap_or_default();
        let model = chat.model.as_deref().unwrap_or(DEFAULT_MODEL);
        let base = catalog.default_config_for(model)?;
        let mut update = ConfigurationUpdate::default();
        update.temperature = chat.temperature;
        base.apply(&update, &catalog)
    }
}
