//! Wiring from the loaded config to stores, transport and orchestrator.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context as _, Result};
use chatdeck_config::{config_dir, config_file_path, load_and_prepare, ChatDeckConfig};
use chatdeck_core::CompletionTransport;
use chatdeck_orchestrator::{ChatOrchestrator, OrchestratorOptions};
use chatdeck_store::{FileStorage, HistoryStore, KeyValueStorage, ScriptStore, SCRIPT_DEFAULT_ID};
use chatdeck_transport::{HttpTransport, MockTransport};
use tracing::{debug, info};

pub struct AppContext {
    pub config: ChatDeckConfig,
    pub config_path: PathBuf,
    pub storage_dir: PathBuf,
    storage: Arc<dyn KeyValueStorage>,
}

impl AppContext {
    /// Load the config at `path`, or the default location.
    pub async fn load(path: Option<PathBuf>) -> Result<Self> {
        let config_path = path.unwrap_or_else(|| config_file_path(&config_dir()));
        let config = load_and_prepare(&config_path)
            .await
            .with_context(|| format!("Failed to load config from {}", config_path.display()))?;
        Ok(Self::from_config(config, config_path))
    }

    pub fn from_config(config: ChatDeckConfig, config_path: PathBuf) -> Self {
        let base = config_path.parent().unwrap_or_else(|| Path::new("."));
        let storage_dir = config.storage_dir(base);
        let storage: Arc<dyn KeyValueStorage> = Arc::new(FileStorage::new(storage_dir.clone()));
        Self {
            config,
            config_path,
            storage_dir,
            storage,
        }
    }

    pub fn history(&self) -> HistoryStore {
        HistoryStore::new(self.storage.clone())
    }

    pub fn scripts(&self) -> ScriptStore {
        ScriptStore::new(self.storage.clone())
    }

    fn transport(&self, offline: bool) -> Arc<dyn CompletionTransport> {
        if offline {
            debug!("Using offline mock transport");
            Arc::new(MockTransport::new())
        } else {
            Arc::new(HttpTransport::new(self.config.endpoint_url()))
        }
    }

    /// Build and initialize an orchestrator.
    pub async fn orchestrator(
        &self,
        offline: bool,
        script_id: Option<&str>,
    ) -> Result<Arc<ChatOrchestrator>> {
        let options = OrchestratorOptions {
            system_message: self.config.system_message().to_string(),
            config: self.config.conversation_config()?,
            token: self.config.api_token().to_string(),
            script_id: script_id
                .or(self.config.script_id())
                .unwrap_or(SCRIPT_DEFAULT_ID)
                .to_string(),
        };
        let transport = self.transport(offline);
        info!(
            transport = transport.name(),
            storage = %self.storage_dir.display(),
            model = %options.config.model,
            "Starting chat orchestrator"
        );

        let orchestrator = Arc::new(ChatOrchestrator::new(
            self.history(),
            self.scripts(),
            transport,
            self.config.catalog(),
            options,
        ));
        orchestrator.init().await;
        Ok(orchestrator)
    }
}
