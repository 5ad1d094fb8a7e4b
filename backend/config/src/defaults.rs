//! Config defaults applied after env substitution.

use std::path::Path;

use crate::schema::{ChatDeckConfig, EndpointConfig, LoggingConfig, StorageConfig};

/// Completion endpoint used when none is configured.
pub const DEFAULT_ENDPOINT_URL: &str = "http://localhost:3000/api/completion";

/// Storage directory name inside the config directory.
pub const DEFAULT_STORAGE_DIR_NAME: &str = "storage";

pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Apply all defaults to a freshly loaded config.
pub fn apply_all_defaults(config: ChatDeckConfig, config_dir: &Path) -> ChatDeckConfig {
    let config = apply_endpoint_defaults(config);
    let config = apply_storage_defaults(config, config_dir);
    apply_logging_defaults(config)
}

fn apply_endpoint_defaults(mut config: ChatDeckConfig) -> ChatDeckConfig {
    let endpoint = config.endpoint.get_or_insert_with(EndpointConfig::default);
    if endpoint.url.as_deref().map(str::is_empty).unwrap_or(true) {
        endpoint.url = Some(DEFAULT_ENDPOINT_URL.to_string());
    }
    config
}

fn apply_storage_defaults(mut config: ChatDeckConfig, config_dir: &Path) -> ChatDeckConfig {
    let storage = config.storage.get_or_insert_with(StorageConfig::default);
    if storage.dir.is_none() {
        storage.dir = Some(
            config_dir
                .join(DEFAULT_STORAGE_DIR_NAME)
                .to_string_lossy()
                .into_owned(),
        );
    }
    config
}

fn apply_logging_defaults(mut config: ChatDeckConfig) -> ChatDeckConfig {
    let logging = config.logging.get_or_insert_with(LoggingConfig::default);
    if logging.level.is_none() {
        logging.level = Some(DEFAULT_LOG_LEVEL.to_string());
    }
    config
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fills_endpoint_storage_and_level() {
        let cfg = apply_all_defaults(ChatDeckConfig::default(), Path::new("/home/u/.chatdeck"));
        assert_eq!(cfg.endpoint.unwrap().url.unwrap(), DEFAULT_ENDPOINT_URL);
        assert_eq!(
            cfg.storage.unwrap().dir.unwrap(),
            "/home/u/.chatdeck/storage"
        );
        assert_eq!(cfg.logging.unwrap().level.unwrap(), "info");
    }

    #[test]
    fn does_not_override_user_values() {
        let cfg = ChatDeckConfig {
            endpoint: Some(EndpointConfig {
                url: Some("https://example.com/api".into()),
                api_token: None,
            }),
            logging: Some(LoggingConfig {
                level: Some("debug".into()),
                ..Default::default()
            }),
            ..Default::default()
        };
        let cfg = apply_all_defaults(cfg, Path::new("/x"));
        assert_eq!(cfg.endpoint_url(), "https://example.com/api");
        assert_eq!(cfg.log_level(), "debug");
    }
}
