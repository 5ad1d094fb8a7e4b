//! Config validation with path-qualified messages.

use std::collections::HashSet;

use crate::schema::ChatDeckConfig;
use thiserror::Error;

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

#[derive(Debug, Error)]
#[error("Config validation error at '{path}': {message}")]
pub struct ConfigValidationError {
    pub path: String,
    pub message: String,
}

/// All errors and warnings found in one pass.
#[derive(Debug, Default)]
pub struct ValidationReport {
    pub errors: Vec<ConfigValidationError>,
    pub warnings: Vec<ConfigValidationError>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    fn error(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.errors.push(ConfigValidationError {
            path: path.into(),
            message: message.into(),
        });
    }

    fn warn(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.warnings.push(ConfigValidationError {
            path: path.into(),
            message: message.into(),
        });
    }
}

pub fn validate(config: &ChatDeckConfig) -> ValidationReport {
    let mut report = ValidationReport::default();
    validate_endpoint(config, &mut report);
    validate_models(config, &mut report);
    validate_chat(config, &mut report);
    validate_logging(config, &mut report);
    report
}

fn validate_endpoint(config: &ChatDeckConfig, report: &mut ValidationReport) {
    let url = config.endpoint_url();
    if !(url.starts_with("http://") || url.starts_with("https://")) {
        report.error("endpoint.url", format!("'{url}' is not an http(s) URL"));
    }
    if config.api_token().is_empty() {
        report.warn(
            "endpoint.apiToken",
            "No API token configured; the endpoint may reject requests",
        );
    }
}

fn validate_models(config: &ChatDeckConfig, report: &mut ValidationReport) {
    let mut seen = HashSet::new();
    for (i, model) in config.models.iter().enumerate() {
        let path = format!("models[{i}]");
        if model.id.trim().is_empty() {
            report.error(format!("{path}.id"), "Model id cannot be empty");
        }
        // New conversations get half the limit, which must stay positive.
        if model.max_limit < 2 {
            report.error(format!("{path}.maxLimit"), "maxLimit must be at least 2");
        }
        if !seen.insert(model.id.as_str()) {
            report.warn(
                format!("{path}.id"),
                format!("Duplicate model '{}'; the last entry wins", model.id),
            );
        }
    }
}

fn validate_chat(config: &ChatDeckConfig, report: &mut ValidationReport) {
    let Some(chat) = &config.chat else { return };
    if let Some(model) = &chat.model {
        if config.catalog().get(model).is_none() {
            report.error("chat.model", format!("Unknown model '{model}'"));
        }
    }
    if let Some(temperature) = chat.temperature {
        if !(0.0..=2.0).contains(&temperature) {
            report.error("chat.temperature", "temperature must be within [0, 2]");
        }
    }
}

fn validate_logging(config: &ChatDeckConfig, report: &mut ValidationReport) {
    let level = config.log_level();
    if !LOG_LEVELS.contains(&level.to_ascii_lowercase().as_str()) {
        report.error(
            "logging.level",
            format!("Unknown log level '{level}'. Use one of {}", LOG_LEVELS.join(", ")),
        );
    }
}
