//! Model catalog and generation configuration.
//!
//! The catalog knows each model's maximum token limit; [`Configuration`]
//! updates are validated against it so `max_tokens` can never exceed what
//! the selected model accepts.

use serde::{Deserialize, Serialize};

use crate::error::{ChatError, Result};

/// Model used when nothing else is configured.
pub const DEFAULT_MODEL: &str = "gpt-3.5-turbo";

/// A completion model and its maximum token limit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatModel {
    pub id: String,
    pub name: String,
    pub max_limit: u32,
}

impl ChatModel {
    pub fn new(id: impl Into<String>, name: impl Into<String>, max_limit: u32) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            max_limit,
        }
    }

    /// Default `max_tokens` for this model: half of its limit.
    pub fn default_max_tokens(&self) -> u32 {
        self.max_limit / 2
    }
}

/// Registry of known models, looked up by id.
#[derive(Debug, Clone)]
pub struct ModelCatalog {
    models: Vec<ChatModel>,
}

impl ModelCatalog {
    /// Catalog holding only the built-in models.
    pub fn builtin() -> Self {
        Self {
            models: vec![
                ChatModel::new("gpt-3.5-turbo", "GPT-3.5", 4096),
                ChatModel::new("gpt-3.5-turbo-16k", "GPT-3.5 16k", 16384),
                ChatModel::new("gpt-4", "GPT-4", 8192),
                ChatModel::new("gpt-4-32k", "GPT-4 32k", 32768),
            ],
        }
    }

    /// Add a model, replacing any existing entry with the same id.
    pub fn register(&mut self, model: ChatModel) {
        match self.models.iter_mut().find(|m| m.id == model.id) {
            Some(existing) => *existing = model,
            None => self.models.push(model),
        }
    }

    pub fn with_models(mut self, models: impl IntoIterator<Item = ChatModel>) -> Self {
        for model in models {
            self.register(model);
        }
        self
    }

    pub fn get(&self, id: &str) -> Option<&ChatModel> {
        self.models.iter().find(|m| m.id == id)
    }

    /// Look up a model, failing with [`ChatError::UnknownModel`].
    pub fn require(&self, id: &str) -> Result<&ChatModel> {
        self.get(id).ok_or_else(|| ChatError::UnknownModel(id.to_string()))
    }

    pub fn list(&self) -> &[ChatModel] {
        &self.models
    }

    /// Default configuration for `model_id`.
    pub fn default_config_for(&self, model_id: &str) -> Result<Configuration> {
        let model = self.require(model_id)?;
        Ok(Configuration {
            model: model.id.clone(),
            max_tokens: model.default_max_tokens(),
            ..Configuration::default()
        })
    }
}

impl Default for ModelCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}

/// Model selection and generation parameters sent with every request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Configuration {
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub top_p: f32,
    pub frequency_penalty: f32,
    pub presence_penalty: f32,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            max_tokens: 2048,
            temperature: 0.5,
            top_p: 1.0,
            frequency_penalty: 0.0,
            presence_penalty: 0.0,
        }
    }
}

/// Field-level partial update of a [`Configuration`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigurationUpdate {
    pub model: Option<String>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
    pub top_p: Option<f32>,
    pub frequency_penalty: Option<f32>,
    pub presence_penalty: Option<f32>,
}

impl ConfigurationUpdate {
    pub fn model(model: impl Into<String>) -> Self {
        Self {
            model: Some(model.into()),
            ..Default::default()
        }
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Update that sets every field of `config` explicitly.
    pub fn replace_with(config: &Configuration) -> Self {
        Self {
            model: Some(config.model.clone()),
            max_tokens: Some(config.max_tokens),
            temperature: Some(config.temperature),
            top_p: Some(config.top_p),
            frequency_penalty: Some(config.frequency_penalty),
            presence_penalty: Some(config.presence_penalty),
        }
    }
}

impl Configuration {
    /// Apply `update` and return the resulting configuration.
    ///
    /// Switching to a different model resets `max_tokens` to half of the new
    /// model's limit before the explicit fields of the same update are
    /// applied. `self` is left untouched when validation fails.
    pub fn apply(&self, update: &ConfigurationUpdate, catalog: &ModelCatalog) -> Result<Self> {
        let mut next = self.clone();

        if let Some(model_id) = &update.model {
            if *model_id != self.model {
                let model = catalog.require(model_id)?;
                next.model = model.id.clone();
                next.max_tokens = model.default_max_tokens();
            }
        }
        if let Some(max_tokens) = update.max_tokens {
            next.max_tokens = max_tokens;
        }
        if let Some(temperature) = update.temperature {
            next.temperature = temperature;
        }
        if let Some(top_p) = update.top_p {
            next.top_p = top_p;
        }
        if let Some(penalty) = update.frequency_penalty {
            next.frequency_penalty = penalty;
        }
        if let Some(penalty) = update.presence_penalty {
            next.presence_penalty = penalty;
        }

        next.validate(catalog)?;
        Ok(next)
    }

    /// Check every field against the catalog and the parameter ranges.
    pub fn validate(&self, catalog: &ModelCatalog) -> Result<()> {
        let model = catalog.require(&self.model)?;
        if self.max_tokens == 0 {
            return Err(ChatError::invalid("max_tokens", "must be at least 1"));
        }
        if self.max_tokens > model.max_limit {
            return Err(ChatError::invalid(
                "max_tokens",
                format!(
                    "{} exceeds the {} limit of {}",
                    self.max_tokens, model.id, model.max_limit
                ),
            ));
        }
        check_range("temperature", self.temperature, 0.0, 2.0)?;
        check_range("top_p", self.top_p, 0.0, 1.0)?;
        check_range("frequency_penalty", self.frequency_penalty, -2.0, 2.0)?;
        check_range("presence_penalty", self.presence_penalty, -2.0, 2.0)?;
        Ok(())
    }
}

fn check_range(field: &str, value: f32, min: f32, max: f32) -> Result<()> {
    if !(min..=max).contains(&value) {
        return Err(ChatError::invalid(
            field,
            format!("{value} is outside [{min}, {max}]"),
        ));
    }
    Ok(())
}
