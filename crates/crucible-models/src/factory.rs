//! Model factory for creating model instances from configuration.

use crate::{MockModel, OllamaModel};
use crucible_abstraction::{Model, ModelError};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Arc;
use tracing::debug;

/// Model type enumeration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelType {
    /// Mock model that echoes its prompt.
    Mock,
    /// Ollama local model.
    #[default]
    Ollama,
}

impl FromStr for ModelType {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "mock" => Ok(Self::Mock),
            "ollama" => Ok(Self::Ollama),
            other => Err(ModelError::UnsupportedModelProvider(other.to_string())),
        }
    }
}

/// Model configuration.
#[derive(Debug, Clone)]
pub struct ModelConfig {
    /// The type of model to create.
    pub model_type: ModelType,
    /// The model ID (e.g., "llama3", "mistral:7b").
    pub model_id: String,
    /// Optional base URL override for HTTP backends.
    pub base_url: Option<String>,
}

impl ModelConfig {
    /// Creates a new `ModelConfig` with the given type and model ID.
    #[must_use]
    pub fn new(model_type: ModelType, model_id: String) -> Self {
        Self { model_type, model_id, base_url: None }
    }

    /// Sets the base URL for this configuration.
    #[must_use]
    pub fn with_base_url(mut self, base_url: String) -> Self {
        self.base_url = Some(base_url);
        self
    }
}

/// Factory for creating model instances.
pub struct ModelFactory;

impl ModelFactory {
    /// Creates a model instance from the given configuration.
    ///
    /// # Errors
    /// Returns a `ModelError` if the model identifier is blank.
    pub fn create(config: ModelConfig) -> Result<Arc<dyn Model>, ModelError> {
        debug!(
            model_type = ?config.model_type,
            model_id = %config.model_id,
            "Creating model instance"
        );

        if config.model_id.trim().is_empty() {
            return Err(ModelError::Other("model identifier must not be empty".to_string()));
        }

        match config.model_type {
            ModelType::Mock => Ok(Arc::new(MockModel::new(config.model_id))),
            ModelType::Ollama => {
                let model = match config.base_url {
                    Some(base_url) => OllamaModel::with_base_url(config.model_id, base_url),
                    None => OllamaModel::new(config.model_id),
                };
                Ok(Arc::new(model))
            }
        }
    }
}
