//! Model implementations for Crucible.
//!
//! This crate provides concrete implementations of the `Model` trait.
//!
//! # Supported Providers
//!
//! - **Mock**: Echoes the prompt back; used for offline runs and tests
//! - **Ollama**: Local models via Ollama (no API key, local execution)

pub mod factory;
pub mod ollama;
pub mod registry;

use async_trait::async_trait;
use crucible_abstraction::{Model, ModelError, ModelParameters, ModelResponse, ModelUsage};
use tracing::debug;

pub use factory::{ModelConfig, ModelFactory, ModelType};
pub use ollama::{OllamaModel, DEFAULT_OLLAMA_URL};
pub use registry::ModelRegistry;

/// A mock implementation of the `Model` trait.
///
/// Returns the prompt unchanged, which makes a generator pass an identity
/// function and keeps pipeline runs deterministic without a backend.
#[derive(Debug, Default)]
pub struct MockModel {
    id: String,
}

impl MockModel {
    /// Creates a new `MockModel` with the given ID.
    #[must_use]
    pub const fn new(id: String) -> Self {
        Self { id }
    }
}

#[async_trait]
impl Model for MockModel {
    async fn generate_text(
        &self,
        prompt: &str,
        parameters: Option<ModelParameters>,
    ) -> Result<ModelResponse, ModelError> {
        debug!(
            model_id = %self.id,
            prompt_len = prompt.len(),
            parameters = ?parameters,
            "MockModel generating text"
        );

        let tokens = count_tokens(prompt);
        Ok(ModelResponse {
            content: prompt.to_string(),
            model_id: Some(self.id.clone()),
            usage: Some(ModelUsage {
                prompt_tokens: tokens,
                completion_tokens: tokens,
                total_tokens: tokens * 2,
            }),
        })
    }

    fn model_id(&self) -> &str {
        &self.id
    }
}

/// Count tokens in a string (simplified: word count).
fn count_tokens(text: &str) -> u32 {
    text.split_whitespace().count() as u32
}
