//! Model abstraction layer for Crucible.
//!
//! This module defines the core traits and types for talking to a
//! text-generation backend. Pipeline stages only ever see these types; the
//! concrete HTTP clients live in `crucible-models`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

/// Represents an error that can occur when interacting with a model backend.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ModelError {
    /// An error occurred during the API request (e.g., network issues, invalid request).
    #[error("Request Error: {0}")]
    RequestError(String),

    /// The backend returned an error (e.g., unknown model, out of memory).
    #[error("Model Response Error: {0}")]
    ModelResponseError(String),

    /// An error occurred during serialization or deserialization.
    #[error("Serialization Error: {0}")]
    SerializationError(String),

    /// The model provider is not supported or configured.
    #[error("Unsupported Model Provider: {0}")]
    UnsupportedModelProvider(String),

    /// Other unexpected errors.
    #[error("Other Model Error: {0}")]
    Other(String),
}

/// Parameters for controlling the model's generation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelParameters {
    /// Sampling temperature. `None` leaves the backend default in place.
    pub temperature: Option<f32>,

    /// The maximum number of tokens to generate.
    pub max_tokens: Option<u32>,
}

/// The response from a text generation call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelResponse {
    /// The generated content. Empty when the backend omitted it.
    pub content: String,

    /// Optional: The ID of the model used to generate the response.
    pub model_id: Option<String>,

    /// Optional: Usage statistics for the request.
    pub usage: Option<ModelUsage>,
}

/// Usage statistics for a model request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelUsage {
    /// Number of tokens in the prompt.
    pub prompt_tokens: u32,

    /// Number of tokens in the completion.
    pub completion_tokens: u32,

    /// Total number of tokens used.
    pub total_tokens: u32,
}

/// A trait for interacting with a single text-generation model.
///
/// All models must be `Send + Sync` so one instance can be shared by every
/// stage of a run.
#[async_trait]
pub trait Model: Send + Sync {
    /// Generates a text completion based on the given prompt.
    ///
    /// Implementations issue exactly one non-streaming request per call.
    ///
    /// # Errors
    /// Returns a `ModelError` if generation fails.
    async fn generate_text(
        &self,
        prompt: &str,
        parameters: Option<ModelParameters>,
    ) -> Result<ModelResponse, ModelError>;

    /// Returns the ID of the model.
    fn model_id(&self) -> &str;
}

/// Resolves model identifiers to model handles.
///
/// The pipeline addresses models by name only (generator, discriminator,
/// base model); a provider decides how a name becomes a `Model`.
pub trait ModelProvider: Send + Sync {
    /// Returns the model registered under `model_id`, creating it if needed.
    ///
    /// # Errors
    /// Returns a `ModelError` if the model cannot be created.
    fn model(&self, model_id: &str) -> Result<Arc<dyn Model>, ModelError>;
}
