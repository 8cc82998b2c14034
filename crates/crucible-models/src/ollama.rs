//! Ollama model implementation.
//!
//! This module provides an implementation of the `Model` trait for Ollama's
//! local `/api/generate` endpoint. Requests are always sent with streaming
//! disabled so each call yields one complete response.

use async_trait::async_trait;
use crucible_abstraction::{Model, ModelError, ModelParameters, ModelResponse, ModelUsage};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

/// Default address of a locally running Ollama server.
pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";

/// Ollama model implementation.
#[derive(Debug, Clone)]
pub struct OllamaModel {
    /// The model ID (e.g., "llama2", "codellama:13b").
    model_id: String,
    /// The base URL for the Ollama API (default: "http://localhost:11434").
    base_url: String,
    /// HTTP client for making requests.
    client: Client,
}

impl OllamaModel {
    /// Creates a new `OllamaModel` with the given model ID.
    ///
    /// Uses the default Ollama server URL: `http://localhost:11434`
    #[must_use]
    pub fn new(model_id: String) -> Self {
        Self::with_base_url(model_id, DEFAULT_OLLAMA_URL.to_string())
    }

    /// Creates a new `OllamaModel` with a custom base URL.
    ///
    /// # Arguments
    /// * `model_id` - The Ollama model ID to use
    /// * `base_url` - The base URL for the Ollama API (e.g., "http://192.168.1.100:11434")
    #[must_use]
    pub fn with_base_url(model_id: String, base_url: String) -> Self {
        let base_url = base_url.trim_end_matches('/').to_string();
        Self { model_id, base_url, client: Client::new() }
    }

    /// Returns the base URL requests are sent to.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

// Ollama API request/response structures
#[derive(Serialize)]
struct OllamaGenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    options: Option<OllamaOptions>,
}

#[derive(Serialize)]
struct OllamaOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    num_predict: Option<u32>, // max_tokens equivalent
}

#[derive(Deserialize)]
struct OllamaResponse {
    #[serde(default)]
    response: String,
    prompt_eval_count: Option<u32>,
    eval_count: Option<u32>,
}

#[derive(Deserialize)]
struct OllamaError {
    error: String,
}

impl OllamaModel {
    /// Build OllamaOptions from ModelParameters
    fn build_options(parameters: Option<ModelParameters>) -> Option<OllamaOptions> {
        parameters.map(|p| OllamaOptions { temperature: p.temperature, num_predict: p.max_tokens })
    }

    fn not_found(&self) -> ModelError {
        ModelError::ModelResponseError(format!(
            "Model '{}' not found. Pull it with 'ollama pull {}'.",
            self.model_id, self.model_id
        ))
    }
}

#[async_trait]
impl Model for OllamaModel {
    async fn generate_text(
        &self,
        prompt: &str,
        parameters: Option<ModelParameters>,
    ) -> Result<ModelResponse, ModelError> {
        debug!(
            model_id = %self.model_id,
            prompt_len = prompt.len(),
            parameters = ?parameters,
            "OllamaModel generating text"
        );

        let url = format!("{}/api/generate", self.base_url);

        let request_body = OllamaGenerateRequest {
            model: &self.model_id,
            prompt,
            stream: false,
            options: Self::build_options(parameters),
        };

        let response = self.client.post(&url).json(&request_body).send().await.map_err(|e| {
            error!(error = %e, base_url = %self.base_url, "Failed to connect to Ollama");
            if e.is_connect() {
                ModelError::RequestError(format!(
                    "Ollama server not reachable at {}. Start it with 'ollama serve'.",
                    self.base_url
                ))
            } else {
                ModelError::RequestError(format!("Network error: {}", e))
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_else(|_| "Unknown error".to_string());
            error!(
                status = %status,
                error = %error_text,
                "Ollama API returned error status"
            );

            if let Ok(error_json) = serde_json::from_str::<OllamaError>(&error_text) {
                if error_json.error.contains("model") && error_json.error.contains("not found") {
                    return Err(self.not_found());
                }
                if error_json.error.contains("out of memory") || error_json.error.contains("OOM") {
                    return Err(ModelError::ModelResponseError(
                        "Insufficient memory to load model. Try a smaller variant.".to_string(),
                    ));
                }
            }

            if status == reqwest::StatusCode::NOT_FOUND {
                return Err(self.not_found());
            }

            return Err(ModelError::ModelResponseError(format!(
                "API error ({}): {}",
                status, error_text
            )));
        }

        let ollama_response: OllamaResponse = response.json().await.map_err(|e| {
            error!(error = %e, "Failed to parse Ollama API response");
            ModelError::SerializationError(format!("Failed to parse response: {}", e))
        })?;

        let prompt_tokens = ollama_response.prompt_eval_count.unwrap_or(0);
        let completion_tokens = ollama_response.eval_count.unwrap_or(0);

        Ok(ModelResponse {
            content: ollama_response.response,
            model_id: Some(self.model_id.clone()),
            usage: Some(ModelUsage {
                prompt_tokens,
                completion_tokens,
                total_tokens: prompt_tokens + completion_tokens,
            }),
        })
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }
}
