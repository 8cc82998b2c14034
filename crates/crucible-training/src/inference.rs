//! The single boundary between the pipeline and the generation backend.
//!
//! `InferenceClient::generate` never fails: backend and provider errors come
//! back as `Generation::Failure` and are logged with the model identifier.
//! Callers decide what a failure means; the stages treat it as empty text.

use crucible_abstraction::{ModelParameters, ModelProvider};
use std::sync::Arc;
use tracing::{debug, warn};

/// Outcome of one generation call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Generation {
    Success(String),
    Failure(String),
}

impl Generation {
    #[must_use]
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failure(_))
    }

    /// The generated text, or an empty string for a failed call.
    #[must_use]
    pub fn into_text(self) -> String {
        match self {
            Self::Success(text) => text,
            Self::Failure(_) => String::new(),
        }
    }
}

#[derive(Clone)]
pub struct InferenceClient {
    provider: Arc<dyn ModelProvider>,
    parameters: Option<ModelParameters>,
}

impl InferenceClient {
    #[must_use]
    pub fn new(provider: Arc<dyn ModelProvider>) -> Self {
        Self { provider, parameters: None }
    }

    #[must_use]
    pub fn with_parameters(mut self, parameters: ModelParameters) -> Self {
        self.parameters = Some(parameters);
        self
    }

    /// Issue one blocking, non-streaming generation request.
    pub async fn generate(&self, model_id: &str, prompt: &str) -> Generation {
        let model = match self.provider.model(model_id) {
            Ok(model) => model,
            Err(e) => {
                warn!(model = %model_id, error = %e, "failed to resolve model");
                return Generation::Failure(e.to_string());
            }
        };

        match model.generate_text(prompt, self.parameters.clone()).await {
            Ok(response) => {
                debug!(model = %model_id, generated_len = response.content.len(), "generation succeeded");
                Generation::Success(response.content)
            }
            Err(e) => {
                warn!(model = %model_id, error = %e, "generation failed");
                Generation::Failure(e.to_string())
            }
        }
    }
}
