//! Scripted backends for exercising stages without a server.

use async_trait::async_trait;
use crucible_abstraction::{Model, ModelError, ModelParameters, ModelProvider, ModelResponse};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

type Behavior = Box<dyn Fn(&str) -> Result<String, ModelError> + Send + Sync>;

pub struct ScriptedModel {
    id: String,
    behavior: Behavior,
    calls: Mutex<Vec<String>>,
    parameters: Mutex<Vec<Option<ModelParameters>>>,
}

#[async_trait]
impl Model for ScriptedModel {
    async fn generate_text(
        &self,
        prompt: &str,
        parameters: Option<ModelParameters>,
    ) -> Result<ModelResponse, ModelError> {
        self.calls.lock().unwrap().push(prompt.to_string());
        self.parameters.lock().unwrap().push(parameters);
        (self.behavior)(prompt).map(|content| ModelResponse {
            content,
            model_id: Some(self.id.clone()),
            usage: None,
        })
    }

    fn model_id(&self) -> &str {
        &self.id
    }
}

#[derive(Default)]
pub struct ScriptedProvider {
    models: HashMap<String, Arc<ScriptedModel>>,
}

impl ScriptedProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(
        mut self,
        id: &str,
        behavior: impl Fn(&str) -> Result<String, ModelError> + Send + Sync + 'static,
    ) -> Self {
        let model = ScriptedModel {
            id: id.to_string(),
            behavior: Box::new(behavior),
            calls: Mutex::new(Vec::new()),
            parameters: Mutex::new(Vec::new()),
        };
        self.models.insert(id.to_string(), Arc::new(model));
        self
    }

    /// Returns the prompt unchanged.
    pub fn echo(self, id: &str) -> Self {
        self.with(id, |prompt| Ok(prompt.to_string()))
    }

    /// Returns `text` for every prompt.
    pub fn constant(self, id: &str, text: &'static str) -> Self {
        self.with(id, move |_| Ok(text.to_string()))
    }

    /// Echoes, except for `bad_prompt`, which fails like an unreachable server.
    pub fn fail_on(self, id: &str, bad_prompt: &'static str) -> Self {
        self.with(id, move |prompt| {
            if prompt == bad_prompt {
                Err(ModelError::RequestError("connection reset".to_string()))
            } else {
                Ok(prompt.to_string())
            }
        })
    }

    pub fn calls(&self, id: &str) -> Vec<String> {
        self.models.get(id).map(|m| m.calls.lock().unwrap().clone()).unwrap_or_default()
    }

    /// Parameters received by `id`, one entry per call.
    pub fn parameters(&self, id: &str) -> Vec<Option<ModelParameters>> {
        self.models.get(id).map(|m| m.parameters.lock().unwrap().clone()).unwrap_or_default()
    }

    pub fn total_calls(&self) -> usize {
        self.models.values().map(|m| m.calls.lock().unwrap().len()).sum()
    }
}

impl ModelProvider for ScriptedProvider {
    fn model(&self, model_id: &str) -> Result<Arc<dyn Model>, ModelError> {
        self.models
            .get(model_id)
            .map(|m| Arc::clone(m) as Arc<dyn Model>)
            .ok_or_else(|| ModelError::UnsupportedModelProvider(format!("no scripted model '{model_id}'")))
    }
}
