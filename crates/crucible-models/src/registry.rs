//! Caching model provider.

use crate::factory::{ModelConfig, ModelFactory, ModelType};
use crucible_abstraction::{Model, ModelError, ModelProvider};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Creates models through `ModelFactory` on first use and hands out the same
/// instance for every later request with the same identifier.
pub struct ModelRegistry {
    model_type: ModelType,
    base_url: Option<String>,
    models: Mutex<HashMap<String, Arc<dyn Model>>>,
}

impl ModelRegistry {
    #[must_use]
    pub fn new(model_type: ModelType, base_url: Option<String>) -> Self {
        Self { model_type, base_url, models: Mutex::new(HashMap::new()) }
    }
}

impl ModelProvider for ModelRegistry {
    fn model(&self, model_id: &str) -> Result<Arc<dyn Model>, ModelError> {
        let mut models = self
            .models
            .lock()
            .map_err(|_| ModelError::Other("model registry lock poisoned".to_string()))?;

        if let Some(model) = models.get(model_id) {
            return Ok(Arc::clone(model));
        }

        let mut config = ModelConfig::new(self.model_type, model_id.to_string());
        if let Some(base_url) = &self.base_url {
            config = config.with_base_url(base_url.clone());
        }
        let model = ModelFactory::create(config)?;
        models.insert(model_id.to_string(), Arc::clone(&model));
        Ok(model)
    }
}
