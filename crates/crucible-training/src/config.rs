//! Pipeline configuration.
//!
//! A run is described by one pipeline file plus per-stage files that live
//! next to it:
//!
//! ```text
//! configs/
//!   pipeline.yml                 # train: { dataset, model, finetuning_method, output_dir }, backend: {...}
//!   datasets/<dataset>.yml
//!   models/<model>.yml
//!   finetune/<finetuning_method>.yml
//!   train/reinforcement.yml      # reinforcement: {...}
//!   train/adversarial.yml        # adversarial: {...}
//! ```
//!
//! Every stage section has defaults; only the dataset name, the model name
//! and the model identifier are required. `PipelineConfig::validate` rejects
//! a configuration before any stage runs.

use crate::error::{TrainingError, TrainingResult};
use crucible_abstraction::ModelParameters;
use crucible_models::{ModelType, DEFAULT_OLLAMA_URL};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Default location of the pipeline file.
pub const DEFAULT_PIPELINE_CONFIG: &str = "configs/pipeline.yml";

fn default_batch_size() -> usize {
    4
}

fn default_epochs() -> u32 {
    3
}

fn default_num_samples() -> usize {
    32
}

fn default_n_splits() -> usize {
    5
}

fn default_dataset_path() -> PathBuf {
    PathBuf::from("./data/medical.jsonl")
}

fn default_split() -> String {
    "train".to_string()
}

fn default_outputs_dir() -> PathBuf {
    PathBuf::from("./outputs")
}

fn default_adversarial_dir() -> PathBuf {
    PathBuf::from("./adversarial_outputs")
}

fn default_base_url() -> String {
    DEFAULT_OLLAMA_URL.to_string()
}

/// `train:` section of the pipeline file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainSection {
    /// Name of the dataset file under `datasets/`.
    #[serde(default)]
    pub dataset: Option<String>,
    /// Name of the model file under `models/`.
    #[serde(default)]
    pub model: Option<String>,
    /// Name of the finetune file under `finetune/` (e.g. `lora`, `qlora`, `sft`).
    #[serde(default)]
    pub finetuning_method: Option<String>,
    #[serde(default = "default_outputs_dir")]
    pub output_dir: PathBuf,
}

impl Default for TrainSection {
    fn default() -> Self {
        Self { dataset: None, model: None, finetuning_method: None, output_dir: default_outputs_dir() }
    }
}

/// Which inference backend serves the model identifiers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackendConfig {
    #[serde(rename = "type", default)]
    pub model_type: ModelType,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Sampling temperature sent with every request. Backend default when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self { model_type: ModelType::default(), base_url: default_base_url(), temperature: None, max_tokens: None }
    }
}

impl BackendConfig {
    /// Generation parameters for every backend call, if any are configured.
    #[must_use]
    pub fn parameters(&self) -> Option<ModelParameters> {
        if self.temperature.is_none() && self.max_tokens.is_none() {
            return None;
        }
        Some(ModelParameters { temperature: self.temperature, max_tokens: self.max_tokens })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetConfig {
    #[serde(default = "default_dataset_path")]
    pub path: PathBuf,
    #[serde(default = "default_split")]
    pub split: String,
    #[serde(default)]
    pub cross_validation: bool,
    #[serde(default = "default_n_splits")]
    pub n_splits: usize,
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self {
            path: default_dataset_path(),
            split: default_split(),
            cross_validation: false,
            n_splits: default_n_splits(),
        }
    }
}

/// Model file. Either key may carry the backend identifier.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelSection {
    #[serde(default)]
    pub model_name: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
}

impl ModelSection {
    #[must_use]
    pub fn identifier(&self) -> Option<&str> {
        non_blank(self.model_name.as_deref()).or_else(|| non_blank(self.model.as_deref()))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinetuneConfig {
    #[serde(default = "default_outputs_dir")]
    pub output_dir: PathBuf,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Adapter settings. Only the key's presence matters, so `lora:` with no
    /// value still counts: the backend cannot train adapters.
    #[serde(default, deserialize_with = "present_key", skip_serializing_if = "Option::is_none")]
    pub lora: Option<serde_yaml::Value>,
    #[serde(default, deserialize_with = "present_key", skip_serializing_if = "Option::is_none")]
    pub qlora: Option<serde_yaml::Value>,
}

impl Default for FinetuneConfig {
    fn default() -> Self {
        Self { output_dir: default_outputs_dir(), batch_size: default_batch_size(), lora: None, qlora: None }
    }
}

impl FinetuneConfig {
    #[must_use]
    pub fn requests_adapter(&self) -> bool {
        self.lora.is_some() || self.qlora.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReinforcementConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_num_samples")]
    pub num_samples: usize,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

impl Default for ReinforcementConfig {
    fn default() -> Self {
        Self { enabled: false, num_samples: default_num_samples(), batch_size: default_batch_size() }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdversarialConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_epochs")]
    pub epochs: u32,
    #[serde(default = "default_adversarial_dir")]
    pub output_dir: PathBuf,
    /// Defaults to the base model when absent.
    #[serde(default)]
    pub generator_model: Option<String>,
    #[serde(default)]
    pub discriminator_model: Option<String>,
    /// Fixes the per-epoch shuffles. Drawn from OS entropy when absent.
    #[serde(default)]
    pub seed: Option<u64>,
}

impl Default for AdversarialConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            batch_size: default_batch_size(),
            epochs: default_epochs(),
            output_dir: default_adversarial_dir(),
            generator_model: None,
            discriminator_model: None,
            seed: None,
        }
    }
}

impl AdversarialConfig {
    pub fn validate(&self) -> TrainingResult<()> {
        if self.batch_size == 0 {
            return Err(TrainingError::Config("adversarial.batch_size must be >= 1".to_string()));
        }
        if self.epochs == 0 {
            return Err(TrainingError::Config("adversarial.epochs must be >= 1".to_string()));
        }
        Ok(())
    }
}

/// The merged view of every configuration file for one run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub train: TrainSection,
    pub backend: BackendConfig,
    pub dataset: DatasetConfig,
    pub model: ModelSection,
    pub finetune: FinetuneConfig,
    pub reinforcement: ReinforcementConfig,
    pub adversarial: AdversarialConfig,
}

impl PipelineConfig {
    /// Identifier of the base model.
    #[must_use]
    pub fn model_identifier(&self) -> Option<&str> {
        self.model.identifier()
    }

    #[must_use]
    pub fn generator_model(&self) -> Option<&str> {
        non_blank(self.adversarial.generator_model.as_deref()).or_else(|| self.model_identifier())
    }

    #[must_use]
    pub fn discriminator_model(&self) -> Option<&str> {
        non_blank(self.adversarial.discriminator_model.as_deref())
    }

    /// `finetuning_method` names an adapter method, or the finetune file configures one.
    #[must_use]
    pub fn requests_adapter(&self) -> bool {
        let method = self.train.finetuning_method.as_deref().unwrap_or_default().to_lowercase();
        matches!(method.as_str(), "lora" | "qlora") || self.finetune.requests_adapter()
    }

    pub fn validate(&self) -> TrainingResult<()> {
        if self.model_identifier().is_none() {
            return Err(TrainingError::Config("model_name missing in model config".to_string()));
        }
        if self.dataset.split != "train" {
            return Err(TrainingError::Config(format!(
                "dataset split '{}' is not available for a local jsonl dataset (only 'train')",
                self.dataset.split
            )));
        }
        if self.dataset.cross_validation && self.dataset.n_splits < 2 {
            return Err(TrainingError::Config(format!(
                "dataset.n_splits must be >= 2 for cross validation, got {}",
                self.dataset.n_splits
            )));
        }
        if self.finetune.batch_size == 0 {
            return Err(TrainingError::Config("finetune.batch_size must be >= 1".to_string()));
        }
        if self.reinforcement.enabled && self.reinforcement.batch_size == 0 {
            return Err(TrainingError::Config("reinforcement.batch_size must be >= 1".to_string()));
        }
        if self.adversarial.enabled {
            self.adversarial.validate()?;
            if self.discriminator_model().is_none() {
                return Err(TrainingError::Config(
                    "adversarial.discriminator_model is required when the adversarial stage is enabled"
                        .to_string(),
                ));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Default, Deserialize)]
struct PipelineFile {
    #[serde(default)]
    train: TrainSection,
    #[serde(default)]
    backend: BackendConfig,
}

#[derive(Debug, Default, Deserialize)]
struct ReinforcementFile {
    #[serde(default)]
    reinforcement: ReinforcementConfig,
}

#[derive(Debug, Default, Deserialize)]
struct AdversarialFile {
    #[serde(default)]
    adversarial: AdversarialConfig,
}

/// Load the pipeline file at `pipeline_path` and merge the stage files it names.
///
/// The returned configuration has already passed `PipelineConfig::validate`.
pub fn load_config(pipeline_path: &Path) -> TrainingResult<PipelineConfig> {
    if !pipeline_path.exists() {
        return Err(TrainingError::Config(format!(
            "config file not found: {}",
            pipeline_path.display()
        )));
    }
    let root = pipeline_path.parent().unwrap_or_else(|| Path::new("."));

    let pipeline: PipelineFile = read_yaml(pipeline_path)?;
    let dataset_name = required(pipeline.train.dataset.as_deref(), "train.dataset")?;
    let model_name = required(pipeline.train.model.as_deref(), "train.model")?;

    let dataset: DatasetConfig = read_yaml(&root.join("datasets").join(format!("{dataset_name}.yml")))?;
    let model: ModelSection = read_yaml(&root.join("models").join(format!("{model_name}.yml")))?;
    let finetune = match non_blank(pipeline.train.finetuning_method.as_deref()) {
        Some(method) => read_yaml(&root.join("finetune").join(format!("{method}.yml")))?,
        None => FinetuneConfig::default(),
    };
    let reinforcement = read_optional_yaml::<ReinforcementFile>(&root.join("train").join("reinforcement.yml"))?
        .unwrap_or_default()
        .reinforcement;
    let adversarial = read_optional_yaml::<AdversarialFile>(&root.join("train").join("adversarial.yml"))?
        .unwrap_or_default()
        .adversarial;

    let config = PipelineConfig {
        train: pipeline.train,
        backend: pipeline.backend,
        dataset,
        model,
        finetune,
        reinforcement,
        adversarial,
    };
    config.validate()?;
    Ok(config)
}

/// `Some` for any value the key carries, null included. An absent key falls
/// back to `#[serde(default)]` and stays `None`.
fn present_key<'de, D>(deserializer: D) -> Result<Option<serde_yaml::Value>, D::Error>
where
    D: Deserializer<'de>,
{
    serde_yaml::Value::deserialize(deserializer).map(Some)
}

fn required<'a>(value: Option<&'a str>, key: &str) -> TrainingResult<&'a str> {
    non_blank(value).ok_or_else(|| TrainingError::Config(format!("{key} is required")))
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn read_yaml<T: DeserializeOwned>(path: &Path) -> TrainingResult<T> {
    debug!(path = %path.display(), "reading config file");
    let contents = std::fs::read_to_string(path)
        .map_err(|e| TrainingError::Config(format!("failed to read {}: {e}", path.display())))?;
    // An empty document means "all defaults".
    let contents = if contents.trim().is_empty() { "{}" } else { contents.as_str() };
    serde_yaml::from_str(contents)
        .map_err(|e| TrainingError::Config(format!("failed to parse {}: {e}", path.display())))
}

fn read_optional_yaml<T: DeserializeOwned>(path: &Path) -> TrainingResult<Option<T>> {
    if !path.exists() {
        debug!(path = %path.display(), "optional config file absent, using defaults");
        return Ok(None);
    }
    read_yaml(path).map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(root: &Path, rel: &str, contents: &str) {
        let path = root.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, contents).unwrap();
    }

    fn minimal_tree(root: &Path) {
        write(root, "pipeline.yml", "train:\n  dataset: medical\n  model: llama\n");
        write(root, "datasets/medical.yml", "path: ./data/medical.jsonl\n");
        write(root, "models/llama.yml", "model_name: llama3\n");
    }

    #[test]
    fn test_load_minimal_config_uses_defaults() {
        let temp = TempDir::new().unwrap();
        minimal_tree(temp.path());

        let config = load_config(&temp.path().join("pipeline.yml")).unwrap();

        assert_eq!(config, load_config(&temp.path().join("pipeline.yml")).unwrap());
        assert_eq!(config.train.dataset.as_deref(), Some("medical"));
        assert_eq!(config.model_identifier(), Some("llama3"));
        assert_eq!(config.backend, BackendConfig::default());
        assert_eq!(config.finetune, FinetuneConfig::default());
        assert!(!config.reinforcement.enabled);
        assert_eq!(config.reinforcement.num_samples, 32);
        assert!(!config.adversarial.enabled);
        assert_eq!(config.adversarial.batch_size, 4);
        assert_eq!(config.adversarial.epochs, 3);
        assert_eq!(config.adversarial.output_dir, PathBuf::from("./adversarial_outputs"));
        assert_eq!(config.train.output_dir, PathBuf::from("./outputs"));
    }

    #[test]
    fn test_load_merges_stage_files() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        write(
            root,
            "pipeline.yml",
            "train:\n  dataset: medical\n  model: llama\n  finetuning_method: lora\nbackend:\n  type: mock\n",
        );
        write(root, "datasets/medical.yml", "path: data.jsonl\ncross_validation: true\nn_splits: 3\n");
        write(root, "models/llama.yml", "model: llama3:8b\n");
        write(root, "finetune/lora.yml", "batch_size: 2\noutput_dir: ./ft\nlora:\n  r: 8\n");
        write(root, "train/reinforcement.yml", "reinforcement:\n  enabled: true\n  num_samples: 5\n");
        write(
            root,
            "train/adversarial.yml",
            "adversarial:\n  enabled: true\n  epochs: 2\n  discriminator_model: judge\n  seed: 7\n",
        );

        let config = load_config(&root.join("pipeline.yml")).unwrap();

        assert_eq!(config.backend.model_type, ModelType::Mock);
        assert_eq!(config.dataset.n_splits, 3);
        assert!(config.dataset.cross_validation);
        assert_eq!(config.model_identifier(), Some("llama3:8b"));
        assert_eq!(config.finetune.batch_size, 2);
        assert!(config.requests_adapter());
        assert!(config.reinforcement.enabled);
        assert_eq!(config.reinforcement.num_samples, 5);
        assert_eq!(config.adversarial.epochs, 2);
        assert_eq!(config.adversarial.seed, Some(7));
        assert_eq!(config.generator_model(), Some("llama3:8b"));
        assert_eq!(config.discriminator_model(), Some("judge"));
    }

    #[test]
    fn test_missing_pipeline_file() {
        let temp = TempDir::new().unwrap();
        let err = load_config(&temp.path().join("pipeline.yml")).unwrap_err();
        assert!(matches!(err, TrainingError::Config(msg) if msg.contains("not found")));
    }

    #[test]
    fn test_missing_dataset_key_is_fatal() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "pipeline.yml", "train:\n  model: llama\n");
        let err = load_config(&temp.path().join("pipeline.yml")).unwrap_err();
        assert!(matches!(err, TrainingError::Config(msg) if msg.contains("train.dataset")));
    }

    #[test]
    fn test_missing_model_identifier_is_fatal() {
        let temp = TempDir::new().unwrap();
        minimal_tree(temp.path());
        write(temp.path(), "models/llama.yml", "temperature: 0.2\n");

        let err = load_config(&temp.path().join("pipeline.yml")).unwrap_err();
        assert!(matches!(err, TrainingError::Config(msg) if msg.contains("model_name")));
    }

    #[test]
    fn test_named_finetune_file_must_exist() {
        let temp = TempDir::new().unwrap();
        minimal_tree(temp.path());
        write(temp.path(), "pipeline.yml", "train:\n  dataset: medical\n  model: llama\n  finetuning_method: sft\n");

        let err = load_config(&temp.path().join("pipeline.yml")).unwrap_err();
        assert!(matches!(err, TrainingError::Config(msg) if msg.contains("sft.yml")));
    }

    #[test]
    fn test_empty_stage_file_means_defaults() {
        let temp = TempDir::new().unwrap();
        minimal_tree(temp.path());
        write(temp.path(), "train/adversarial.yml", "");

        let config = load_config(&temp.path().join("pipeline.yml")).unwrap();
        assert_eq!(config.adversarial, AdversarialConfig::default());
    }

    #[test]
    fn test_enabled_adversarial_requires_discriminator() {
        let mut config = PipelineConfig::default();
        config.model.model_name = Some("llama3".to_string());
        config.adversarial.enabled = true;

        assert!(config.validate().is_err());

        config.adversarial.discriminator_model = Some("judge".to_string());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_disabled_adversarial_ignores_bad_values() {
        let mut config = PipelineConfig::default();
        config.model.model_name = Some("llama3".to_string());
        config.adversarial.epochs = 0;
        assert!(config.validate().is_ok());

        config.adversarial.enabled = true;
        config.adversarial.discriminator_model = Some("judge".to_string());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_cross_validation_needs_two_splits() {
        let mut config = PipelineConfig::default();
        config.model.model_name = Some("llama3".to_string());
        config.dataset.cross_validation = true;
        config.dataset.n_splits = 1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_unknown_split_rejected() {
        let mut config = PipelineConfig::default();
        config.model.model_name = Some("llama3".to_string());
        config.dataset.split = "validation".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_blank_generator_falls_back_to_base_model() {
        let mut config = PipelineConfig::default();
        config.model.model = Some("base".to_string());
        config.adversarial.generator_model = Some("  ".to_string());
        assert_eq!(config.generator_model(), Some("base"));
    }

    #[test]
    fn test_bare_adapter_key_requests_adapter() {
        for body in ["lora:\n", "lora: ~\n", "batch_size: 2\nqlora: null\n"] {
            let temp = TempDir::new().unwrap();
            minimal_tree(temp.path());
            write(temp.path(), "pipeline.yml", "train:\n  dataset: medical\n  model: llama\n  finetuning_method: sft\n");
            write(temp.path(), "finetune/sft.yml", body);

            let config = load_config(&temp.path().join("pipeline.yml")).unwrap();
            assert!(config.finetune.requests_adapter(), "finetune file {body:?}");
        }
    }

    #[test]
    fn test_finetune_without_adapter_key() {
        let temp = TempDir::new().unwrap();
        minimal_tree(temp.path());
        write(temp.path(), "pipeline.yml", "train:\n  dataset: medical\n  model: llama\n  finetuning_method: sft\n");
        write(temp.path(), "finetune/sft.yml", "batch_size: 2\n");

        let config = load_config(&temp.path().join("pipeline.yml")).unwrap();
        assert!(!config.requests_adapter());
    }

    #[test]
    fn test_backend_generation_parameters() {
        let temp = TempDir::new().unwrap();
        minimal_tree(temp.path());
        write(
            temp.path(),
            "pipeline.yml",
            "train:\n  dataset: medical\n  model: llama\nbackend:\n  type: mock\n  temperature: 0.25\n  max_tokens: 64\n",
        );

        let config = load_config(&temp.path().join("pipeline.yml")).unwrap();
        assert_eq!(
            config.backend.parameters(),
            Some(ModelParameters { temperature: Some(0.25), max_tokens: Some(64) })
        );
        assert_eq!(BackendConfig::default().parameters(), None);
    }
}
