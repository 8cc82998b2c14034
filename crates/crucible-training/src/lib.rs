//! Crucible Training
//!
//! Inference-only orchestration of a text-generation backend:
//! - Loading layered pipeline configuration (`PipelineConfig`)
//! - Reading jsonl datasets and k-fold splits
//! - Supervised inference, emulated reinforcement feedback and a
//!   generator/discriminator adversarial loop
//! - Writing per-batch reward artifacts
//!
//! No weights are updated anywhere in this crate.

pub mod adversarial;
pub mod artifacts;
pub mod config;
pub mod dataset;
pub mod error;
pub mod inference;
pub mod layout;
pub mod pipeline;
pub mod progress;
pub mod reinforcement;
pub mod reward;
pub mod supervised;

#[cfg(test)]
mod test_support;

pub use adversarial::{epoch_permutation, AdversarialLoop, AdversarialReport};
pub use artifacts::{read_batch_artifact, write_batch_artifact, GenerationResult, RewardedSample};
pub use config::{
    load_config, AdversarialConfig, BackendConfig, DatasetConfig, FinetuneConfig, ModelSection, PipelineConfig,
    ReinforcementConfig, TrainSection, DEFAULT_PIPELINE_CONFIG,
};
pub use dataset::{kfold, load_dataset, read_records, Dataset, Fold, Record};
pub use error::{TrainingError, TrainingResult};
pub use inference::{Generation, InferenceClient};
pub use layout::ArtifactLayout;
pub use pipeline::{Pipeline, PipelineOutcome, StageOutcome, StageStatus};
pub use progress::{ProgressEvent, ProgressSink, RecordingProgressSink, Stage, TracingProgressSink};
pub use reinforcement::{ReinforcementEmulator, ReinforcementReport};
pub use reward::{score, FALLBACK_REWARD};
pub use supervised::{SupervisedReport, SupervisedRunner};
