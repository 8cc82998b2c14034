//! Stage sequencing.
//!
//! ```text
//! load dataset -> load model -> [reinforcement] -> [adversarial] -> supervised -> done
//! ```
//!
//! Dataset and model loading are fatal: their error is returned and nothing
//! downstream runs. The remaining stages are independent; a failure is
//! reported, recorded in the outcome, and the run moves on.

use crate::adversarial::AdversarialLoop;
use crate::config::PipelineConfig;
use crate::dataset::{load_dataset, Dataset};
use crate::error::{TrainingError, TrainingResult};
use crate::inference::InferenceClient;
use crate::progress::{ProgressEvent, ProgressSink, Stage};
use crate::reinforcement::ReinforcementEmulator;
use crate::supervised::SupervisedRunner;
use crucible_abstraction::ModelProvider;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageStatus {
    Completed,
    Skipped,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageOutcome {
    pub stage: Stage,
    pub status: StageStatus,
}

#[derive(Debug, Clone, Default)]
pub struct PipelineOutcome {
    pub stages: Vec<StageOutcome>,
    pub output_dir: PathBuf,
}

impl PipelineOutcome {
    #[must_use]
    pub fn status(&self, stage: Stage) -> Option<&StageStatus> {
        self.stages.iter().find(|o| o.stage == stage).map(|o| &o.status)
    }

    #[must_use]
    pub fn failed_stages(&self) -> Vec<Stage> {
        self.stages
            .iter()
            .filter(|o| matches!(o.status, StageStatus::Failed(_)))
            .map(|o| o.stage)
            .collect()
    }
}

pub struct Pipeline {
    config: PipelineConfig,
    provider: Arc<dyn ModelProvider>,
    client: InferenceClient,
    progress: Arc<dyn ProgressSink>,
}

impl Pipeline {
    #[must_use]
    pub fn new(config: PipelineConfig, provider: Arc<dyn ModelProvider>, progress: Arc<dyn ProgressSink>) -> Self {
        let mut client = InferenceClient::new(Arc::clone(&provider));
        if let Some(parameters) = config.backend.parameters() {
            client = client.with_parameters(parameters);
        }
        Self { config, provider, client, progress }
    }

    pub async fn run(&self) -> TrainingResult<PipelineOutcome> {
        self.config.validate()?;
        let mut outcome = PipelineOutcome { stages: Vec::new(), output_dir: self.config.train.output_dir.clone() };

        self.started(Stage::LoadDataset);
        let dataset = load_dataset(&self.config.dataset).inspect_err(|e| self.failed(Stage::LoadDataset, e))?;
        outcome.stages.push(self.finished(Stage::LoadDataset));

        self.started(Stage::LoadModel);
        let model_id = self.load_model().inspect_err(|e| self.failed(Stage::LoadModel, e))?;
        outcome.stages.push(self.finished(Stage::LoadModel));

        outcome.stages.push(self.run_reinforcement(&dataset, &model_id).await);
        outcome.stages.push(self.run_adversarial(&dataset).await);
        outcome.stages.push(self.run_supervised(&dataset, &model_id).await);

        let failed = outcome.failed_stages();
        if !failed.is_empty() {
            warn!(failed = ?failed, "pipeline finished with failed stages");
        }
        info!(
            output_dir = %outcome.output_dir.display(),
            "Training pipeline completed. Outputs saved to {}",
            outcome.output_dir.display()
        );
        Ok(outcome)
    }

    fn load_model(&self) -> TrainingResult<String> {
        let model_id = self
            .config
            .model_identifier()
            .ok_or_else(|| TrainingError::Config("model_name missing in model config".to_string()))?
            .to_string();

        // Resolving up front catches unsupported backends before any stage runs.
        self.provider.model(&model_id)?;
        self.message(Stage::LoadModel, format!("Using model: {model_id} (inference only)"));

        if self.config.requests_adapter() {
            warn!(
                model = %model_id,
                "LoRA/QLoRA fine-tuning is not supported by an inference-only backend; skipping adapter application"
            );
        }
        Ok(model_id)
    }

    async fn run_reinforcement(&self, dataset: &Dataset, model_id: &str) -> StageOutcome {
        let stage = Stage::Reinforcement;
        if !self.config.reinforcement.enabled {
            return self.skipped(stage);
        }

        self.started(stage);
        let emulator = ReinforcementEmulator::new(
            self.client.clone(),
            Arc::clone(&self.progress),
            self.config.reinforcement.clone(),
            model_id,
        );
        let result = emulator.run(&dataset.records).await.map(|_| ());
        self.settle(stage, result)
    }

    async fn run_adversarial(&self, dataset: &Dataset) -> StageOutcome {
        let stage = Stage::Adversarial;
        if !self.config.adversarial.enabled {
            return self.skipped(stage);
        }

        self.started(stage);
        // validate() guarantees both are present when the stage is enabled.
        let generator = self.config.generator_model().unwrap_or_default();
        let discriminator = self.config.discriminator_model().unwrap_or_default();
        let engine = AdversarialLoop::new(
            self.client.clone(),
            Arc::clone(&self.progress),
            self.config.adversarial.clone(),
            generator,
            discriminator,
        );
        let result = engine.run(&dataset.records).await.map(|_| ());
        self.settle(stage, result)
    }

    async fn run_supervised(&self, dataset: &Dataset, model_id: &str) -> StageOutcome {
        let stage = Stage::Supervised;
        self.started(stage);
        let runner =
            SupervisedRunner::new(self.client.clone(), Arc::clone(&self.progress), self.config.finetune.clone(), model_id);
        let result = runner.run(&dataset.records).await.map(|_| ());
        self.settle(stage, result)
    }

    fn settle(&self, stage: Stage, result: TrainingResult<()>) -> StageOutcome {
        match result {
            Ok(()) => self.finished(stage),
            Err(e) => {
                self.failed(stage, &e);
                StageOutcome { stage, status: StageStatus::Failed(e.to_string()) }
            }
        }
    }

    fn started(&self, stage: Stage) {
        self.progress.on_event(ProgressEvent::StageStarted { stage });
    }

    fn finished(&self, stage: Stage) -> StageOutcome {
        self.progress.on_event(ProgressEvent::StageFinished { stage });
        StageOutcome { stage, status: StageStatus::Completed }
    }

    fn skipped(&self, stage: Stage) -> StageOutcome {
        self.progress.on_event(ProgressEvent::StageSkipped { stage });
        StageOutcome { stage, status: StageStatus::Skipped }
    }

    fn failed(&self, stage: Stage, error: &TrainingError) {
        self.progress.on_event(ProgressEvent::StageFailed { stage, reason: error.to_string() });
    }

    fn message(&self, stage: Stage, message: String) {
        self.progress.on_event(ProgressEvent::Message { stage, message });
    }
}
