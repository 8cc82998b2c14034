//! Supervised inference pass.
//!
//! Runs the base model once over every record and logs what it produced.
//! No scoring and no structured artifacts; the finetune output directory is
//! created so later tooling has a place to put results.

use crate::artifacts::GenerationResult;
use crate::config::FinetuneConfig;
use crate::dataset::Record;
use crate::error::TrainingResult;
use crate::inference::InferenceClient;
use crate::progress::{ProgressEvent, ProgressSink, Stage};
use std::sync::Arc;
use tracing::{debug, info};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SupervisedReport {
    pub results: Vec<GenerationResult>,
    pub skipped: usize,
    pub failed: usize,
}

pub struct SupervisedRunner {
    client: InferenceClient,
    progress: Arc<dyn ProgressSink>,
    config: FinetuneConfig,
    model_id: String,
}

impl SupervisedRunner {
    #[must_use]
    pub fn new(
        client: InferenceClient,
        progress: Arc<dyn ProgressSink>,
        config: FinetuneConfig,
        model_id: impl Into<String>,
    ) -> Self {
        Self { client, progress, config, model_id: model_id.into() }
    }

    pub async fn run(&self, records: &[Record]) -> TrainingResult<SupervisedReport> {
        std::fs::create_dir_all(&self.config.output_dir)?;
        self.progress.on_event(ProgressEvent::Message {
            stage: Stage::Supervised,
            message: format!("Running inference on {} records using model: {}", records.len(), self.model_id),
        });

        let mut report = SupervisedReport::default();

        for (idx, batch) in records.chunks(self.config.batch_size.max(1)).enumerate() {
            debug!(batch = idx + 1, size = batch.len(), "supervised batch");
            for record in batch {
                let prompt = record.prompt();
                if prompt.is_empty() {
                    report.skipped += 1;
                    continue;
                }

                let generation = self.client.generate(&self.model_id, prompt).await;
                if generation.is_failure() {
                    report.failed += 1;
                }
                let generated = generation.into_text();
                info!(prompt = %prompt, generated = %generated, "supervised generation");
                report.results.push(GenerationResult { prompt: prompt.to_string(), generated });
            }
        }

        self.progress.on_event(ProgressEvent::Message {
            stage: Stage::Supervised,
            message: format!(
                "Supervised inference complete: {} generated, {} skipped, {} failed",
                report.results.len(),
                report.skipped,
                report.failed
            ),
        });
        Ok(report)
    }
}
