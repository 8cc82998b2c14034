//! Generator/discriminator loop.
//!
//! Each epoch draws a fresh permutation of the records, cuts it into
//! contiguous batches and, per batch: generates one completion per prompt,
//! asks the discriminator to grade each completion, and writes the rewarded
//! samples to `epoch{N}_batch{M}.jsonl`. A run over N records therefore
//! leaves `epochs * ceil(N / batch_size)` files behind.
//!
//! Backend failures degrade a single sample (empty completion, fallback
//! reward). Only reading the dataset and writing artifacts can abort a run.

use crate::artifacts::{write_batch_artifact, GenerationResult, RewardedSample};
use crate::config::AdversarialConfig;
use crate::dataset::{read_records, Record};
use crate::error::TrainingResult;
use crate::inference::InferenceClient;
use crate::layout::ArtifactLayout;
use crate::progress::{ProgressEvent, ProgressSink, Stage};
use crate::reward;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AdversarialReport {
    pub epochs_completed: u32,
    /// Artifact files in the order they were written.
    pub artifacts: Vec<PathBuf>,
    pub samples_written: usize,
    pub generation_failures: usize,
}

pub struct AdversarialLoop {
    client: InferenceClient,
    progress: Arc<dyn ProgressSink>,
    config: AdversarialConfig,
    generator_model: String,
    discriminator_model: String,
}

impl AdversarialLoop {
    #[must_use]
    pub fn new(
        client: InferenceClient,
        progress: Arc<dyn ProgressSink>,
        config: AdversarialConfig,
        generator_model: impl Into<String>,
        discriminator_model: impl Into<String>,
    ) -> Self {
        Self {
            client,
            progress,
            config,
            generator_model: generator_model.into(),
            discriminator_model: discriminator_model.into(),
        }
    }

    #[must_use]
    pub fn config(&self) -> &AdversarialConfig {
        &self.config
    }

    /// Run over the jsonl dataset at `dataset_path`.
    ///
    /// A disabled loop returns an empty report without touching the
    /// filesystem or the backend.
    pub async fn run_from_path(&self, dataset_path: &Path) -> TrainingResult<AdversarialReport> {
        if !self.config.enabled {
            debug!("adversarial loop disabled");
            return Ok(AdversarialReport::default());
        }
        self.config.validate()?;
        let layout = self.prepare_output()?;
        let records = read_records(dataset_path)?;
        self.run_epochs(&layout, &records).await
    }

    /// Run over records that are already in memory. `records` is never reordered.
    pub async fn run(&self, records: &[Record]) -> TrainingResult<AdversarialReport> {
        if !self.config.enabled {
            debug!("adversarial loop disabled");
            return Ok(AdversarialReport::default());
        }
        self.config.validate()?;
        let layout = self.prepare_output()?;
        self.run_epochs(&layout, records).await
    }

    fn prepare_output(&self) -> TrainingResult<ArtifactLayout> {
        let layout = ArtifactLayout::new(self.config.output_dir.clone());
        layout.ensure_root()?;
        self.message(format!(
            "Adversarial inference loop enabled. Generator: {}, Discriminator: {}",
            self.generator_model, self.discriminator_model
        ));
        Ok(layout)
    }

    async fn run_epochs(&self, layout: &ArtifactLayout, records: &[Record]) -> TrainingResult<AdversarialReport> {
        let mut rng = match self.config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let epochs = self.config.epochs;
        let mut report = AdversarialReport::default();

        for epoch in 1..=epochs {
            let order = epoch_permutation(&mut rng, records.len());

            for (idx, chunk) in order.chunks(self.config.batch_size).enumerate() {
                let batch = idx as u32 + 1;
                let prompts: Vec<&str> = chunk.iter().map(|&i| records[i].prompt()).collect();

                let (generations, failures) = self.generate_batch(&prompts).await;
                let samples = self.score_batch(generations).await;

                let path = layout.batch_path(epoch, batch);
                write_batch_artifact(&path, &samples)?;
                self.progress.on_event(ProgressEvent::BatchWritten {
                    epoch,
                    batch,
                    samples: samples.len(),
                    path: path.clone(),
                });

                report.samples_written += samples.len();
                report.generation_failures += failures;
                report.artifacts.push(path);
            }

            report.epochs_completed = epoch;
            self.progress.on_event(ProgressEvent::EpochCompleted { epoch, epochs });
        }

        info!(
            output_dir = %layout.root().display(),
            artifacts = report.artifacts.len(),
            "Adversarial inference complete"
        );
        self.message(format!("Adversarial inference complete. Results saved to: {}", layout.root().display()));
        Ok(report)
    }

    /// Generator pass. Output order matches `prompts`.
    async fn generate_batch(&self, prompts: &[&str]) -> (Vec<GenerationResult>, usize) {
        let mut results = Vec::with_capacity(prompts.len());
        let mut failures = 0;

        for prompt in prompts {
            let generation = self.client.generate(&self.generator_model, prompt).await;
            if generation.is_failure() {
                failures += 1;
            }
            results.push(GenerationResult { prompt: (*prompt).to_string(), generated: generation.into_text() });
        }

        (results, failures)
    }

    /// Discriminator pass. Each completion is graded on its own text.
    async fn score_batch(&self, generations: Vec<GenerationResult>) -> Vec<RewardedSample> {
        let mut samples = Vec::with_capacity(generations.len());

        for GenerationResult { prompt, generated } in generations {
            let raw = self.client.generate(&self.discriminator_model, &generated).await.into_text();
            samples.push(RewardedSample { prompt, generated, reward: reward::score(&raw) });
        }

        samples
    }

    fn message(&self, message: String) {
        self.progress.on_event(ProgressEvent::Message { stage: Stage::Adversarial, message });
    }
}

/// A uniformly random ordering of `0..len`.
pub fn epoch_permutation<R: Rng + ?Sized>(rng: &mut R, len: usize) -> Vec<usize> {
    let mut order: Vec<usize> = (0..len).collect();
    order.shuffle(rng);
    order
}
