//! Emulated reinforcement feedback.
//!
//! A single pass over the first `num_samples` records with one generation
//! per prompt and a placeholder reward. Nothing is written to disk; the
//! samples are logged and returned.

use crate::artifacts::RewardedSample;
use crate::config::ReinforcementConfig;
use crate::dataset::Record;
use crate::error::TrainingResult;
use crate::inference::InferenceClient;
use crate::progress::{ProgressEvent, ProgressSink, Stage};
use crate::reward::FALLBACK_REWARD;
use std::sync::Arc;
use tracing::{debug, info};

/// Reward attached to every emulated sample.
pub const PLACEHOLDER_REWARD: f64 = FALLBACK_REWARD;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReinforcementReport {
    pub samples: Vec<RewardedSample>,
    pub skipped: usize,
    pub failed: usize,
}

pub struct ReinforcementEmulator {
    client: InferenceClient,
    progress: Arc<dyn ProgressSink>,
    config: ReinforcementConfig,
    model_id: String,
}

impl ReinforcementEmulator {
    #[must_use]
    pub fn new(
        client: InferenceClient,
        progress: Arc<dyn ProgressSink>,
        config: ReinforcementConfig,
        model_id: impl Into<String>,
    ) -> Self {
        Self { client, progress, config, model_id: model_id.into() }
    }

    pub async fn run(&self, records: &[Record]) -> TrainingResult<ReinforcementReport> {
        if !self.config.enabled {
            debug!("reinforcement emulation disabled");
            return Ok(ReinforcementReport::default());
        }

        self.progress.on_event(ProgressEvent::Message {
            stage: Stage::Reinforcement,
            message: format!("RLHF emulation enabled for model: {}", self.model_id),
        });

        let subset = &records[..records.len().min(self.config.num_samples)];
        let mut report = ReinforcementReport::default();

        for batch in subset.chunks(self.config.batch_size.max(1)) {
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
                info!(prompt = %prompt, generated = %generated, reward = PLACEHOLDER_REWARD, "emulated feedback");

                report.samples.push(RewardedSample {
                    prompt: prompt.to_string(),
                    generated,
                    reward: PLACEHOLDER_REWARD,
                });
            }
        }

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::RecordingProgressSink;
    use crate::test_support::ScriptedProvider;

    fn emulator(provider: &Arc<ScriptedProvider>, config: ReinforcementConfig) -> ReinforcementEmulator {
        ReinforcementEmulator::new(
            InferenceClient::new(provider.clone()),
            Arc::new(RecordingProgressSink::new()),
            config,
            "base",
        )
    }

    #[tokio::test]
    async fn test_disabled_emulator_makes_no_calls() {
        let provider = Arc::new(ScriptedProvider::new().echo("base"));
        let report = emulator(&provider, ReinforcementConfig::default()).run(&[Record::new("x")]).await.unwrap();

        assert_eq!(report, ReinforcementReport::default());
        assert_eq!(provider.total_calls(), 0);
    }

    #[tokio::test]
    async fn test_truncates_to_num_samples_with_placeholder_reward() {
        let provider = Arc::new(ScriptedProvider::new().echo("base"));
        let config = ReinforcementConfig { enabled: true, num_samples: 3, batch_size: 2 };
        let records: Vec<Record> = (0..10).map(|i| Record::new(format!("p{i}"))).collect();

        let report = emulator(&provider, config).run(&records).await.unwrap();

        assert_eq!(provider.calls("base"), vec!["p0", "p1", "p2"]);
        assert_eq!(report.samples.len(), 3);
        assert!(report.samples.iter().all(|s| (s.reward - PLACEHOLDER_REWARD).abs() < f64::EPSILON));
        assert_eq!(report.samples[2].generated, "p2");
    }

    #[tokio::test]
    async fn test_skips_empty_prompts_and_counts_failures() {
        let provider = Arc::new(ScriptedProvider::new().fail_on("base", "bad"));
        let config = ReinforcementConfig { enabled: true, ..ReinforcementConfig::default() };
        let records = vec![Record::default(), Record::new("bad"), Record::new("ok")];

        let report = emulator(&provider, config).run(&records).await.unwrap();

        assert_eq!(report.skipped, 1);
        assert_eq!(report.failed, 1);
        assert_eq!(report.samples.len(), 2);
        assert_eq!(report.samples[0].generated, "");
    }
}
