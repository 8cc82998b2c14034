use crate::error::{TrainingError, TrainingResult};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// A prompt and what the model produced for it. `generated` is empty when
/// the backend call failed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationResult {
    pub prompt: String,
    pub generated: String,
}

/// One line of a batch artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RewardedSample {
    pub prompt: String,
    pub generated: String,
    pub reward: f64,
}

/// Write `samples` as jsonl, replacing any previous file at `path`.
///
/// The file is produced in a single write and never touched again.
pub fn write_batch_artifact(path: &Path, samples: &[RewardedSample]) -> TrainingResult<()> {
    let mut out = String::new();
    for sample in samples {
        out.push_str(&serde_json::to_string(sample)?);
        out.push('\n');
    }
    std::fs::write(path, out)
        .map_err(|e| TrainingError::Artifact(format!("failed to write {}: {}", path.display(), e)))
}

pub fn read_batch_artifact(path: &Path) -> TrainingResult<Vec<RewardedSample>> {
    let contents = std::fs::read_to_string(path)
        .map_err(|source| TrainingError::ReadFile { path: path.to_path_buf(), source })?;
    contents
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| serde_json::from_str(line).map_err(TrainingError::from))
        .collect()
}
