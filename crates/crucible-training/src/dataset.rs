use crate::config::DatasetConfig;
use crate::error::{TrainingError, TrainingResult};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Deserializer, Serialize};
use std::path::Path;
use tracing::{debug, info};

/// Seed for k-fold shuffling, so fold membership is stable across runs.
pub const KFOLD_SEED: u64 = 42;

/// One line of a jsonl dataset.
///
/// The prompt lives under `text`, or under `instruction` for instruction-style
/// datasets. A record with neither (or a non-string value) yields an empty
/// prompt instead of failing the load. Unrecognised keys are carried along.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Record {
    #[serde(default, deserialize_with = "string_or_none", skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, deserialize_with = "string_or_none", skip_serializing_if = "Option::is_none")]
    pub instruction: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Record {
    #[must_use]
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: Some(text.into()), ..Self::default() }
    }

    #[must_use]
    pub fn prompt(&self) -> &str {
        self.text.as_deref().or(self.instruction.as_deref()).unwrap_or_default()
    }
}

fn string_or_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::String(s)) => Some(s),
        _ => None,
    })
}

/// A train/validation partition produced by `kfold`.
#[derive(Debug, Clone, PartialEq)]
pub struct Fold {
    /// `fold_1`, `fold_2`, ...
    pub name: String,
    pub train: Vec<Record>,
    pub validation: Vec<Record>,
}

/// A loaded dataset, optionally with cross-validation folds.
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    pub records: Vec<Record>,
    pub folds: Option<Vec<Fold>>,
}

impl Dataset {
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Read a newline-delimited JSON file. Blank lines are skipped.
pub fn read_records(path: &Path) -> TrainingResult<Vec<Record>> {
    let contents = std::fs::read_to_string(path)
        .map_err(|source| TrainingError::ReadFile { path: path.to_path_buf(), source })?;
    let mut records = Vec::new();

    for (idx, line) in contents.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let record: Record = serde_json::from_str(line).map_err(|e| {
            TrainingError::Dataset(format!(
                "failed to parse jsonl line {} of {}: {}",
                idx + 1,
                path.display(),
                e
            ))
        })?;
        records.push(record);
    }

    debug!(path = %path.display(), records = records.len(), "dataset read");
    Ok(records)
}

/// Load the dataset a pipeline run is configured with.
pub fn load_dataset(config: &DatasetConfig) -> TrainingResult<Dataset> {
    let records = read_records(&config.path)?;
    if records.is_empty() {
        return Err(TrainingError::Dataset(format!(
            "dataset must not be empty: {}",
            config.path.display()
        )));
    }

    let folds = if config.cross_validation {
        let folds = kfold(&records, config.n_splits, KFOLD_SEED)?;
        for fold in &folds {
            info!(
                fold = %fold.name,
                train = fold.train.len(),
                validation = fold.validation.len(),
                "cross-validation fold prepared"
            );
        }
        Some(folds)
    } else {
        None
    };

    info!(path = %config.path.display(), records = records.len(), "dataset loaded");
    Ok(Dataset { records, folds })
}

/// Split `records` into `n_splits` shuffled folds.
///
/// Indices are shuffled once, then cut into contiguous validation chunks; the
/// first `len % n_splits` chunks hold one extra record. Each fold trains on
/// every record outside its chunk, in original order. Every record appears in
/// exactly one validation set.
pub fn kfold(records: &[Record], n_splits: usize, seed: u64) -> TrainingResult<Vec<Fold>> {
    if n_splits < 2 {
        return Err(TrainingError::Config(format!("n_splits must be >= 2, got {n_splits}")));
    }
    if n_splits > records.len() {
        return Err(TrainingError::Dataset(format!(
            "cannot split {} records into {} folds",
            records.len(),
            n_splits
        )));
    }

    let mut indices: Vec<usize> = (0..records.len()).collect();
    indices.shuffle(&mut StdRng::seed_from_u64(seed));

    let base = records.len() / n_splits;
    let extra = records.len() % n_splits;
    let mut folds = Vec::with_capacity(n_splits);
    let mut start = 0;

    for fold in 0..n_splits {
        let size = base + usize::from(fold < extra);
        let chunk = &indices[start..start + size];
        start += size;

        let mut in_validation = vec![false; records.len()];
        for &i in chunk {
            in_validation[i] = true;
        }

        folds.push(Fold {
            name: format!("fold_{}", fold + 1),
            train: records
                .iter()
                .zip(&in_validation)
                .filter(|(_, held_out)| !**held_out)
                .map(|(r, _)| r.clone())
                .collect(),
            validation: chunk.iter().map(|&i| records[i].clone()).collect(),
        });
    }

    Ok(folds)
}
