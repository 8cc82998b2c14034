use crate::error::TrainingResult;
use std::path::{Path, PathBuf};

/// Filesystem layout for adversarial batch artifacts.
///
/// One file per (epoch, batch), both 1-based: `<root>/epoch{N}_batch{M}.jsonl`.
#[derive(Debug, Clone)]
pub struct ArtifactLayout {
    root: PathBuf,
}

impl ArtifactLayout {
    #[must_use]
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    #[must_use]
    pub fn batch_file_name(epoch: u32, batch: u32) -> String {
        format!("epoch{epoch}_batch{batch}.jsonl")
    }

    #[must_use]
    pub fn batch_path(&self, epoch: u32, batch: u32) -> PathBuf {
        self.root.join(Self::batch_file_name(epoch, batch))
    }

    /// Create the root directory and its parents. Succeeds if it already exists.
    pub fn ensure_root(&self) -> TrainingResult<()> {
        std::fs::create_dir_all(&self.root)?;
        Ok(())
    }
}
