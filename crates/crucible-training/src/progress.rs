//! Run narration.
//!
//! Stages never configure logging themselves. Each component is handed a
//! `ProgressSink` when it is built and reports stage transitions, batch
//! writes and failures through it.

use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use std::sync::Mutex;
use tracing::{error, info, warn};

/// One phase of the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    LoadDataset,
    LoadModel,
    Supervised,
    Reinforcement,
    Adversarial,
}

impl Stage {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::LoadDataset => "load_dataset",
            Self::LoadModel => "load_model",
            Self::Supervised => "supervised",
            Self::Reinforcement => "reinforcement",
            Self::Adversarial => "adversarial",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProgressEvent {
    StageStarted { stage: Stage },
    StageFinished { stage: Stage },
    StageSkipped { stage: Stage },
    StageFailed { stage: Stage, reason: String },
    Message { stage: Stage, message: String },
    BatchWritten { epoch: u32, batch: u32, samples: usize, path: PathBuf },
    EpochCompleted { epoch: u32, epochs: u32 },
}

pub trait ProgressSink: Send + Sync {
    fn on_event(&self, event: ProgressEvent);
}

/// Forwards events to `tracing`, which the binary routes to console and file.
#[derive(Debug, Default)]
pub struct TracingProgressSink;

impl ProgressSink for TracingProgressSink {
    fn on_event(&self, event: ProgressEvent) {
        match event {
            ProgressEvent::StageStarted { stage } => info!(%stage, "stage started"),
            ProgressEvent::StageFinished { stage } => info!(%stage, "stage finished"),
            ProgressEvent::StageSkipped { stage } => info!(%stage, "stage disabled, skipping"),
            ProgressEvent::StageFailed { stage, reason } => {
                error!(%stage, %reason, "stage failed");
            }
            ProgressEvent::Message { stage, message } => info!(%stage, "{message}"),
            ProgressEvent::BatchWritten { epoch, batch, samples, path } => {
                info!(epoch, batch, samples, path = %path.display(), "batch artifact written");
            }
            ProgressEvent::EpochCompleted { epoch, epochs } => {
                info!(epoch, epochs, "Epoch {epoch}/{epochs} completed.");
            }
        }
    }
}

/// Keeps every event in memory. Useful for tests and for callers that want
/// to inspect a run after it finishes.
#[derive(Debug, Default)]
pub struct RecordingProgressSink {
    events: Mutex<Vec<ProgressEvent>>,
}

impl RecordingProgressSink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn events(&self) -> Vec<ProgressEvent> {
        self.events.lock().map(|events| events.clone()).unwrap_or_default()
    }
}

impl ProgressSink for RecordingProgressSink {
    fn on_event(&self, event: ProgressEvent) {
        match self.events.lock() {
            Ok(mut events) => events.push(event),
            Err(_) => warn!("progress recorder lock poisoned, dropping event"),
        }
    }
}
