//! Run command implementation.

use anyhow::{Context, Result};
use colored::Colorize;
use crucible_models::{ModelRegistry, ModelType};
use crucible_training::{load_config, Pipeline, StageStatus, TracingProgressSink};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

pub async fn execute(config_path: PathBuf, backend: Option<ModelType>, backend_url: Option<String>) -> Result<()> {
    let mut config = load_config(&config_path)
        .with_context(|| format!("Failed to load configuration from {}", config_path.display()))?;

    if let Some(backend) = backend {
        config.backend.model_type = backend;
    }
    if let Some(url) = backend_url {
        config.backend.base_url = url;
    }

    info!(
        config = %config_path.display(),
        backend = ?config.backend.model_type,
        base_url = %config.backend.base_url,
        "configuration loaded"
    );
    let provider = Arc::new(ModelRegistry::new(config.backend.model_type, Some(config.backend.base_url.clone())));
    let outcome = Pipeline::new(config, provider, Arc::new(TracingProgressSink))
        .run()
        .await
        .context("Pipeline aborted")?;

    println!();
    println!("{}", "Pipeline finished".bold().cyan());
    for stage in &outcome.stages {
        let status = match &stage.status {
            StageStatus::Completed => "completed".green().to_string(),
            StageStatus::Skipped => "skipped".dimmed().to_string(),
            StageStatus::Failed(reason) => format!("{} ({})", "failed".red(), reason),
        };
        println!("  {:<14} {}", stage.stage.as_str(), status);
    }
    println!("  Outputs: {}", outcome.output_dir.display().to_string().dimmed());
    println!();
    Ok(())
}
