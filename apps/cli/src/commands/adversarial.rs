//! Adversarial command implementation.

use anyhow::{Context, Result};
use colored::Colorize;
use crucible_models::{ModelRegistry, ModelType};
use crucible_training::{AdversarialConfig, AdversarialLoop, InferenceClient, TracingProgressSink};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

#[derive(Debug)]
pub struct AdversarialOptions {
    pub dataset: PathBuf,
    pub generator: String,
    pub discriminator: String,
    pub batch_size: usize,
    pub epochs: u32,
    pub output_dir: PathBuf,
    pub seed: Option<u64>,
    pub backend: ModelType,
    pub backend_url: Option<String>,
}

pub async fn execute(options: AdversarialOptions) -> Result<()> {
    let config = AdversarialConfig {
        enabled: true,
        batch_size: options.batch_size,
        epochs: options.epochs,
        output_dir: options.output_dir,
        generator_model: Some(options.generator.clone()),
        discriminator_model: Some(options.discriminator.clone()),
        seed: options.seed,
    };
    config.validate().context("Invalid adversarial options")?;

    info!(dataset = %options.dataset.display(), backend = ?options.backend, "starting standalone adversarial loop");
    let provider = Arc::new(ModelRegistry::new(options.backend, options.backend_url));
    let engine = AdversarialLoop::new(
        InferenceClient::new(provider),
        Arc::new(TracingProgressSink),
        config,
        options.generator,
        options.discriminator,
    );

    let report = engine
        .run_from_path(&options.dataset)
        .await
        .with_context(|| format!("Adversarial loop failed for dataset {}", options.dataset.display()))?;

    println!();
    println!("{}", "Adversarial loop complete".bold().green());
    println!("  Epochs:    {}", report.epochs_completed);
    println!("  Artifacts: {}", report.artifacts.len());
    println!("  Samples:   {}", report.samples_written);
    if report.generation_failures > 0 {
        println!("  {}", format!("Generation failures: {}", report.generation_failures).yellow());
    }
    println!("  Output:    {}", engine.config().output_dir.display().to_string().dimmed());
    println!();
    Ok(())
}
