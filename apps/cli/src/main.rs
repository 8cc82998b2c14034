//! Crucible CLI - drives a text-generation backend through the staged
//! inference pipeline.
//!
//! The `crucible-cli` binary loads layered YAML configuration, installs the
//! process logger once, and hands control to `crucible-training`.

mod commands;
mod logging;

use clap::{Parser, Subcommand};
use crucible_models::ModelType;
use std::path::PathBuf;

use commands::{adversarial, run, score};

/// Crucible - inference-only training pipeline orchestration
#[derive(Parser, Debug)]
#[command(
    name = "crucible",
    author,
    version,
    about = "Crucible - staged inference pipeline with an adversarial reward loop",
    long_about = "Crucible drives a text-generation backend through dataset ingestion, supervised inference,\nemulated reinforcement feedback and a generator/discriminator loop, writing per-batch reward artifacts."
)]
struct Args {
    /// Log level (trace, debug, info, warn, error). RUST_LOG takes precedence.
    #[arg(short, long, default_value = "info", global = true)]
    log_level: String,

    /// Also write logs to this file (appended, no colors)
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the full pipeline
    ///
    /// Loads the dataset and model, then runs the enabled reinforcement and
    /// adversarial stages followed by supervised inference.
    Run {
        /// Pipeline configuration file
        #[arg(short, long, default_value = crucible_training::DEFAULT_PIPELINE_CONFIG)]
        config: PathBuf,

        /// Backend override (ollama, mock)
        #[arg(long, value_parser = parse_backend)]
        backend: Option<ModelType>,

        /// Backend base URL override
        #[arg(long)]
        backend_url: Option<String>,
    },

    /// Run only the generator/discriminator loop
    ///
    /// Writes one `epoch{N}_batch{M}.jsonl` file per batch into the output directory.
    Adversarial {
        /// jsonl dataset, one record per line with a `text` field
        #[arg(long)]
        dataset: PathBuf,

        /// Generator model identifier
        #[arg(long)]
        generator: String,

        /// Discriminator model identifier
        #[arg(long)]
        discriminator: String,

        /// Records per batch
        #[arg(long, default_value_t = 4)]
        batch_size: usize,

        /// Number of epochs
        #[arg(long, default_value_t = 3)]
        epochs: u32,

        /// Artifact directory
        #[arg(long, default_value = "./adversarial_outputs")]
        output_dir: PathBuf,

        /// Seed for the per-epoch shuffles
        #[arg(long)]
        seed: Option<u64>,

        /// Backend (ollama, mock)
        #[arg(long, value_parser = parse_backend, default_value = "ollama")]
        backend: ModelType,

        /// Backend base URL
        #[arg(long)]
        backend_url: Option<String>,
    },

    /// Print the reward a discriminator answer would receive
    Score {
        /// Raw discriminator output
        text: String,
    },
}

fn parse_backend(s: &str) -> Result<ModelType, String> {
    s.parse::<ModelType>().map_err(|e| e.to_string())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    logging::init(&args.log_level, args.log_file.as_deref())?;

    match args.command {
        Command::Run { config, backend, backend_url } => {
            run::execute(config, backend, backend_url).await?;
        }
        Command::Adversarial {
            dataset,
            generator,
            discriminator,
            batch_size,
            epochs,
            output_dir,
            seed,
            backend,
            backend_url,
        } => {
            let options = adversarial::AdversarialOptions {
                dataset,
                generator,
                discriminator,
                batch_size,
                epochs,
                output_dir,
                seed,
                backend,
                backend_url,
            };
            adversarial::execute(options).await?;
        }
        Command::Score { text } => {
            score::execute(&text);
        }
    }

    Ok(())
}
