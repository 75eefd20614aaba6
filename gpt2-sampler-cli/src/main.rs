use std::io::IsTerminal;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use gpt2_sampler_core::config::settings;
use gpt2_sampler_core::{ModelStore, PromptSet, RunConfig};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Print sampled GPT-2 continuations for a list of prompts.
#[derive(Debug, Parser)]
#[command(name = "gpt2-sampler", version, about, long_about = None)]
struct Cli {
    /// Model directory name under the models root.
    #[arg(long, default_value = settings::MODEL_NAME)]
    model_name: String,

    /// Seed for the sampler; fix it to reproduce a run.
    #[arg(long)]
    seed: Option<u64>,

    /// Samples to print per prompt.
    #[arg(long, default_value_t = settings::NSAMPLES)]
    nsamples: usize,

    /// Rows sampled per pass (only affects speed/memory). Must divide nsamples.
    #[arg(long)]
    batch_size: Option<usize>,

    /// Tokens generated per sample. Defaults to half the context window.
    #[arg(long)]
    length: Option<usize>,

    /// Lower is less random; 0 picks the most likely token.
    #[arg(long, default_value_t = settings::TEMPERATURE)]
    temperature: f32,

    /// Sample only among the k most likely tokens; 0 means no restriction.
    #[arg(long, default_value_t = settings::TOP_K)]
    top_k: usize,

    /// Nucleus sampling mass; overrides top-k when > 0.
    #[arg(long, default_value_t = settings::TOP_P)]
    top_p: f32,

    /// Root directory holding one sub-directory per model.
    #[arg(long, env = "GPT2_MODELS_DIR", default_value = settings::MODELS_DIR)]
    models_dir: PathBuf,

    /// JSON array of prompts to use instead of the built-in list.
    #[arg(long)]
    prompts: Option<PathBuf>,

    /// `cpu`, `cuda` or `cuda:<n>`.
    #[arg(long, default_value = settings::DEVICE)]
    device: String,

    /// Log filter, e.g. `info` or `gpt2_sampler_core=debug`.
    #[arg(long, env = "GPT2_SAMPLER_LOG", default_value = "info")]
    log_level: String,
}

impl Cli {
    fn run_config(&self) -> RunConfig {
        RunConfig {
            model_name: self.model_name.clone(),
            models_dir: self.models_dir.clone(),
            seed: self.seed,
            nsamples: self.nsamples,
            batch_size: self.batch_size,
            length: self.length,
            temperature: self.temperature,
            top_k: self.top_k,
            top_p: self.top_p,
            device: self.device.clone(),
        }
    }

    fn prompt_set(&self) -> Result<PromptSet> {
        match &self.prompts {
            Some(path) => PromptSet::from_json_file(path)
                .with_context(|| format!("Failed to read prompts from {}", path.display())),
            None => Ok(PromptSet::jeopardy()?),
        }
    }
}

fn setup_logging(log_level: &str) {
    let env_filter = EnvFilter::try_new(log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    let is_terminal = std::io::stderr().is_terminal();

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(is_terminal)
                .with_target(true),
        )
        .with(env_filter)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(&cli.log_level);

    let config = cli.run_config();
    let prompts = cli.prompt_set()?;
    let store = ModelStore::from_config(&config);

    let stdout = std::io::stdout();
    let summary = gpt2_sampler_core::run(&config, &store, &prompts, stdout.lock())
        .with_context(|| format!("Sampling from model '{}' failed", config.model_name))?;

    tracing::debug!(?summary, "Done");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_defaults() {
        let cli = Cli::try_parse_from(["gpt2-sampler"]).unwrap();
        let cfg = cli.run_config();
        assert_eq!(cfg.model_name, "117M");
        assert_eq!(cfg.nsamples, 1);
        assert_eq!(cfg.batch_size, None);
        assert_eq!(cfg.batch_size(), 1);
        assert_eq!(cfg.length, None);
        assert_eq!(cfg.temperature, 1.0);
        assert_eq!(cfg.top_k, 0);
        assert_eq!(cfg.top_p, 0.0);
        assert_eq!(cfg.seed, None);
    }

    #[test]
    fn test_overrides() {
        let cli = Cli::try_parse_from([
            "gpt2-sampler",
            "--model-name",
            "345M",
            "--seed",
            "7",
            "--nsamples",
            "4",
            "--batch-size",
            "2",
            "--length",
            "20",
            "--top-p",
            "0.9",
        ])
        .unwrap();
        let cfg = cli.run_config();
        assert_eq!(cfg.model_name, "345M");
        assert_eq!(cfg.seed, Some(7));
        assert_eq!(cfg.batches_per_prompt(), 2);
        assert_eq!(cfg.length, Some(20));
        assert_eq!(cfg.top_p, 0.9);
    }
}
