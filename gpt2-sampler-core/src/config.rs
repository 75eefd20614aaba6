use std::path::{Path, PathBuf};

use candle_core::Device;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::sampling_params::SamplingParams;

/// Default settings matching the reference GPT-2 release.
pub mod settings {
    /// Model directory name looked up under the models root.
    pub const MODEL_NAME: &str = "117M";
    /// Root directory holding one sub-directory per model.
    pub const MODELS_DIR: &str = "models";
    /// Total number of samples emitted per prompt.
    pub const NSAMPLES: usize = 1;
    /// Rows sampled per forward pass.
    pub const BATCH_SIZE: usize = 1;
    pub const TEMPERATURE: f32 = 1.0;
    /// 0 disables top-k filtering.
    pub const TOP_K: usize = 0;
    /// 0.0 disables nucleus filtering.
    pub const TOP_P: f32 = 0.0;
    pub const DEVICE: &str = "cpu";

    pub const N_VOCAB: usize = 0;
    pub const N_CTX: usize = 1024;
    pub const N_EMBD: usize = 768;
    pub const N_HEAD: usize = 12;
    pub const N_LAYER: usize = 12;
    pub const LAYER_NORM_EPS: f64 = 1e-5;
}

/// Model hyperparameters. Values missing from `hparams.json` keep their
/// defaults; unknown keys are rejected.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct Hparams {
    pub n_vocab: usize,
    pub n_ctx: usize,
    pub n_embd: usize,
    pub n_head: usize,
    pub n_layer: usize,
}

impl Default for Hparams {
    fn default() -> Self {
        Self {
            n_vocab: settings::N_VOCAB,
            n_ctx: settings::N_CTX,
            n_embd: settings::N_EMBD,
            n_head: settings::N_HEAD,
            n_layer: settings::N_LAYER,
        }
    }
}

impl Hparams {
    /// Apply the overrides stored at `path` on top of the defaults.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| Error::hparams(path, e))?;
        Self::from_json_str(&raw).map_err(|e| match e {
            Error::HyperparameterLoad { reason, .. } => Error::hparams(path, reason),
            other => other,
        })
    }

    pub fn from_json_str(raw: &str) -> Result<Self> {
        let hparams: Hparams = serde_json::from_str(raw).map_err(|e| Error::hparams("<inline>", e))?;
        hparams.check()?;
        Ok(hparams)
    }

    fn check(&self) -> Result<()> {
        if self.n_vocab == 0 {
            return Err(Error::hparams("<inline>", "n_vocab must be set"));
        }
        if self.n_ctx == 0 || self.n_layer == 0 {
            return Err(Error::hparams("<inline>", "n_ctx and n_layer must be positive"));
        }
        if self.n_head == 0 || self.n_embd % self.n_head != 0 {
            return Err(Error::hparams(
                "<inline>",
                format!("n_embd ({}) must be divisible by n_head ({})", self.n_embd, self.n_head),
            ));
        }
        Ok(())
    }

    pub fn head_dim(&self) -> usize {
        self.n_embd / self.n_head
    }
}

/// Everything one invocation of the driver needs to know.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RunConfig {
    pub model_name: String,
    pub models_dir: PathBuf,
    pub seed: Option<u64>,
    pub nsamples: usize,
    pub batch_size: Option<usize>,
    pub length: Option<usize>,
    pub temperature: f32,
    pub top_k: usize,
    pub top_p: f32,
    pub device: String,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            model_name: settings::MODEL_NAME.to_string(),
            models_dir: PathBuf::from(settings::MODELS_DIR),
            seed: None,
            nsamples: settings::NSAMPLES,
            batch_size: None,
            length: None,
            temperature: settings::TEMPERATURE,
            top_k: settings::TOP_K,
            top_p: settings::TOP_P,
            device: settings::DEVICE.to_string(),
        }
    }
}

impl RunConfig {
    pub fn with_model(mut self, name: &str) -> Self {
        self.model_name = name.to_string();
        self
    }

    pub fn with_models_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.models_dir = dir.into();
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_samples(mut self, nsamples: usize, batch_size: usize) -> Self {
        self.nsamples = nsamples;
        self.batch_size = Some(batch_size);
        self
    }

    pub fn with_length(mut self, length: usize) -> Self {
        self.length = Some(length);
        self
    }

    /// Unset batch size means one row per pass.
    pub fn batch_size(&self) -> usize {
        self.batch_size.unwrap_or(settings::BATCH_SIZE)
    }

    /// Number of sampler invocations per prompt.
    pub fn batches_per_prompt(&self) -> usize {
        self.nsamples / self.batch_size()
    }

    pub fn sampling_params(&self) -> SamplingParams {
        SamplingParams {
            temperature: self.temperature,
            top_k: self.top_k,
            top_p: self.top_p,
        }
    }

    /// Checks that need no model data.
    pub fn validate(&self) -> Result<()> {
        let batch_size = self.batch_size();
        if batch_size == 0 {
            return Err(Error::invalid("batch_size must be at least 1"));
        }
        if self.nsamples % batch_size != 0 {
            return Err(Error::invalid(format!(
                "batch_size ({batch_size}) must divide nsamples ({})",
                self.nsamples
            )));
        }
        self.sampling_params().validate()
    }

    /// Generation length for a model with the given window.
    pub fn resolve_length(&self, hparams: &Hparams) -> Result<usize> {
        match self.length {
            None => Ok(hparams.n_ctx / 2),
            Some(length) if length > hparams.n_ctx => Err(Error::invalid(format!(
                "can't get samples longer than window size: {}",
                hparams.n_ctx
            ))),
            Some(length) => Ok(length),
        }
    }
}

/// Accepts `cpu`, `cuda` and `cuda:<ordinal>`.
pub fn parse_device(s: &str) -> Result<Device> {
    match s {
        "cpu" => Ok(Device::Cpu),
        "cuda" => Ok(Device::new_cuda(0)?),
        other => match other.strip_prefix("cuda:").map(str::parse::<usize>) {
            Some(Ok(ordinal)) => Ok(Device::new_cuda(ordinal)?),
            _ => Err(Error::invalid(format!("unsupported device '{other}'"))),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const GPT2_SMALL: &str = r#"{"n_vocab": 50257, "n_ctx": 1024, "n_embd": 768, "n_head": 12, "n_layer": 12}"#;

    #[test]
    fn test_hparams_override() {
        let hp = Hparams::from_json_str(r#"{"n_vocab": 100, "n_ctx": 32}"#).unwrap();
        assert_eq!(hp.n_vocab, 100);
        assert_eq!(hp.n_ctx, 32);
        assert_eq!(hp.n_embd, settings::N_EMBD);
        assert_eq!(hp.n_layer, settings::N_LAYER);

        let small = Hparams::from_json_str(GPT2_SMALL).unwrap();
        assert_eq!(small.head_dim(), 64);
    }

    #[test]
    fn test_hparams_rejects_unknown_and_malformed() {
        let unknown = Hparams::from_json_str(r#"{"n_vocab": 10, "n_dropout": 0.1}"#);
        assert!(matches!(unknown, Err(Error::HyperparameterLoad { .. })));

        let malformed = Hparams::from_json_str("{\"n_vocab\": ");
        assert!(matches!(malformed, Err(Error::HyperparameterLoad { .. })));

        let no_vocab = Hparams::from_json_str("{}");
        assert!(matches!(no_vocab, Err(Error::HyperparameterLoad { .. })));

        let bad_heads = Hparams::from_json_str(r#"{"n_vocab": 10, "n_embd": 10, "n_head": 3}"#);
        assert!(matches!(bad_heads, Err(Error::HyperparameterLoad { .. })));
    }

    #[test]
    fn test_missing_hparams_file_reports_path() {
        let err = Hparams::from_json_file(Path::new("/nonexistent/hparams.json")).unwrap_err();
        match err {
            Error::HyperparameterLoad { path, .. } => {
                assert_eq!(path, PathBuf::from("/nonexistent/hparams.json"))
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_batch_size_must_divide_nsamples() {
        let cfg = RunConfig::default().with_samples(5, 2);
        assert!(matches!(cfg.validate(), Err(Error::InvalidArgument(_))));

        let cfg = RunConfig::default().with_samples(4, 0);
        assert!(matches!(cfg.validate(), Err(Error::InvalidArgument(_))));

        let cfg = RunConfig::default().with_samples(6, 3);
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.batches_per_prompt(), 2);
    }

    #[test]
    fn test_unset_batch_size_defaults_to_one() {
        let mut cfg = RunConfig::default();
        cfg.nsamples = 3;
        assert_eq!(cfg.batch_size(), 1);
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.batches_per_prompt(), 3);
    }

    #[test]
    fn test_resolve_length() {
        let hp = Hparams::from_json_str(GPT2_SMALL).unwrap();
        assert_eq!(RunConfig::default().resolve_length(&hp).unwrap(), 512);
        assert_eq!(RunConfig::default().with_length(1024).resolve_length(&hp).unwrap(), 1024);
        let err = RunConfig::default().with_length(1025).resolve_length(&hp);
        assert!(matches!(err, Err(Error::InvalidArgument(_))));
    }

    #[test]
    fn test_device_parsing() {
        assert!(matches!(parse_device("cpu").unwrap(), Device::Cpu));
        assert!(parse_device("tpu").is_err());
        assert!(parse_device("cuda:x").is_err());
    }

    #[test]
    fn test_serde_roundtrip() {
        let cfg = RunConfig::default().with_model("345M").with_seed(7);
        let json = serde_json::to_string(&cfg).unwrap();
        let decoded: RunConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(cfg, decoded);
    }
}
