pub mod checkpoint;

use std::path::PathBuf;

use candle_core::{DType, Device};
use candle_nn::VarBuilder;

use crate::config::{Hparams, RunConfig};
use crate::error::{Error, Result};
use crate::models::gpt2::Gpt2Model;
use crate::tokenizer::{Gpt2Tokenizer, TextCodec};

pub const HPARAMS_FILE: &str = "hparams.json";
pub const TOKENIZER_FILE: &str = "tokenizer.json";
const WEIGHT_DTYPE: DType = DType::F32;

/// Where the driver gets hyperparameters, weights and the tokenizer from.
pub trait ModelSource {
    type Codec: TextCodec;

    fn load_hparams(&self, model_name: &str) -> Result<Hparams>;

    fn restore_latest(&self, model_name: &str, hparams: &Hparams, device: &Device) -> Result<Gpt2Model>;

    fn load_codec(&self, model_name: &str) -> Result<Self::Codec>;
}

/// Models laid out as `<root>/<model_name>/{hparams.json, tokenizer.json, *.safetensors}`.
#[derive(Debug, Clone)]
pub struct ModelStore {
    root: PathBuf,
}

impl ModelStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Store rooted at the run's `models_dir`.
    pub fn from_config(config: &RunConfig) -> Self {
        Self::new(&config.models_dir)
    }

    pub fn model_dir(&self, model_name: &str) -> PathBuf {
        self.root.join(model_name)
    }
}

impl ModelSource for ModelStore {
    type Codec = Gpt2Tokenizer;

    fn load_hparams(&self, model_name: &str) -> Result<Hparams> {
        let path = self.model_dir(model_name).join(HPARAMS_FILE);
        let hparams = Hparams::from_json_file(&path)?;
        tracing::info!(
            path = %path.display(),
            n_vocab = hparams.n_vocab,
            n_ctx = hparams.n_ctx,
            n_layer = hparams.n_layer,
            "Loaded hyperparameters"
        );
        Ok(hparams)
    }

    fn restore_latest(&self, model_name: &str, hparams: &Hparams, device: &Device) -> Result<Gpt2Model> {
        let dir = self.model_dir(model_name);
        let path = checkpoint::latest_checkpoint(&dir)?.ok_or_else(|| Error::CheckpointNotFound {
            model: model_name.to_string(),
            dir: dir.clone(),
        })?;

        let weights = checkpoint::load_weights(&path, WEIGHT_DTYPE, device)?;
        let vb = VarBuilder::from_tensors(weights, WEIGHT_DTYPE, device);
        let model = Gpt2Model::new(hparams, vb)?;
        tracing::info!(checkpoint = %path.display(), "Restored model weights");
        Ok(model)
    }

    fn load_codec(&self, model_name: &str) -> Result<Gpt2Tokenizer> {
        let path = self.model_dir(model_name).join(TOKENIZER_FILE);
        let tokenizer = Gpt2Tokenizer::from_file(&path)?;
        tracing::debug!(path = %path.display(), ?tokenizer, "Loaded tokenizer");
        Ok(tokenizer)
    }
}
