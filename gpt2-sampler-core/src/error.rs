use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("No checkpoint found for model '{model}' in {dir}")]
    CheckpointNotFound { model: String, dir: PathBuf },

    #[error("Failed to load hyperparameters from {path}: {reason}")]
    HyperparameterLoad { path: PathBuf, reason: String },

    #[error("Failed to load tokenizer: {0}")]
    TokenizerLoad(String),

    #[error("Tokenization failed: {0}")]
    Tokenization(String),

    #[error("Sampling failed: {0}")]
    Sampling(String),

    #[error("Invalid prompt set: {0}")]
    Prompts(String),

    #[error("Candle error: {0}")]
    Candle(#[from] candle_core::Error),

    #[error("Shape error: {0}")]
    Shape(#[from] ndarray::ShapeError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    pub(crate) fn hparams(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::HyperparameterLoad {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
