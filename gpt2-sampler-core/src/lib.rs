//! Batch sampling driver for GPT-2 checkpoints.
//!
//! Loads a model from a directory of hyperparameters, tokenizer and
//! safetensors weights, then prints sampled continuations for an ordered
//! list of prompts.

pub mod config;
pub mod engine;
pub mod error;
pub mod layers;
pub mod model;
pub mod models;
pub mod output;
pub mod prompts;
pub mod sampling_params;
pub mod tokenizer;
pub mod utils;

pub use config::{Hparams, RunConfig};
pub use engine::{run, RunSummary};
pub use error::{Error, Result};
pub use model::{ModelSource, ModelStore};
pub use prompts::PromptSet;
pub use sampling_params::SamplingParams;
pub use tokenizer::{Gpt2Tokenizer, TextCodec};
