//! Batched autoregressive sampling.
//!
//! The generator is built once per run from the sampling controls and then
//! driven against a restored model for every batch.

use candle_core::{IndexOp, Tensor};
use ndarray::Array2;

use crate::error::{Error, Result};
use crate::layers::sampler::Sampler;
use crate::models::gpt2::Gpt2Model;

#[derive(Debug)]
pub struct SequenceGenerator {
    sampler: Sampler,
    length: usize,
    batch_size: usize,
}

impl SequenceGenerator {
    pub fn new(sampler: Sampler, length: usize, batch_size: usize) -> Self {
        Self {
            sampler,
            length,
            batch_size,
        }
    }

    /// Sample `length` tokens after a `[batch_size, L]` context and return
    /// the `[batch_size, L + length]` batch including the context.
    pub fn sample_sequence(&mut self, model: &Gpt2Model, context: &Array2<u32>) -> Result<Array2<u32>> {
        let (rows, context_len) = context.dim();
        if rows != self.batch_size {
            return Err(Error::invalid(format!(
                "context has {rows} rows, generator is bound to batch size {}",
                self.batch_size
            )));
        }
        if context_len == 0 {
            return Err(Error::invalid("context must hold at least one token"));
        }

        let mut tokens: Vec<Vec<u32>> = context.rows().into_iter().map(|r| r.to_vec()).collect();
        if self.length == 0 {
            return to_batch(tokens);
        }

        let device = model.device();
        let mut cache = model.new_cache();
        let input = Tensor::from_iter(context.iter().copied(), device)?.reshape((rows, context_len))?;
        let mut logits = model.forward(&input, &mut cache)?;

        for step in 0..self.length {
            let last = logits.dim(1)? - 1;
            let next = self.sampler.batch_sample(&logits.i((.., last, ..))?)?;
            for (row, &token) in tokens.iter_mut().zip(&next) {
                row.push(token);
            }
            if step + 1 < self.length {
                let input = Tensor::from_vec(next, (rows, 1), device)?;
                logits = model.forward(&input, &mut cache)?;
            }
        }
        to_batch(tokens)
    }
}

fn to_batch(tokens: Vec<Vec<u32>>) -> Result<Array2<u32>> {
    let rows = tokens.len();
    let cols = tokens.first().map_or(0, Vec::len);
    Ok(Array2::from_shape_vec((rows, cols), tokens.concat())?)
}
