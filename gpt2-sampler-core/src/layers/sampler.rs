//! Token sampler.
//!
//! Applies temperature scaling, then either nucleus (top-p) or top-k
//! filtering, and draws from the remaining distribution with the sampler's
//! own seeded generator.

use std::cmp::Ordering;

use candle_core::Tensor;
use rand::distributions::{Distribution, WeightedIndex};
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::error::{Error, Result};
use crate::sampling_params::SamplingParams;

pub struct Sampler {
    params: SamplingParams,
    rng: StdRng,
}

impl Sampler {
    /// `None` seeds from OS entropy.
    pub fn new(params: SamplingParams, seed: Option<u64>) -> Self {
        let rng = seed.map_or_else(StdRng::from_entropy, StdRng::seed_from_u64);
        Self { params, rng }
    }

    /// Sample one token per row of a `[batch, vocab]` logits tensor.
    pub fn batch_sample(&mut self, logits: &Tensor) -> Result<Vec<u32>> {
        let rows = logits.to_dtype(candle_core::DType::F32)?.to_vec2::<f32>()?;
        rows.iter().map(|row| self.sample(row)).collect()
    }

    pub fn sample(&mut self, logits: &[f32]) -> Result<u32> {
        if logits.is_empty() {
            return Err(Error::Sampling("empty logits".into()));
        }
        if self.params.is_greedy() {
            return Ok(argmax(logits));
        }

        let scaled: Vec<f32> = logits.iter().map(|&l| l / self.params.temperature).collect();
        let threshold = if self.params.top_p > 0.0 {
            top_p_threshold(&scaled, self.params.top_p)
        } else if self.params.top_k > 0 {
            top_k_threshold(&scaled, self.params.top_k)
        } else {
            f32::NEG_INFINITY
        };

        let max = scaled.iter().copied().fold(f32::NEG_INFINITY, f32::max);
        let weights: Vec<f32> = scaled
            .iter()
            .map(|&l| if l >= threshold { (l - max).exp() } else { 0.0 })
            .collect();

        let dist = WeightedIndex::new(&weights).map_err(|e| Error::Sampling(e.to_string()))?;
        Ok(dist.sample(&mut self.rng) as u32)
    }
}

impl std::fmt::Debug for Sampler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sampler")
            .field("params", &self.params)
            .finish_non_exhaustive()
    }
}

fn argmax(logits: &[f32]) -> u32 {
    logits
        .iter()
        .enumerate()
        .max_by(|(_, a), (_, b)| a.partial_cmp(b).unwrap_or(Ordering::Equal))
        .map_or(0, |(i, _)| i as u32)
}

fn sorted_desc(logits: &[f32]) -> Vec<f32> {
    let mut sorted = logits.to_vec();
    sorted.sort_by(|a, b| b.partial_cmp(a).unwrap_or(Ordering::Equal));
    sorted
}

/// Smallest logit that survives top-k. Ties with the k-th value are kept.
fn top_k_threshold(logits: &[f32], k: usize) -> f32 {
    let sorted = sorted_desc(logits);
    sorted[k.min(sorted.len()) - 1]
}

/// Smallest logit that survives nucleus filtering: the last position whose
/// cumulative probability is still `<= p`, and never less than the top token.
fn top_p_threshold(logits: &[f32], p: f32) -> f32 {
    let sorted = sorted_desc(logits);
    let max = sorted[0];
    let exp: Vec<f32> = sorted.iter().map(|&l| (l - max).exp()).collect();
    let sum: f32 = exp.iter().sum();

    let mut cumulative = 0.0;
    let mut within = 0usize;
    for e in &exp {
        cumulative += e / sum;
        if cumulative <= p {
            within += 1;
        } else {
            break;
        }
    }
    sorted[within.saturating_sub(1)]
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::Device;

    fn sampler(params: SamplingParams) -> Sampler {
        Sampler::new(params, Some(42))
    }

    #[test]
    fn test_greedy_sampling() {
        let mut s = sampler(SamplingParams::default().with_temperature(0.0));
        let logits = [1.0, 2.0, 5.0, 0.5, 3.0];
        assert_eq!(s.sample(&logits).unwrap(), 2);
        assert_eq!(s.sample(&logits).unwrap(), 2);
    }

    #[test]
    fn test_top_k_keeps_only_k_best() {
        let mut s = sampler(SamplingParams::default().with_top_k(2));
        let logits = [0.1, 5.0, 4.0, 0.2];
        for _ in 0..200 {
            let t = s.sample(&logits).unwrap();
            assert!(t == 1 || t == 2, "token {t} not in top-2");
        }
    }

    #[test]
    fn test_top_k_one_is_deterministic() {
        let mut s = sampler(SamplingParams::default().with_top_k(1));
        let logits = [0.3, 0.1, 0.9, 0.2];
        for _ in 0..20 {
            assert_eq!(s.sample(&logits).unwrap(), 2);
        }
    }

    #[test]
    fn test_top_p_overrides_top_k() {
        // Token 2 alone carries ~0.99 of the mass; top_k=4 would allow all.
        let mut s = sampler(SamplingParams::default().with_top_k(4).with_top_p(0.5));
        let logits = [0.0, 0.0, 10.0, 0.0];
        for _ in 0..100 {
            assert_eq!(s.sample(&logits).unwrap(), 2);
        }
    }

    #[test]
    fn test_top_p_threshold_keeps_prefix_within_mass() {
        // probabilities 0.5, 0.25, 0.125, 0.125
        let l = [2f32.ln() * 2.0, 2f32.ln(), 0.0, 0.0];
        assert_eq!(top_p_threshold(&l, 0.8), l[1]);
        assert_eq!(top_p_threshold(&l, 0.1), l[0]);
        assert_eq!(top_p_threshold(&l, 1.0), l[3]);
    }

    #[test]
    fn test_top_k_threshold_clamps_to_len() {
        assert_eq!(top_k_threshold(&[3.0, 1.0, 2.0], 10), 1.0);
        assert_eq!(top_k_threshold(&[3.0, 1.0, 2.0], 2), 2.0);
    }

    #[test]
    fn test_determinism_with_seed() {
        let params = SamplingParams::default().with_temperature(0.7);
        let mut a = Sampler::new(params.clone(), Some(12345));
        let mut b = Sampler::new(params, Some(12345));
        let logits = [1.0, 2.0, 3.0, 2.5, 1.5];
        for _ in 0..32 {
            assert_eq!(a.sample(&logits).unwrap(), b.sample(&logits).unwrap());
        }
    }

    #[test]
    fn test_batch_sample_one_token_per_row() {
        let mut s = sampler(SamplingParams::default().with_temperature(0.0));
        let logits = Tensor::new(&[[0.0f32, 1.0, 0.5], [2.0, 0.0, 0.1]], &Device::Cpu).unwrap();
        assert_eq!(s.batch_sample(&logits).unwrap(), vec![1, 0]);
    }

    #[test]
    fn test_empty_logits_is_an_error() {
        let mut s = sampler(SamplingParams::default());
        assert!(matches!(s.sample(&[]), Err(Error::Sampling(_))));
    }
}
