//! GPT-2 decoder stack.
//!
//! Weight names follow the Hugging Face layout (`wte`, `wpe`, `h.{i}.*`,
//! `ln_f`); the output head is tied to the token embedding.

use candle_core::{Device, Module, Result, Tensor};
use candle_nn::{embedding, layer_norm, Embedding, LayerNorm, VarBuilder};

use crate::config::{settings, Hparams};
use crate::layers::attention::{CausalSelfAttention, LayerPast};
use crate::layers::mlp::Mlp;

#[derive(Debug, Clone)]
pub struct Block {
    ln_1: LayerNorm,
    attn: CausalSelfAttention,
    ln_2: LayerNorm,
    mlp: Mlp,
}

impl Block {
    pub fn new(hparams: &Hparams, vb: VarBuilder) -> Result<Self> {
        let n_embd = hparams.n_embd;
        Ok(Self {
            ln_1: layer_norm(n_embd, settings::LAYER_NORM_EPS, vb.pp("ln_1"))?,
            attn: CausalSelfAttention::new(n_embd, hparams.n_head, vb.pp("attn"))?,
            ln_2: layer_norm(n_embd, settings::LAYER_NORM_EPS, vb.pp("ln_2"))?,
            mlp: Mlp::new(n_embd, vb.pp("mlp"))?,
        })
    }

    pub fn forward(&self, xs: &Tensor, past: Option<&LayerPast>) -> Result<(Tensor, LayerPast)> {
        let (a, present) = self.attn.forward(&self.ln_1.forward(xs)?, past)?;
        let xs = (xs + a)?;
        let m = self.mlp.forward(&self.ln_2.forward(&xs)?)?;
        Ok(((xs + m)?, present))
    }
}

/// Per-layer key/value state carried between decoding steps.
#[derive(Debug, Clone, Default)]
pub struct KvCache {
    layers: Vec<Option<LayerPast>>,
}

impl KvCache {
    pub fn new(n_layer: usize) -> Self {
        Self {
            layers: vec![None; n_layer],
        }
    }

    /// Number of positions already attended over.
    pub fn past_len(&self) -> usize {
        self.layers
            .first()
            .and_then(|l| l.as_ref())
            .and_then(|(k, _)| k.dim(2).ok())
            .unwrap_or(0)
    }

}

#[derive(Debug)]
pub struct Gpt2Model {
    wte: Embedding,
    wpe: Embedding,
    blocks: Vec<Block>,
    ln_f: LayerNorm,
    hparams: Hparams,
    device: Device,
}

impl Gpt2Model {
    pub fn new(hparams: &Hparams, vb: VarBuilder) -> Result<Self> {
        let wte = embedding(hparams.n_vocab, hparams.n_embd, vb.pp("wte"))?;
        let wpe = embedding(hparams.n_ctx, hparams.n_embd, vb.pp("wpe"))?;
        let vb_h = vb.pp("h");
        let blocks = (0..hparams.n_layer)
            .map(|i| Block::new(hparams, vb_h.pp(i)))
            .collect::<Result<Vec<_>>>()?;
        let ln_f = layer_norm(hparams.n_embd, settings::LAYER_NORM_EPS, vb.pp("ln_f"))?;
        Ok(Self {
            wte,
            wpe,
            blocks,
            ln_f,
            hparams: hparams.clone(),
            device: vb.device().clone(),
        })
    }

    /// Run `[batch, t]` token ids positioned after whatever `cache` already
    /// holds and return `[batch, t, n_vocab]` logits.
    pub fn forward(&self, input_ids: &Tensor, cache: &mut KvCache) -> Result<Tensor> {
        let (_b, t) = input_ids.dims2()?;
        let past_len = cache.past_len();
        if past_len + t > self.hparams.n_ctx {
            candle_core::bail!(
                "sequence of {} tokens exceeds context window of {}",
                past_len + t,
                self.hparams.n_ctx
            );
        }

        let positions = Tensor::arange(past_len as u32, (past_len + t) as u32, &self.device)?;
        let pos_emb = self.wpe.forward(&positions)?;
        let mut xs = self.wte.forward(input_ids)?.broadcast_add(&pos_emb)?;

        for (block, past) in self.blocks.iter().zip(cache.layers.iter_mut()) {
            let (out, present) = block.forward(&xs, past.as_ref())?;
            *past = Some(present);
            xs = out;
        }

        let xs = self.ln_f.forward(&xs)?;
        xs.broadcast_matmul(&self.wte.embeddings().t()?)
    }

    pub fn new_cache(&self) -> KvCache {
        KvCache::new(self.hparams.n_layer)
    }

    pub fn device(&self) -> &Device {
        &self.device
    }
}
