use candle_core::{Device, Module, Result, Tensor};
use candle_nn::VarBuilder;

use crate::layers::conv1d::Conv1D;

const MASKED: f32 = -1e10;

/// Keys and values of earlier positions, each `[batch, heads, past, head_dim]`.
pub type LayerPast = (Tensor, Tensor);

/// Causal multi-head self-attention with fused q/k/v projection.
#[derive(Debug, Clone)]
pub struct CausalSelfAttention {
    c_attn: Conv1D,
    c_proj: Conv1D,
    n_head: usize,
    n_embd: usize,
}

impl CausalSelfAttention {
    pub fn new(n_embd: usize, n_head: usize, vb: VarBuilder) -> Result<Self> {
        Ok(Self {
            c_attn: Conv1D::new(n_embd, 3 * n_embd, vb.pp("c_attn"))?,
            c_proj: Conv1D::new(n_embd, n_embd, vb.pp("c_proj"))?,
            n_head,
            n_embd,
        })
    }

    /// Attend over `past` followed by `xs`; returns the output and the
    /// extended key/value pair.
    pub fn forward(&self, xs: &Tensor, past: Option<&LayerPast>) -> Result<(Tensor, LayerPast)> {
        let (b, t, c) = xs.dims3()?;
        let head_dim = self.n_embd / self.n_head;
        let split_heads = |x: Tensor| -> Result<Tensor> {
            x.reshape((b, t, self.n_head, head_dim))?
                .transpose(1, 2)?
                .contiguous()
        };

        let qkv = self.c_attn.forward(xs)?;
        let q = split_heads(qkv.narrow(2, 0, c)?)?;
        let k = split_heads(qkv.narrow(2, c, c)?)?;
        let v = split_heads(qkv.narrow(2, 2 * c, c)?)?;

        let (k, v) = match past {
            Some((pk, pv)) => (Tensor::cat(&[pk, &k], 2)?, Tensor::cat(&[pv, &v], 2)?),
            None => (k, v),
        };
        let total = k.dim(2)?;

        let scale = 1.0 / (head_dim as f64).sqrt();
        let mut w = (q.matmul(&k.t()?.contiguous()?)? * scale)?;
        if t > 1 {
            let mask = causal_mask(t, total, xs.device())?.to_dtype(w.dtype())?;
            w = w.broadcast_add(&mask)?;
        }
        let w = candle_nn::ops::softmax_last_dim(&w)?;

        let a = w.matmul(&v)?.transpose(1, 2)?.reshape((b, t, c))?;
        Ok((self.c_proj.forward(&a)?, (k, v)))
    }
}

/// `[t, total]` additive mask: query `i` may see key `j` iff
/// `j <= i + (total - t)`.
fn causal_mask(t: usize, total: usize, device: &Device) -> Result<Tensor> {
    let offset = total - t;
    let mask: Vec<f32> = (0..t)
        .flat_map(|i| (0..total).map(move |j| if j <= i + offset { 0.0 } else { MASKED }))
        .collect();
    Tensor::from_vec(mask, (t, total), device)
}
