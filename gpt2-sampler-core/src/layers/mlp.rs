use candle_core::{Module, Result, Tensor};
use candle_nn::VarBuilder;

use crate::layers::conv1d::Conv1D;

/// Position-wise feed-forward block: expand by 4, tanh-GELU, project back.
#[derive(Debug, Clone)]
pub struct Mlp {
    c_fc: Conv1D,
    c_proj: Conv1D,
}

impl Mlp {
    pub fn new(n_embd: usize, vb: VarBuilder) -> Result<Self> {
        let n_state = 4 * n_embd;
        Ok(Self {
            c_fc: Conv1D::new(n_embd, n_state, vb.pp("c_fc"))?,
            c_proj: Conv1D::new(n_state, n_embd, vb.pp("c_proj"))?,
        })
    }
}

impl Module for Mlp {
    fn forward(&self, xs: &Tensor) -> Result<Tensor> {
        let h = self.c_fc.forward(xs)?.gelu()?;
        self.c_proj.forward(&h)
    }
}
