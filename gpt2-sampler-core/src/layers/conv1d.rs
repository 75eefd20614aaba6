use candle_core::{Module, Result, Tensor};
use candle_nn::{Init, VarBuilder};

const INIT_STDEV: f64 = 0.02;

/// GPT-2's projection layer: a linear map whose weight is stored as
/// `[in, out]` rather than the usual `[out, in]`.
#[derive(Debug, Clone)]
pub struct Conv1D {
    weight: Tensor,
    bias: Tensor,
}

impl Conv1D {
    pub fn new(nx: usize, nf: usize, vb: VarBuilder) -> Result<Self> {
        let weight = vb.get_with_hints(
            (nx, nf),
            "weight",
            Init::Randn {
                mean: 0.0,
                stdev: INIT_STDEV,
            },
        )?;
        let bias = vb.get_with_hints(nf, "bias", Init::Const(0.0))?;
        Ok(Self { weight, bias })
    }
}

impl Module for Conv1D {
    fn forward(&self, xs: &Tensor) -> Result<Tensor> {
        xs.broadcast_matmul(&self.weight)?.broadcast_add(&self.bias)
    }
}
