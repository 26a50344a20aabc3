use candle_core::{D, IndexOp, Module, Result, Tensor};
use candle_nn::{
    Conv1d, Conv1dConfig, Init, LayerNorm, Linear, VarBuilder, conv1d, layer_norm, linear,
    linear_no_bias, ops::silu,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct MambaConfig {
    pub d_model: usize,
    pub d_state: usize,
    pub d_conv: usize,
    pub expand: usize,
}

impl MambaConfig {
    pub fn new(d_model: usize) -> Self {
        Self {
            d_model,
            d_state: 16,
            d_conv: 4,
            expand: 2,
        }
    }

    pub fn d_inner(&self) -> usize {
        self.expand * self.d_model
    }

    pub fn dt_rank(&self) -> usize {
        self.d_model.div_ceil(16)
    }
}

fn softplus(xs: &Tensor) -> Result<Tensor> {
    (xs.exp()? + 1.)?.log()
}

/// Selective state space mixer: the step size and the B/C projections depend on the input,
/// A is diagonal and input independent.
#[derive(Debug, Clone)]
pub struct MambaBlock {
    in_proj: Linear,
    conv1d: Conv1d,
    x_proj: Linear,
    dt_proj: Linear,
    a_log: Tensor,
    a_base: Tensor,
    d: Tensor,
    out_proj: Linear,
    config: MambaConfig,
}

impl MambaBlock {
    pub fn new(config: MambaConfig, vb: VarBuilder) -> Result<Self> {
        let d_inner = config.d_inner();
        let dt_rank = config.dt_rank();
        let in_proj = linear_no_bias(config.d_model, 2 * d_inner, vb.pp("in_proj"))?;
        let conv_config = Conv1dConfig {
            padding: config.d_conv - 1,
            groups: d_inner,
            ..Default::default()
        };
        let conv1d = conv1d(d_inner, d_inner, config.d_conv, conv_config, vb.pp("conv1d"))?;
        let x_proj = linear_no_bias(d_inner, dt_rank + 2 * config.d_state, vb.pp("x_proj"))?;
        let dt_proj = linear(dt_rank, d_inner, vb.pp("dt_proj"))?;
        // A = -exp(a_log) * [1, 2, .., d_state], a_log starts at zero
        let a_log = vb.get_with_hints((d_inner, config.d_state), "a_log", Init::Const(0.))?;
        let a_base =
            Tensor::arange(1f32, (config.d_state + 1) as f32, vb.device())?.unsqueeze(0)?;
        let d = vb.get_with_hints(d_inner, "d", Init::Const(1.))?;
        let out_proj = linear_no_bias(d_inner, config.d_model, vb.pp("out_proj"))?;
        Ok(Self {
            in_proj,
            conv1d,
            x_proj,
            dt_proj,
            a_log,
            a_base,
            d,
            out_proj,
            config,
        })
    }

    fn ssm(&self, xs: &Tensor) -> Result<Tensor> {
        let (dt_rank, n) = (self.config.dt_rank(), self.config.d_state);
        let a = self.a_log.exp()?.broadcast_mul(&self.a_base)?.neg()?;
        let x_dbl = self.x_proj.forward(xs)?;
        let delta = x_dbl.narrow(D::Minus1, 0, dt_rank)?;
        let b = x_dbl.narrow(D::Minus1, dt_rank, n)?;
        let c = x_dbl.narrow(D::Minus1, dt_rank + n, n)?;
        let delta = softplus(&self.dt_proj.forward(&delta.contiguous()?)?)?;
        selective_scan(xs, &delta, &a, &b, &c, &self.d)
    }
}

/// Sequential scan over the time axis.
///
/// xs, delta: [B, L, d_inner], a: [d_inner, N], b, c: [B, L, N], d: [d_inner].
pub fn selective_scan(
    xs: &Tensor,
    delta: &Tensor,
    a: &Tensor,
    b: &Tensor,
    c: &Tensor,
    d: &Tensor,
) -> Result<Tensor> {
    let (batch, len, d_inner) = xs.dims3()?;
    let n = a.dim(1)?;
    let mut h = Tensor::zeros((batch, d_inner, n), xs.dtype(), xs.device())?;
    let mut ys = Vec::with_capacity(len);
    for t in 0..len {
        let delta_t = delta.i((.., t))?.unsqueeze(2)?;
        let x_t = xs.i((.., t))?.unsqueeze(2)?;
        let b_t = b.i((.., t))?.unsqueeze(1)?;
        let c_t = c.i((.., t))?.unsqueeze(2)?.contiguous()?;
        let delta_a = delta_t.broadcast_mul(a)?.exp()?;
        let delta_b_x = delta_t.broadcast_mul(&b_t)?.broadcast_mul(&x_t)?;
        h = ((delta_a * &h)? + delta_b_x)?;
        ys.push(h.matmul(&c_t)?.squeeze(2)?);
    }
    let ys = Tensor::stack(&ys, 1)?;
    ys + xs.broadcast_mul(d)?
}

impl Module for MambaBlock {
    fn forward(&self, xs: &Tensor) -> Result<Tensor> {
        let (_, len, _) = xs.dims3()?;
        let d_inner = self.config.d_inner();
        let xz = self.in_proj.forward(xs)?;
        let x = xz.narrow(D::Minus1, 0, d_inner)?;
        let z = xz.narrow(D::Minus1, d_inner, d_inner)?;
        // causal depthwise conv over time, the right hand overhang is dropped
        let x = x.transpose(1, 2)?.contiguous()?;
        let x = self.conv1d.forward(&x)?.narrow(2, 0, len)?;
        let x = silu(&x.transpose(1, 2)?.contiguous()?)?;
        let ys = self.ssm(&x)?;
        let ys = (ys * silu(&z)?)?;
        self.out_proj.forward(&ys)
    }
}

/// Pre-norm residual wrapper.
#[derive(Debug, Clone)]
pub struct ResidualBlock {
    norm: LayerNorm,
    mixer: MambaBlock,
}

impl ResidualBlock {
    pub fn new(config: MambaConfig, vb: VarBuilder) -> Result<Self> {
        let norm = layer_norm(config.d_model, 1e-5, vb.pp("norm"))?;
        let mixer = MambaBlock::new(config, vb.pp("mixer"))?;
        Ok(Self { norm, mixer })
    }
}

impl Module for ResidualBlock {
    fn forward(&self, xs: &Tensor) -> Result<Tensor> {
        xs + self.mixer.forward(&self.norm.forward(xs)?)?
    }
}
