use crate::utils::clip_grad::clip_grad;
use candle_core::{Result, Tensor};
use candle_nn::{AdamW, Optimizer, ParamsAdamW, VarMap};
use std::fmt::Debug;

pub struct OptimizerWithMaxGrad {
    pub optimizer: AdamW,
    pub max_grad_norm: Option<f32>,
    pub varmap: VarMap,
}

impl Debug for OptimizerWithMaxGrad {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OptimizerWithMaxGrad")
            .field("optimizer", &self.optimizer)
            .field("max_grad_norm", &self.max_grad_norm)
            .finish()
    }
}

impl OptimizerWithMaxGrad {
    pub fn new(optimizer: AdamW, max_grad_norm: Option<f32>, varmap: VarMap) -> Self {
        Self {
            optimizer,
            max_grad_norm,
            varmap,
        }
    }

    /// AdamW over every variable of `varmap`.
    pub fn adamw(
        varmap: VarMap,
        lr: f64,
        weight_decay: f64,
        max_grad_norm: Option<f32>,
    ) -> Result<Self> {
        let params = ParamsAdamW {
            lr,
            weight_decay,
            ..Default::default()
        };
        let optimizer = AdamW::new(varmap.all_vars(), params)?;
        Ok(Self::new(optimizer, max_grad_norm, varmap))
    }

    pub fn learning_rate(&self) -> f64 {
        self.optimizer.learning_rate()
    }

    pub fn set_learning_rate(&mut self, lr: f64) {
        self.optimizer.set_learning_rate(lr)
    }

    /// Backward pass plus one optimizer step. Returns the gradient norm before clipping when a
    /// bound is configured.
    pub fn backward_step(&mut self, loss: &Tensor) -> Result<Option<f32>> {
        let (grads, norm) = if let Some(max_norm) = self.max_grad_norm {
            let (grads, norm) = clip_grad(loss, &self.varmap, max_norm)?;
            (grads, Some(norm))
        } else {
            (loss.backward()?, None)
        };
        self.optimizer.step(&grads)?;
        Ok(norm)
    }
}
