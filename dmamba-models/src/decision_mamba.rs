use crate::mamba::{MambaConfig, ResidualBlock};
use candle_core::{IndexOp, Module, Result, Tensor};
use candle_nn::{LayerNorm, Linear, VarBuilder, layer_norm, linear};
use dmamba_core::predictor::{Predictions, SequencePredictor};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct DecisionMambaConfig {
    pub state_size: usize,
    pub action_size: usize,
    pub d_model: usize,
    pub n_layer: usize,
    pub d_state: usize,
    pub d_conv: usize,
    pub expand: usize,
}

impl DecisionMambaConfig {
    pub fn new(state_size: usize, action_size: usize, d_model: usize, n_layer: usize) -> Self {
        let mamba = MambaConfig::new(d_model);
        Self {
            state_size,
            action_size,
            d_model,
            n_layer,
            d_state: mamba.d_state,
            d_conv: mamba.d_conv,
            expand: mamba.expand,
        }
    }

    pub fn mamba_config(&self) -> MambaConfig {
        MambaConfig {
            d_model: self.d_model,
            d_state: self.d_state,
            d_conv: self.d_conv,
            expand: self.expand,
        }
    }

    pub fn build(&self, vb: VarBuilder) -> Result<DecisionMamba> {
        DecisionMamba::new(*self, vb)
    }
}

/// Sequence model over interleaved (return-to-go, state, action) tokens. The action head reads
/// the state tokens, so the action predicted at step t never sees a_t itself.
#[derive(Debug, Clone)]
pub struct DecisionMamba {
    embed_return: Linear,
    embed_reward: Linear,
    embed_state: Linear,
    embed_action: Linear,
    embed_ln: LayerNorm,
    blocks: Vec<ResidualBlock>,
    norm_f: LayerNorm,
    predict_state: Linear,
    predict_action: Linear,
    predict_reward: Linear,
    pub config: DecisionMambaConfig,
}

impl DecisionMamba {
    pub fn new(config: DecisionMambaConfig, vb: VarBuilder) -> Result<Self> {
        let d_model = config.d_model;
        let blocks = (0..config.n_layer)
            .map(|idx| ResidualBlock::new(config.mamba_config(), vb.pp(format!("layers.{idx}"))))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            embed_return: linear(1, d_model, vb.pp("embed_return"))?,
            embed_reward: linear(1, d_model, vb.pp("embed_reward"))?,
            embed_state: linear(config.state_size, d_model, vb.pp("embed_state"))?,
            embed_action: linear(config.action_size, d_model, vb.pp("embed_action"))?,
            embed_ln: layer_norm(d_model, 1e-5, vb.pp("embed_ln"))?,
            blocks,
            norm_f: layer_norm(d_model, 1e-5, vb.pp("norm_f"))?,
            predict_state: linear(d_model, config.state_size, vb.pp("predict_state"))?,
            predict_action: linear(d_model, config.action_size, vb.pp("predict_action"))?,
            predict_reward: linear(d_model, 1, vb.pp("predict_reward"))?,
            config,
        })
    }
}

impl SequencePredictor for DecisionMamba {
    fn forward(
        &self,
        states: &Tensor,
        actions: &Tensor,
        rewards: Option<&Tensor>,
        returns_to_go: &Tensor,
    ) -> Result<Predictions> {
        let (b, k, _) = states.dims3()?;
        let d_model = self.config.d_model;
        let state_embeddings = self.embed_state.forward(states)?;
        let action_embeddings = self.embed_action.forward(actions)?;
        let mut return_embeddings = self.embed_return.forward(returns_to_go)?;
        if let Some(rewards) = rewards {
            return_embeddings = (return_embeddings + self.embed_reward.forward(rewards)?)?;
        }

        // [R_0, s_0, a_0, R_1, s_1, a_1, ..]
        let tokens = Tensor::stack(
            &[return_embeddings, state_embeddings, action_embeddings],
            2,
        )?
        .reshape((b, 3 * k, d_model))?;
        let mut xs = self.embed_ln.forward(&tokens)?;
        for block in &self.blocks {
            xs = block.forward(&xs)?;
        }
        let xs = self.norm_f.forward(&xs)?.reshape((b, k, 3, d_model))?;
        let state_tokens = xs.i((.., .., 1))?.contiguous()?;
        let action_tokens = xs.i((.., .., 2))?.contiguous()?;

        Ok(Predictions {
            state_preds: self.predict_state.forward(&action_tokens)?,
            action_preds: self.predict_action.forward(&state_tokens)?.tanh()?,
            reward_preds: self.predict_reward.forward(&action_tokens)?,
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use candle_core::{DType, Device};
    use candle_nn::VarMap;

    fn model(device: &Device) -> Result<(DecisionMamba, VarMap)> {
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, device);
        let model = DecisionMambaConfig::new(5, 2, 16, 2).build(vb)?;
        Ok((model, varmap))
    }

    fn inputs(device: &Device, k: usize) -> Result<(Tensor, Tensor, Tensor, Tensor)> {
        Ok((
            Tensor::randn(0f32, 1., (3, k, 5), device)?,
            Tensor::randn(0f32, 1., (3, k, 2), device)?,
            Tensor::randn(0f32, 1., (3, k, 1), device)?,
            Tensor::randn(0f32, 1., (3, k, 1), device)?,
        ))
    }

    #[test]
    fn prediction_shapes() -> Result<()> {
        let device = Device::Cpu;
        let (model, _) = model(&device)?;
        let (states, actions, rewards, rtg) = inputs(&device, 7)?;
        for rewards in [Some(&rewards), None] {
            let preds = model.forward(&states, &actions, rewards, &rtg)?;
            assert_eq!(preds.state_preds.dims(), &[3, 7, 5]);
            assert_eq!(preds.action_preds.dims(), &[3, 7, 2]);
            assert_eq!(preds.reward_preds.dims(), &[3, 7, 1]);
            let max = preds.action_preds.abs()?.max_all()?.to_scalar::<f32>()?;
            assert!(max <= 1.);
        }
        Ok(())
    }

    #[test]
    fn action_at_t_does_not_see_its_own_action() -> Result<()> {
        let device = Device::Cpu;
        let (model, _) = model(&device)?;
        let (states, actions, _, rtg) = inputs(&device, 4)?;
        let changed = Tensor::cat(
            &[
                actions.narrow(1, 0, 3)?,
                Tensor::randn(0f32, 1., (3, 1, 2), &device)?,
            ],
            1,
        )?;
        let preds = model.forward(&states, &actions, None, &rtg)?.action_preds;
        let preds_changed = model.forward(&states, &changed, None, &rtg)?.action_preds;
        let diff = (preds - preds_changed)?.abs()?.max_all()?.to_scalar::<f32>()?;
        assert!(diff < 1e-5);
        Ok(())
    }

    #[test]
    fn parameters_live_in_the_varmap() -> Result<()> {
        let (_, varmap) = model(&Device::Cpu)?;
        assert!(!varmap.all_vars().is_empty());
        let data = varmap.data().lock().unwrap();
        assert!(data.contains_key("layers.1.mixer.a_log"));
        assert!(data.contains_key("embed_reward.weight"));
        Ok(())
    }
}
