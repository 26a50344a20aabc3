use candle_core::{Result, Tensor};

#[derive(Debug, Clone)]
pub struct Predictions {
    /// [B, K, state_size]
    pub state_preds: Tensor,
    /// [B, K, action_size], in the normalized action range
    pub action_preds: Tensor,
    /// [B, K, 1]
    pub reward_preds: Tensor,
}

/// The sequence model seen from the training loop and the rollout engine.
///
/// `rewards` carries the subgoal channel of a training batch and is `None` during rollouts. The
/// asymmetry is part of the contract, implementations must not expect the channel at evaluation
/// time.
pub trait SequencePredictor {
    fn forward(
        &self,
        states: &Tensor,
        actions: &Tensor,
        rewards: Option<&Tensor>,
        returns_to_go: &Tensor,
    ) -> Result<Predictions>;
}

impl<P: SequencePredictor + ?Sized> SequencePredictor for &P {
    fn forward(
        &self,
        states: &Tensor,
        actions: &Tensor,
        rewards: Option<&Tensor>,
        returns_to_go: &Tensor,
    ) -> Result<Predictions> {
        (**self).forward(states, actions, rewards, returns_to_go)
    }
}
