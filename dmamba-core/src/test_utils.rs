use crate::{
    dataset::Trajectory,
    env::{Env, EnvironmentDescription, SnapShot, Space},
    predictor::{Predictions, SequencePredictor},
};
use candle_core::{DType, Result, Tensor};
use rand::{Rng, SeedableRng, rngs::StdRng};
use std::cell::RefCell;

/// Pays a constant reward and terminates after a fixed number of steps. The state after step `t`
/// is `t` repeated in every dimension. Every received action is kept.
pub struct ConstantRewardEnv {
    pub reward: f32,
    pub episode_len: usize,
    pub state_size: usize,
    pub action_size: usize,
    pub t: usize,
    pub received_actions: Vec<Vec<f32>>,
    pub emitted_states: Vec<Vec<f32>>,
}

impl ConstantRewardEnv {
    pub fn new(reward: f32, episode_len: usize, state_size: usize, action_size: usize) -> Self {
        Self {
            reward,
            episode_len,
            state_size,
            action_size,
            t: 0,
            received_actions: vec![],
            emitted_states: vec![],
        }
    }

    fn emit(&mut self, value: f32) -> Vec<f32> {
        let state = vec![value; self.state_size];
        self.emitted_states.push(state.clone());
        state
    }
}

impl Env for ConstantRewardEnv {
    fn reset(&mut self, _seed: u64) -> Result<Vec<f32>> {
        self.t = 0;
        Ok(self.emit(0.))
    }

    fn step(&mut self, action: &[f32]) -> Result<SnapShot> {
        self.received_actions.push(action.to_vec());
        self.t += 1;
        let state = self.emit(self.t as f32);
        Ok(SnapShot {
            state,
            reward: self.reward,
            terminated: self.t >= self.episode_len,
            trancuated: false,
        })
    }

    fn env_description(&self) -> EnvironmentDescription {
        EnvironmentDescription::new(
            Space::continous_from_dims(vec![self.state_size]),
            Space::Continous {
                min: Some(vec![-1.; self.action_size]),
                max: Some(vec![1.; self.action_size]),
                size: self.action_size,
            },
        )
    }
}

/// Predicts the same action everywhere.
pub struct ConstantActionPredictor {
    pub value: f32,
    pub state_size: usize,
    pub action_size: usize,
}

impl ConstantActionPredictor {
    pub fn zeros(state_size: usize, action_size: usize) -> Self {
        Self {
            value: 0.,
            state_size,
            action_size,
        }
    }
}

impl SequencePredictor for ConstantActionPredictor {
    fn forward(
        &self,
        states: &Tensor,
        _actions: &Tensor,
        _rewards: Option<&Tensor>,
        _returns_to_go: &Tensor,
    ) -> Result<Predictions> {
        let (b, k, _) = states.dims3()?;
        let device = states.device();
        Ok(Predictions {
            state_preds: Tensor::zeros((b, k, self.state_size), DType::F32, device)?,
            action_preds: Tensor::full(self.value, (b, k, self.action_size), device)?,
            reward_preds: Tensor::zeros((b, k, 1), DType::F32, device)?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub states: Tensor,
    pub actions: Tensor,
    pub rewards: Option<Tensor>,
    pub returns_to_go: Tensor,
}

/// Wraps a predictor and keeps every input it was given.
pub struct RecordingPredictor<P: SequencePredictor> {
    pub inner: P,
    pub calls: RefCell<Vec<RecordedCall>>,
}

impl<P: SequencePredictor> RecordingPredictor<P> {
    pub fn new(inner: P) -> Self {
        Self {
            inner,
            calls: RefCell::new(vec![]),
        }
    }
}

impl<P: SequencePredictor> SequencePredictor for RecordingPredictor<P> {
    fn forward(
        &self,
        states: &Tensor,
        actions: &Tensor,
        rewards: Option<&Tensor>,
        returns_to_go: &Tensor,
    ) -> Result<Predictions> {
        self.calls.borrow_mut().push(RecordedCall {
            states: states.clone(),
            actions: actions.clone(),
            rewards: rewards.cloned(),
            returns_to_go: returns_to_go.clone(),
        });
        self.inner.forward(states, actions, rewards, returns_to_go)
    }
}

/// Random trajectories with lengths in `min_len..=max_len` and actions in [-1, 1].
pub fn toy_trajectories(
    count: usize,
    min_len: usize,
    max_len: usize,
    state_size: usize,
    action_size: usize,
    seed: u64,
) -> Vec<Trajectory> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..count)
        .map(|_| {
            let len = rng.random_range(min_len..=max_len);
            let states = (0..len)
                .map(|_| (0..state_size).map(|_| rng.random_range(-2f32..2.)).collect())
                .collect();
            let actions = (0..len)
                .map(|_| (0..action_size).map(|_| rng.random_range(-1f32..1.)).collect())
                .collect();
            let rewards = (0..len).map(|_| rng.random_range(0f32..1.)).collect();
            Trajectory::new(states, actions, rewards)
        })
        .collect()
}
