use crate::{
    env::Env,
    normalizer::StateNormalizer,
    predictor::SequencePredictor,
    sampler::Batch,
    window::{Step, WindowBuffer},
};
use candle_core::{Device, IndexOp, Result};
use tracing::trace;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EpisodeOutcome {
    /// Summed in f64 so long episodes do not drift.
    pub total_reward: f64,
    pub episode_length: usize,
}

/// Closed loop driver: the predictor picks every action from its own trailing K step context.
///
/// Returns-to-go during a rollout are a remaining budget, `rtg_{t+1} = rtg_t - r_t / scale`,
/// never a dataset lookup. Predicted actions are multiplied by `action_range` and handed to the
/// environment without clamping.
#[derive(Debug, Clone)]
pub struct RolloutEngine<'a> {
    pub normalizer: &'a StateNormalizer,
    pub scale: f32,
    pub action_range: f32,
    pub context_len: usize,
    pub action_size: usize,
    pub device: Device,
}

impl<'a> RolloutEngine<'a> {
    pub fn run_episode<P: SequencePredictor, E: Env + ?Sized>(
        &self,
        predictor: &P,
        env: &mut E,
        target_return: f32,
        max_steps: usize,
        seed: u64,
    ) -> Result<EpisodeOutcome> {
        let state = env.reset(seed)?;
        self.check_state(&state)?;
        let mut buffer = WindowBuffer::new(self.normalizer.state_size(), self.action_size);
        let mut return_to_go = target_return / self.scale;
        buffer.append(Step::new(state, vec![0.; self.action_size], return_to_go));

        let mut outcome = EpisodeOutcome {
            total_reward: 0.,
            episode_length: 0,
        };
        for _ in 0..max_steps {
            let window = buffer.last_k(self.context_len).normalized(self.normalizer);
            let Some(last) = window.last_real_index() else {
                candle_core::bail!("rollout window has no real position")
            };
            let batch = Batch::from_windows(std::slice::from_ref(&window), &self.device)?;
            let preds =
                predictor.forward(&batch.states, &batch.actions, None, &batch.returns_to_go)?;
            let action: Vec<f32> = preds
                .action_preds
                .i((0, last))?
                .affine(self.action_range as f64, 0.)?
                .to_vec1()?;
            if action.len() != self.action_size {
                candle_core::bail!(
                    "predictor returned {} action dims, expected {}",
                    action.len(),
                    self.action_size
                )
            }

            let snapshot = env.step(&action)?;
            self.check_state(&snapshot.state)?;
            outcome.total_reward += snapshot.reward as f64;
            outcome.episode_length += 1;
            return_to_go -= snapshot.reward / self.scale;
            trace!(
                step = outcome.episode_length,
                reward = snapshot.reward,
                return_to_go,
                "rollout step"
            );

            let done = snapshot.done();
            buffer.append(Step::new(snapshot.state, action, return_to_go));
            buffer.truncate(self.context_len);
            if done {
                break;
            }
        }
        Ok(outcome)
    }

    fn check_state(&self, state: &[f32]) -> Result<()> {
        let expected = self.normalizer.state_size();
        if state.len() != expected {
            candle_core::bail!(
                "environment returned a state of size {}, expected {expected}",
                state.len()
            )
        }
        Ok(())
    }
}
