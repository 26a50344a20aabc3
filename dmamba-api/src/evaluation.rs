use candle_core::{Device, Result};
use dmamba_core::{
    dataset::OfflineDataset,
    env::Env,
    predictor::SequencePredictor,
    rollout::{EpisodeOutcome, RolloutEngine},
    utils::stats,
};
use rand::{Rng, rngs::StdRng};
use tracing::debug;

/// Where the initial return-to-go of an evaluation episode comes from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TargetRegime {
    Fixed(f32),
    DatasetMax,
    HalfDatasetMax,
}

impl TargetRegime {
    pub fn target_return(&self, max_ep_rew: f32) -> f32 {
        match self {
            Self::Fixed(target) => *target,
            Self::DatasetMax => max_ep_rew,
            Self::HalfDatasetMax => max_ep_rew / 2.,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EvalSummary {
    pub rewards_mean: f64,
    pub rewards_std: f64,
    pub lengths_mean: f64,
    pub lengths_std: f64,
}

impl EvalSummary {
    pub fn from_outcomes(outcomes: &[EpisodeOutcome]) -> Self {
        let rewards: Vec<f64> = outcomes.iter().map(|o| o.total_reward).collect();
        let lengths: Vec<f64> = outcomes.iter().map(|o| o.episode_length as f64).collect();
        Self {
            rewards_mean: stats::mean(&rewards),
            rewards_std: stats::std(&rewards),
            lengths_mean: stats::mean(&lengths),
            lengths_std: stats::std(&lengths),
        }
    }
}

/// One summary per target regime, in the order fixed, max, half.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EvalRound {
    pub fixed: EvalSummary,
    pub max: EvalSummary,
    pub half: EvalSummary,
}

pub struct EvaluationOrchestrator<'a> {
    pub engine: RolloutEngine<'a>,
    pub num_episodes: usize,
    pub max_ep_len: usize,
    pub max_ep_rew: f32,
    pub fixed_target: f32,
}

impl<'a> EvaluationOrchestrator<'a> {
    pub fn new(
        dataset: &'a OfflineDataset,
        context_len: usize,
        num_episodes: usize,
        fixed_target: f32,
        device: Device,
    ) -> Self {
        let engine = RolloutEngine {
            normalizer: &dataset.normalizer,
            scale: dataset.scale,
            action_range: dataset.action_range,
            context_len,
            action_size: dataset.action_size,
            device,
        };
        Self {
            engine,
            num_episodes,
            max_ep_len: dataset.max_ep_len,
            max_ep_rew: dataset.max_ep_rew,
            fixed_target,
        }
    }

    pub fn regimes(&self) -> [TargetRegime; 3] {
        [
            TargetRegime::Fixed(self.fixed_target),
            TargetRegime::DatasetMax,
            TargetRegime::HalfDatasetMax,
        ]
    }

    /// Runs `num_episodes` episodes conditioned on the regime's target. Reset seeds are drawn
    /// from `rng` so consecutive rounds see different initial states.
    pub fn evaluate_regime<P: SequencePredictor, E: Env + ?Sized>(
        &self,
        predictor: &P,
        env: &mut E,
        regime: TargetRegime,
        rng: &mut StdRng,
    ) -> Result<EvalSummary> {
        let target_return = regime.target_return(self.max_ep_rew);
        let mut outcomes = Vec::with_capacity(self.num_episodes);
        for episode in 0..self.num_episodes {
            let seed = rng.random::<u64>();
            let outcome = self
                .engine
                .run_episode(predictor, env, target_return, self.max_ep_len, seed)?;
            debug!(
                ?regime,
                episode,
                total_reward = outcome.total_reward,
                length = outcome.episode_length,
                "evaluation episode"
            );
            outcomes.push(outcome);
        }
        Ok(EvalSummary::from_outcomes(&outcomes))
    }

    pub fn evaluate<P: SequencePredictor, E: Env + ?Sized>(
        &self,
        predictor: &P,
        env: &mut E,
        rng: &mut StdRng,
    ) -> Result<EvalRound> {
        let [fixed, max, half] = self.regimes();
        Ok(EvalRound {
            fixed: self.evaluate_regime(predictor, env, fixed, rng)?,
            max: self.evaluate_regime(predictor, env, max, rng)?,
            half: self.evaluate_regime(predictor, env, half, rng)?,
        })
    }
}
