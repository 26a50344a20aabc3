use crate::{
    normalizer::StateNormalizer,
    sampler::{Batch, BatchSampler},
};
use candle_core::{Error, Result};

/// A recorded episode. Returns-to-go are already divided by the dataset scale.
#[derive(Debug, Clone, Default)]
pub struct Trajectory {
    pub states: Vec<Vec<f32>>,
    pub actions: Vec<Vec<f32>>,
    pub rewards: Vec<f32>,
    pub returns_to_go: Vec<f32>,
}

impl Trajectory {
    pub fn new(states: Vec<Vec<f32>>, actions: Vec<Vec<f32>>, rewards: Vec<f32>) -> Self {
        Self {
            states,
            actions,
            rewards,
            returns_to_go: vec![],
        }
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    pub fn total_reward(&self) -> f32 {
        self.rewards.iter().sum()
    }

    pub fn compute_returns_to_go(&mut self, gamma: f32, scale: f32) {
        self.returns_to_go = discount_cumsum(&self.rewards, gamma)
            .into_iter()
            .map(|rtg| rtg / scale)
            .collect();
    }
}

pub fn discount_cumsum(rewards: &[f32], gamma: f32) -> Vec<f32> {
    let mut out = vec![0.; rewards.len()];
    let mut running = 0.;
    for i in (0..rewards.len()).rev() {
        running = rewards[i] + gamma * running;
        out[i] = running;
    }
    out
}

#[derive(Debug, Clone, Copy)]
pub struct DatasetInfo {
    pub scale: f32,
    pub action_range: f32,
    pub max_ep_len: usize,
    pub gamma: f32,
}

impl Default for DatasetInfo {
    fn default() -> Self {
        Self {
            scale: 1000.,
            action_range: 1.,
            max_ep_len: 1000,
            gamma: 1.,
        }
    }
}

/// Immutable trajectory store plus the per environment constants the training loop and the
/// rollout engine read.
#[derive(Debug, Clone)]
pub struct OfflineDataset {
    pub trajectories: Vec<Trajectory>,
    pub normalizer: StateNormalizer,
    pub scale: f32,
    pub action_range: f32,
    pub max_ep_len: usize,
    pub max_ep_rew: f32,
    pub state_size: usize,
    pub action_size: usize,
}

impl OfflineDataset {
    pub fn from_trajectories(trajectories: Vec<Trajectory>, info: DatasetInfo) -> Result<Self> {
        let mut trajectories: Vec<Trajectory> =
            trajectories.into_iter().filter(|t| !t.is_empty()).collect();
        let Some(first) = trajectories.first() else {
            return Err(Error::Msg("dataset contains no trajectories".into()));
        };
        let state_size = first.states[0].len();
        let action_size = first.actions.first().map(|a| a.len()).unwrap_or(0);
        for (idx, traj) in trajectories.iter().enumerate() {
            let consistent = traj.actions.len() == traj.len()
                && traj.rewards.len() == traj.len()
                && traj.states.iter().all(|s| s.len() == state_size)
                && traj.actions.iter().all(|a| a.len() == action_size);
            if !consistent {
                return Err(Error::Msg(format!(
                    "trajectory {idx} does not match state size {state_size} / action size {action_size}"
                )));
            }
        }
        for traj in trajectories.iter_mut() {
            traj.compute_returns_to_go(info.gamma, info.scale);
        }
        let normalizer = StateNormalizer::from_states(
            trajectories
                .iter()
                .flat_map(|t| t.states.iter().map(|s| &s[..])),
            state_size,
            1e-6,
        );
        let max_ep_rew = trajectories
            .iter()
            .map(Trajectory::total_reward)
            .fold(f32::NEG_INFINITY, f32::max);
        Ok(Self {
            trajectories,
            normalizer,
            scale: info.scale,
            action_range: info.action_range,
            max_ep_len: info.max_ep_len,
            max_ep_rew,
            state_size,
            action_size,
        })
    }

    pub fn num_steps(&self) -> usize {
        self.trajectories.iter().map(Trajectory::len).sum()
    }

    pub fn state_mean(&self) -> &[f32] {
        &self.normalizer.mean
    }

    pub fn state_std(&self) -> &[f32] {
        &self.normalizer.std
    }

    pub fn get_batch(
        &self,
        sampler: &mut BatchSampler,
        batch_size: usize,
        sequence_length: usize,
    ) -> Result<Batch> {
        sampler.sample(self, batch_size, sequence_length)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn returns_to_go_are_scaled_suffix_sums() {
        let mut traj = Trajectory::new(vec![vec![0.]; 3], vec![vec![0.]; 3], vec![1., 2., 3.]);
        traj.compute_returns_to_go(1., 10.);
        assert_eq!(traj.returns_to_go, vec![0.6, 0.5, 0.3]);
        assert_eq!(discount_cumsum(&[1., 1.], 0.5), vec![1.5, 1.]);
    }

    #[test]
    fn dataset_statistics() -> Result<()> {
        let short = Trajectory::new(vec![vec![1., 0.]; 2], vec![vec![0.5]; 2], vec![1., 1.]);
        let long = Trajectory::new(vec![vec![3., 0.]; 4], vec![vec![-0.5]; 4], vec![2.; 4]);
        let dataset = OfflineDataset::from_trajectories(vec![short, long], DatasetInfo::default())?;
        assert_eq!(dataset.state_size, 2);
        assert_eq!(dataset.action_size, 1);
        assert_eq!(dataset.max_ep_rew, 8.);
        assert_eq!(dataset.num_steps(), 6);
        assert!((dataset.state_mean()[0] - 7. / 3.).abs() < 1e-5);
        assert!(dataset.state_std().iter().all(|s| *s > 0.));
        Ok(())
    }

    #[test]
    fn rejects_empty_and_ragged_input() {
        assert!(OfflineDataset::from_trajectories(vec![], DatasetInfo::default()).is_err());
        let ragged = Trajectory::new(vec![vec![1., 0.], vec![1.]], vec![vec![0.]; 2], vec![0.; 2]);
        assert!(OfflineDataset::from_trajectories(vec![ragged], DatasetInfo::default()).is_err());
    }
}
