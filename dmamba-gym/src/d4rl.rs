use crate::extract_space;
use candle_core::{Error, Result};
use dmamba_core::dataset::{DatasetInfo, OfflineDataset, Trajectory};
use pyo3::{PyResult, Python, types::PyAnyMethods};
use tracing::info;

const DEFAULT_MAX_EP_LEN: usize = 1000;

/// Flat D4RL arrays, one row per transition.
#[derive(Debug, Default)]
pub struct RawTransitions {
    pub observations: Vec<Vec<f32>>,
    pub actions: Vec<Vec<f32>>,
    pub rewards: Vec<f32>,
    pub terminals: Vec<bool>,
    pub timeouts: Vec<bool>,
}

impl RawTransitions {
    /// Cuts the flat arrays into episodes at every terminal or timeout. A trailing unfinished
    /// episode is kept.
    pub fn split_trajectories(self) -> Vec<Trajectory> {
        let mut trajectories = vec![];
        let mut current = Trajectory::default();
        let rows = self
            .observations
            .into_iter()
            .zip(self.actions)
            .zip(self.rewards)
            .enumerate();
        for (idx, ((state, action), reward)) in rows {
            current.states.push(state);
            current.actions.push(action);
            current.rewards.push(reward);
            let terminal = self.terminals.get(idx).copied().unwrap_or(false);
            let timeout = self.timeouts.get(idx).copied().unwrap_or(false);
            if terminal || timeout {
                trajectories.push(std::mem::take(&mut current));
            }
        }
        if !current.is_empty() {
            trajectories.push(current);
        }
        trajectories
    }
}

/// An offline dataset registered by the `d4rl` package, e.g. `hopper` + `medium` resolves to
/// `hopper-medium-v2`.
#[derive(Debug, Clone)]
pub struct D4rlDataset {
    pub env_name: String,
    pub dataset_name: String,
    pub scale: f32,
    pub gamma: f32,
}

impl D4rlDataset {
    pub fn new(env_name: impl Into<String>, dataset_name: impl Into<String>, scale: f32) -> Self {
        Self {
            env_name: env_name.into(),
            dataset_name: dataset_name.into(),
            scale,
            gamma: 1.,
        }
    }

    pub fn full_env_name(&self) -> String {
        format!("{}-{}-v2", self.env_name, self.dataset_name)
    }

    pub fn load(&self) -> Result<OfflineDataset> {
        let full_env_name = self.full_env_name();
        let (raw, action_range, max_ep_len) = Python::with_gil(|py| {
            py.import("d4rl")?;
            let gym = py.import("gym")?;
            let env = gym.getattr("make")?.call1((full_env_name.as_str(),))?;
            let dataset = env.call_method0("get_dataset")?;
            let column = |key: &str| dataset.get_item(key)?.call_method0("tolist");
            let timeouts = if dataset.contains("timeouts")? {
                column("timeouts")?.extract()?
            } else {
                vec![]
            };
            let raw = RawTransitions {
                observations: column("observations")?.extract()?,
                actions: column("actions")?.extract()?,
                rewards: column("rewards")?.extract()?,
                terminals: column("terminals")?.extract()?,
                timeouts,
            };
            let action_space = extract_space(&env.getattr("action_space")?, "gym.spaces")?;
            let spec = env.getattr("spec")?;
            let max_ep_len: Option<usize> = spec.getattr("max_episode_steps")?.extract()?;
            PyResult::Ok((raw, action_space.max_bound(), max_ep_len))
        })
        .map_err(Error::wrap)?;

        let transitions = raw.rewards.len();
        let trajectories = raw.split_trajectories();
        let dataset_info = DatasetInfo {
            scale: self.scale,
            action_range: action_range.unwrap_or(1.),
            max_ep_len: max_ep_len.unwrap_or(DEFAULT_MAX_EP_LEN),
            gamma: self.gamma,
        };
        let dataset = OfflineDataset::from_trajectories(trajectories, dataset_info)?;
        info!(
            dataset = %full_env_name,
            transitions,
            trajectories = dataset.trajectories.len(),
            max_ep_rew = dataset.max_ep_rew,
            action_range = dataset.action_range,
            "loaded offline dataset"
        );
        Ok(dataset)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn splits_on_terminals_and_timeouts() {
        let raw = RawTransitions {
            observations: (0..7).map(|i| vec![i as f32]).collect(),
            actions: vec![vec![0.]; 7],
            rewards: vec![1.; 7],
            terminals: vec![false, true, false, false, false, false, false],
            timeouts: vec![false, false, false, false, true, false, false],
        };
        let trajectories = raw.split_trajectories();
        let lens: Vec<usize> = trajectories.iter().map(Trajectory::len).collect();
        assert_eq!(lens, vec![2, 3, 2]);
        assert_eq!(trajectories[1].states[0], vec![2.]);
    }

    #[test]
    fn missing_timeouts_only_split_on_terminals() {
        let raw = RawTransitions {
            observations: vec![vec![0.]; 4],
            actions: vec![vec![0.]; 4],
            rewards: vec![0.; 4],
            terminals: vec![false, false, true, false],
            timeouts: vec![],
        };
        let lens: Vec<usize> = raw.split_trajectories().iter().map(Trajectory::len).collect();
        assert_eq!(lens, vec![3, 1]);
    }

    #[test]
    fn full_env_name() {
        assert_eq!(
            D4rlDataset::new("hopper", "medium-replay", 1000.).full_env_name(),
            "hopper-medium-replay-v2"
        );
    }
}
