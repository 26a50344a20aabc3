use crate::{
    dataset::OfflineDataset,
    tensors::{ActionLabels, PaddingMask},
    window::Window,
};
use candle_core::{Device, Result, Tensor};
use rand::{Rng, SeedableRng, rngs::StdRng};

/// Device side view of `B` windows.
#[derive(Debug, Clone)]
pub struct Batch {
    /// [B, K, state_size], normalized
    pub states: Tensor,
    /// [B, K, action_size]
    pub actions: Tensor,
    /// [B, K, action_size], zero at padded positions
    pub labels: ActionLabels,
    /// [B, K, 1], the reward channel handed to the predictor during training
    pub subgoals: Tensor,
    /// [B, K, 1]
    pub returns_to_go: Tensor,
    /// [B, K]
    pub mask: PaddingMask,
}

impl Batch {
    pub fn from_windows(windows: &[Window], device: &Device) -> Result<Self> {
        let Some(first) = windows.first() else {
            candle_core::bail!("cannot build a batch from zero windows")
        };
        let (b, k) = (windows.len(), first.context_len);
        let (state_size, action_size) = (first.state_size, first.action_size);
        let states: Vec<f32> = windows.iter().flat_map(|w| w.states.iter().copied()).collect();
        let actions: Vec<f32> = windows.iter().flat_map(|w| w.actions.iter().copied()).collect();
        let rewards: Vec<f32> = windows.iter().flat_map(|w| w.rewards.iter().copied()).collect();
        let rtgs: Vec<f32> = windows
            .iter()
            .flat_map(|w| w.returns_to_go.iter().copied())
            .collect();
        let mask: Vec<u8> = windows.iter().flat_map(|w| w.mask.iter().copied()).collect();
        let actions = Tensor::from_vec(actions, (b, k, action_size), device)?;
        Ok(Self {
            states: Tensor::from_vec(states, (b, k, state_size), device)?,
            labels: ActionLabels(actions.clone()),
            actions,
            subgoals: Tensor::from_vec(rewards, (b, k, 1), device)?,
            returns_to_go: Tensor::from_vec(rtgs, (b, k, 1), device)?,
            mask: PaddingMask(Tensor::from_vec(mask, (b, k), device)?),
        })
    }

    pub fn batch_size(&self) -> usize {
        self.states.dims()[0]
    }

    pub fn context_len(&self) -> usize {
        self.states.dims()[1]
    }
}

/// Draws training windows: a uniformly chosen trajectory, then a uniformly chosen last position.
/// Windows ending before position K-1 of their trajectory are left padded.
pub struct BatchSampler {
    rng: StdRng,
    pub device: Device,
}

impl BatchSampler {
    pub fn new(seed: u64, device: Device) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            device,
        }
    }

    pub fn sample_window(&mut self, dataset: &OfflineDataset, context_len: usize) -> Window {
        let traj_idx = self.rng.random_range(0..dataset.trajectories.len());
        let traj = &dataset.trajectories[traj_idx];
        let end = self.rng.random_range(0..traj.len());
        let real_len = (end + 1).min(context_len);
        let start = end + 1 - real_len;
        let pad_len = context_len - real_len;
        let mut window = Window::empty(context_len, dataset.state_size, dataset.action_size);
        for offset in 0..real_len {
            let idx = start + offset;
            let state = dataset.normalizer.normalize(&traj.states[idx]);
            window.set(
                pad_len + offset,
                &state,
                &traj.actions[idx],
                traj.rewards[idx] / dataset.scale,
                traj.returns_to_go[idx],
            );
        }
        window
    }

    pub fn sample_windows(
        &mut self,
        dataset: &OfflineDataset,
        batch_size: usize,
        context_len: usize,
    ) -> Vec<Window> {
        (0..batch_size)
            .map(|_| self.sample_window(dataset, context_len))
            .collect()
    }

    pub fn sample(
        &mut self,
        dataset: &OfflineDataset,
        batch_size: usize,
        context_len: usize,
    ) -> Result<Batch> {
        let windows = self.sample_windows(dataset, batch_size, context_len);
        Batch::from_windows(&windows, &self.device)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::dataset::{DatasetInfo, Trajectory};

    fn dataset(len: usize) -> Result<OfflineDataset> {
        let states = (0..len).map(|i| vec![i as f32, 1.]).collect();
        let actions = (0..len).map(|i| vec![i as f32 * 0.1]).collect();
        let traj = Trajectory::new(states, actions, vec![1.; len]);
        let info = DatasetInfo {
            scale: 10.,
            ..Default::default()
        };
        OfflineDataset::from_trajectories(vec![traj], info)
    }

    #[test]
    fn short_trajectory_is_padded_in_every_sample() -> Result<()> {
        let dataset = dataset(10)?;
        let mut sampler = BatchSampler::new(0, Device::Cpu);
        let batch = sampler.sample(&dataset, 4, 20)?;
        assert_eq!(batch.states.dims(), &[4, 20, 2]);
        assert_eq!(batch.actions.dims(), &[4, 20, 1]);
        assert_eq!(batch.labels.dims(), &[4, 20, 1]);
        assert_eq!(batch.subgoals.dims(), &[4, 20, 1]);
        assert_eq!(batch.returns_to_go.dims(), &[4, 20, 1]);
        let mask: Vec<Vec<u8>> = batch.mask.to_vec2()?;
        for row in mask {
            let padded = row.iter().filter(|m| **m == 0).count();
            assert!(padded >= 10);
            // left padding only
            let first_real = row.iter().position(|m| *m == 1).unwrap();
            assert!(row[first_real..].iter().all(|m| *m == 1));
        }
        let labels: Vec<Vec<Vec<f32>>> = batch.labels.to_vec3()?;
        let actions: Vec<Vec<Vec<f32>>> = batch.actions.to_vec3()?;
        assert_eq!(labels, actions);
        let mask: Vec<Vec<u8>> = batch.mask.to_vec2()?;
        for (row, mask_row) in labels.iter().zip(mask) {
            for (label, m) in row.iter().zip(mask_row) {
                if m == 0 {
                    assert_eq!(label, &vec![0.]);
                }
            }
        }
        Ok(())
    }

    #[test]
    fn windows_follow_the_stored_trajectory() -> Result<()> {
        let dataset = dataset(30)?;
        let mut sampler = BatchSampler::new(7, Device::Cpu);
        for window in sampler.sample_windows(&dataset, 16, 5) {
            let pad = window.pad_len();
            assert_eq!(window.context_len, 5);
            for pos in 0..pad {
                assert_eq!(window.state(pos), &[0., 0.]);
                assert_eq!(window.action(pos), &[0.]);
                assert_eq!(window.returns_to_go[pos], 0.);
            }
            // rtg = (30 - idx) / 10 recovers the stored index of every real position
            let traj = &dataset.trajectories[0];
            for pos in pad..5 {
                let idx = 30 - (window.returns_to_go[pos] * 10.).round() as usize;
                assert_eq!(window.action(pos), &traj.actions[idx][..]);
            }
            // consecutive real positions hold consecutive stored steps
            for pos in pad + 1..5 {
                let prev = window.returns_to_go[pos - 1];
                let cur = window.returns_to_go[pos];
                assert!((prev - cur - 0.1).abs() < 1e-5);
                assert!((window.rewards[pos] - 0.1).abs() < 1e-6);
            }
        }
        Ok(())
    }

    #[test]
    fn same_seed_same_batches() -> Result<()> {
        let dataset = dataset(50)?;
        let mut a = BatchSampler::new(3, Device::Cpu);
        let mut b = BatchSampler::new(3, Device::Cpu);
        assert_eq!(a.sample_windows(&dataset, 8, 10), b.sample_windows(&dataset, 8, 10));
        Ok(())
    }
}
