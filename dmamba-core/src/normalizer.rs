/// Element-wise `(state - mean) / std`. A zero `std` entry is a dataset construction error and is
/// not guarded against here.
pub fn normalize(state: &[f32], mean: &[f32], std: &[f32]) -> Vec<f32> {
    state
        .iter()
        .zip(mean.iter().zip(std))
        .map(|(s, (m, d))| (s - m) / d)
        .collect()
}

/// Per dimension state statistics, computed once from the training data and shared read only by
/// the sampler and every rollout.
#[derive(Debug, Clone, PartialEq)]
pub struct StateNormalizer {
    pub mean: Vec<f32>,
    pub std: Vec<f32>,
}

impl StateNormalizer {
    pub fn new(mean: Vec<f32>, std: Vec<f32>) -> Self {
        debug_assert_eq!(mean.len(), std.len());
        Self { mean, std }
    }

    /// Population mean and standard deviation over every state. `eps` is added to the standard
    /// deviation so constant dimensions stay finite.
    pub fn from_states<'a>(
        states: impl IntoIterator<Item = &'a [f32]>,
        state_size: usize,
        eps: f32,
    ) -> Self {
        let mut sum = vec![0f64; state_size];
        let mut sum_sq = vec![0f64; state_size];
        let mut count = 0usize;
        for state in states {
            for (i, s) in state.iter().enumerate() {
                sum[i] += *s as f64;
                sum_sq[i] += (*s as f64).powi(2);
            }
            count += 1;
        }
        let count = count.max(1) as f64;
        let mean: Vec<f64> = sum.iter().map(|s| s / count).collect();
        let std = sum_sq
            .iter()
            .zip(&mean)
            .map(|(sq, m)| ((sq / count - m * m).max(0.).sqrt() as f32) + eps)
            .collect();
        Self::new(mean.into_iter().map(|m| m as f32).collect(), std)
    }

    pub fn state_size(&self) -> usize {
        self.mean.len()
    }

    pub fn normalize(&self, state: &[f32]) -> Vec<f32> {
        normalize(state, &self.mean, &self.std)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn normalizes_each_dimension() {
        let normalizer = StateNormalizer::new(vec![1., -2., 0.5], vec![2., 4., 0.25]);
        let out = normalizer.normalize(&[3., 2., 1.]);
        assert_eq!(out, vec![1., 1., 2.]);
    }

    #[test]
    fn stats_use_population_std() {
        let states = [vec![1f32, 10.], vec![3., 10.]];
        let normalizer = StateNormalizer::from_states(states.iter().map(|s| &s[..]), 2, 1e-6);
        assert_eq!(normalizer.mean, vec![2., 10.]);
        assert!((normalizer.std[0] - 1.).abs() < 1e-5);
        // constant dimension keeps a non zero std
        assert!(normalizer.std[1] > 0.);
    }
}
