use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub const DEFAULT_RESULTS_DIR: &str = "./Results/DecisionMamba";

/// Everything one training run needs besides the dataset and the evaluation environment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainConfig {
    pub seed: u64,
    pub env_name: String,
    pub dataset_name: String,
    pub batch_size: usize,
    pub d_model: usize,
    pub n_layer: usize,
    pub context_len: usize,
    pub eval_every: usize,
    pub iterations: usize,
    pub lr: f64,
    pub weight_decay: f64,
    pub warmup_steps: usize,
    pub num_eval_episodes: usize,
    pub max_grad_norm: f32,
    pub scale: f32,
    /// Fixed target of the first evaluation regime.
    pub high_target_return: f32,
    pub results_dir: PathBuf,
}

impl TrainConfig {
    pub fn new(
        seed: u64,
        env_name: impl Into<String>,
        dataset_name: impl Into<String>,
        d_model: usize,
        n_layer: usize,
        context_len: usize,
    ) -> Self {
        Self {
            seed,
            env_name: env_name.into(),
            dataset_name: dataset_name.into(),
            batch_size: 16,
            d_model,
            n_layer,
            context_len,
            eval_every: 1000,
            iterations: 100_000,
            lr: 1e-4,
            weight_decay: 1e-4,
            warmup_steps: 10_000,
            num_eval_episodes: 10,
            max_grad_norm: 0.25,
            scale: 1000.,
            high_target_return: 10_000.,
            results_dir: PathBuf::from(DEFAULT_RESULTS_DIR),
        }
    }

    /// `{env}_{dataset}_S{seed}_E{iterations}_D{d_model}_L{n_layer}_K{context_len}`
    pub fn experiment_name(&self) -> String {
        format!(
            "{}_{}_S{}_E{}_D{}_L{}_K{}",
            self.env_name,
            self.dataset_name,
            self.seed,
            self.iterations,
            self.d_model,
            self.n_layer,
            self.context_len
        )
    }

    pub fn results_path(&self) -> PathBuf {
        self.results_dir.join(format!("{}.json", self.experiment_name()))
    }
}
