use crate::evaluation::{EvalRound, EvalSummary};
use serde::{Deserialize, Serialize};
use std::{fs, fs::File, io::BufWriter, path::Path};

/// Per run log: one loss per iteration and one entry per evaluation round for every statistic.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingResults {
    pub train_losses: Vec<f32>,
    pub val_10000_rewards_mean: Vec<f64>,
    pub val_10000_rewards_std: Vec<f64>,
    pub val_10000_lengths_mean: Vec<f64>,
    pub val_10000_lengths_std: Vec<f64>,
    pub val_max_rewards_mean: Vec<f64>,
    pub val_max_rewards_std: Vec<f64>,
    pub val_max_lengths_mean: Vec<f64>,
    pub val_max_lengths_std: Vec<f64>,
    pub val_half_rewards_mean: Vec<f64>,
    pub val_half_rewards_std: Vec<f64>,
    pub val_half_lengths_mean: Vec<f64>,
    pub val_half_lengths_std: Vec<f64>,
}

fn push_summary(
    summary: &EvalSummary,
    rewards_mean: &mut Vec<f64>,
    rewards_std: &mut Vec<f64>,
    lengths_mean: &mut Vec<f64>,
    lengths_std: &mut Vec<f64>,
) {
    rewards_mean.push(summary.rewards_mean);
    rewards_std.push(summary.rewards_std);
    lengths_mean.push(summary.lengths_mean);
    lengths_std.push(summary.lengths_std);
}

impl TrainingResults {
    pub fn push_round(&mut self, round: &EvalRound) {
        push_summary(
            &round.fixed,
            &mut self.val_10000_rewards_mean,
            &mut self.val_10000_rewards_std,
            &mut self.val_10000_lengths_mean,
            &mut self.val_10000_lengths_std,
        );
        push_summary(
            &round.max,
            &mut self.val_max_rewards_mean,
            &mut self.val_max_rewards_std,
            &mut self.val_max_lengths_mean,
            &mut self.val_max_lengths_std,
        );
        push_summary(
            &round.half,
            &mut self.val_half_rewards_mean,
            &mut self.val_half_rewards_std,
            &mut self.val_half_lengths_mean,
            &mut self.val_half_lengths_std,
        );
    }

    pub fn eval_rounds(&self) -> usize {
        self.val_10000_rewards_mean.len()
    }

    /// Writes the results as JSON indented by four spaces, creating missing parent directories.
    pub fn write_json(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let writer = BufWriter::new(File::create(path)?);
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
        let mut serializer = serde_json::Serializer::with_formatter(writer, formatter);
        self.serialize(&mut serializer)?;
        Ok(())
    }

    pub fn read_json(path: &Path) -> anyhow::Result<Self> {
        let file = File::open(path)?;
        Ok(serde_json::from_reader(file)?)
    }
}
