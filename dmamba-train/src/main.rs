use anyhow::Result;
use candle_core::Device;
use clap::{Parser, ValueEnum};
use dmamba_api::{TrainConfig, train};
use dmamba_gym::{GymBackend, GymEnv, d4rl::D4rlDataset};
use std::path::PathBuf;
use tracing::{Level, info};
use tracing_subscriber::{filter::LevelFilter, prelude::*};

#[derive(ValueEnum, Debug, Clone, Copy)]
enum DeviceType {
    Cpu,
    Cuda,
}

impl DeviceType {
    fn device(&self) -> Result<Device> {
        match self {
            Self::Cpu => Ok(Device::Cpu),
            Self::Cuda => Ok(Device::new_cuda(0)?),
        }
    }
}

#[derive(Parser, Debug)]
#[command(about = "Train a Decision Mamba policy on a D4RL dataset")]
struct Args {
    #[arg(long)]
    seed: u64,

    /// e.g. hopper, halfcheetah, walker2d
    #[arg(long)]
    env_name: String,

    /// e.g. medium, medium-replay, expert
    #[arg(long)]
    dataset: String,

    #[arg(long, default_value_t = 16)]
    batch_size: usize,

    #[arg(long)]
    d_model: usize,

    #[arg(long, default_value_t = 1000)]
    eval_every: usize,

    #[arg(long, default_value_t = 100_000)]
    iterations: usize,

    /// Context length
    #[arg(short = 'K', long = "context-len")]
    context_len: usize,

    #[arg(long, default_value_t = 1e-4)]
    lr: f64,

    #[arg(long)]
    n_layer: usize,

    #[arg(long, default_value_t = 10)]
    num_eval_episodes: usize,

    #[arg(long, default_value_t = 1e-4)]
    weight_decay: f64,

    #[arg(long, default_value_t = 10_000)]
    warmup_steps: usize,

    #[arg(long, value_enum, default_value_t = DeviceType::Cpu)]
    device: DeviceType,

    #[arg(long)]
    results_dir: Option<PathBuf>,

    /// -v for debug, -vv for trace
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

impl Args {
    fn train_config(&self) -> TrainConfig {
        let mut config = TrainConfig::new(
            self.seed,
            &self.env_name,
            &self.dataset,
            self.d_model,
            self.n_layer,
            self.context_len,
        );
        config.batch_size = self.batch_size;
        config.eval_every = self.eval_every;
        config.iterations = self.iterations;
        config.lr = self.lr;
        config.weight_decay = self.weight_decay;
        config.warmup_steps = self.warmup_steps;
        config.num_eval_episodes = self.num_eval_episodes;
        if let Some(results_dir) = &self.results_dir {
            config.results_dir = results_dir.clone();
        }
        config
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    let level = match args.verbose {
        0 => Level::INFO,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .with(LevelFilter::from_level(level))
        .init();

    let config = args.train_config();
    let device = args.device.device()?;
    let d4rl = D4rlDataset::new(&args.env_name, &args.dataset, config.scale);
    let dataset = d4rl.load()?;
    let env = GymEnv::new(&d4rl.full_env_name(), GymBackend::Gym, &["d4rl"])?;
    info!(?config, "configuration");
    let results = train(config, dataset, env, &device)?;
    info!(
        losses = results.train_losses.len(),
        eval_rounds = results.eval_rounds(),
        "done"
    );
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn parses_the_documented_flags() {
        let args = Args::parse_from([
            "dmamba-train",
            "--seed",
            "1",
            "--env-name",
            "hopper",
            "--dataset",
            "medium",
            "--d-model",
            "128",
            "-K",
            "20",
            "--n-layer",
            "3",
            "-vv",
        ]);
        let config = args.train_config();
        assert_eq!(config.experiment_name(), "hopper_medium_S1_E100000_D128_L3_K20");
        assert_eq!(config.batch_size, 16);
        assert_eq!(config.lr, 1e-4);
        assert_eq!(args.verbose, 2);
        assert!(matches!(args.device, DeviceType::Cpu));
    }

    #[test]
    fn overrides() {
        let args = Args::parse_from([
            "dmamba-train",
            "--seed=0",
            "--env-name=walker2d",
            "--dataset=expert",
            "--d-model=64",
            "--context-len=10",
            "--n-layer=2",
            "--iterations=500",
            "--batch-size=64",
            "--results-dir=/tmp/out",
        ]);
        let config = args.train_config();
        assert_eq!(config.iterations, 500);
        assert_eq!(config.batch_size, 64);
        assert_eq!(config.results_dir, PathBuf::from("/tmp/out"));
    }
}
