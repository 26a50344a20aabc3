use crate::{
    config::TrainConfig,
    evaluation::{EvalRound, EvaluationOrchestrator},
    results::TrainingResults,
};
use candle_core::{DType, Device, Result};
use candle_nn::{VarBuilder, VarMap};
use dmamba_core::{
    dataset::OfflineDataset,
    env::Env,
    optimizer::OptimizerWithMaxGrad,
    predictor::SequencePredictor,
    sampler::BatchSampler,
    tensors::ActionPreds,
    utils::{loss::masked_mse, warmup::LinearWarmup},
};
use dmamba_models::{DecisionMamba, DecisionMambaConfig};
use rand::{SeedableRng, rngs::StdRng};
use std::time::Instant;
use tracing::{debug, info, warn};

pub struct DecisionMambaTrainer<P: SequencePredictor, E: Env> {
    pub config: TrainConfig,
    pub dataset: OfflineDataset,
    pub predictor: P,
    pub optimizer: OptimizerWithMaxGrad,
    pub schedule: LinearWarmup,
    pub env: E,
    pub results: TrainingResults,
    sampler: BatchSampler,
    eval_rng: StdRng,
    device: Device,
}

impl<P: SequencePredictor, E: Env> DecisionMambaTrainer<P, E> {
    /// `varmap` must hold the parameters of `predictor`, they are the ones the optimizer updates.
    pub fn new(
        config: TrainConfig,
        dataset: OfflineDataset,
        predictor: P,
        varmap: VarMap,
        env: E,
        device: Device,
    ) -> Result<Self> {
        let schedule = LinearWarmup::new(config.lr, config.warmup_steps);
        let optimizer = OptimizerWithMaxGrad::adamw(
            varmap,
            schedule.learning_rate(0),
            config.weight_decay,
            Some(config.max_grad_norm),
        )?;
        Ok(Self {
            sampler: BatchSampler::new(config.seed, device.clone()),
            eval_rng: StdRng::seed_from_u64(config.seed.wrapping_add(1)),
            config,
            dataset,
            predictor,
            optimizer,
            schedule,
            env,
            results: TrainingResults::default(),
            device,
        })
    }

    /// One gradient step on a freshly sampled batch. Returns the masked action loss.
    pub fn train_step(&mut self, iteration: usize) -> Result<f32> {
        let batch = self.dataset.get_batch(
            &mut self.sampler,
            self.config.batch_size,
            self.config.context_len,
        )?;
        let preds = self.predictor.forward(
            &batch.states,
            &batch.actions,
            Some(&batch.subgoals),
            &batch.returns_to_go,
        )?;
        let action_preds = ActionPreds(
            preds
                .action_preds
                .affine(self.dataset.action_range as f64, 0.)?,
        );
        let loss = masked_mse(&action_preds, &batch.labels, &batch.mask)?;
        let lr = self.schedule.learning_rate(iteration);
        self.optimizer.set_learning_rate(lr);
        let grad_norm = self.optimizer.backward_step(&loss)?;
        let loss = loss.to_scalar::<f32>()?;
        debug!(iteration, loss, lr, ?grad_norm, "train step");
        self.results.train_losses.push(loss);
        Ok(loss)
    }

    pub fn evaluate(&mut self) -> Result<EvalRound> {
        let orchestrator = EvaluationOrchestrator::new(
            &self.dataset,
            self.config.context_len,
            self.config.num_eval_episodes,
            self.config.high_target_return,
            self.device.clone(),
        );
        orchestrator.evaluate(&self.predictor, &mut self.env, &mut self.eval_rng)
    }

    /// Runs every configured iteration, evaluating after iteration `t` whenever
    /// `(t + 1) % eval_every == 0`.
    ///
    /// A failed evaluation round is logged and left out of the results, training carries on and
    /// the next scheduled round runs as usual. Training step errors end the run.
    pub fn train(&mut self) -> Result<&TrainingResults> {
        let started = Instant::now();
        for iteration in 0..self.config.iterations {
            self.train_step(iteration)?;
            if self.config.eval_every > 0 && (iteration + 1) % self.config.eval_every == 0 {
                let round = match self.evaluate() {
                    Ok(round) => round,
                    Err(err) => {
                        warn!(iteration = iteration + 1, %err, "evaluation round aborted");
                        continue;
                    }
                };
                info!(
                    env = %self.config.env_name,
                    dataset = %self.config.dataset_name,
                    iteration = iteration + 1,
                    iterations = self.config.iterations,
                    fixed = round.fixed.rewards_mean,
                    max = round.max.rewards_mean,
                    half = round.half.rewards_mean,
                    dataset_max = self.dataset.max_ep_rew,
                    elapsed_secs = started.elapsed().as_secs_f32(),
                    "evaluation"
                );
                self.results.push_round(&round);
            }
        }
        Ok(&self.results)
    }
}

pub fn build_decision_mamba(
    config: &TrainConfig,
    dataset: &OfflineDataset,
    device: &Device,
) -> Result<(DecisionMamba, VarMap)> {
    let varmap = VarMap::new();
    let vb = VarBuilder::from_varmap(&varmap, DType::F32, device);
    let model = DecisionMambaConfig::new(
        dataset.state_size,
        dataset.action_size,
        config.d_model,
        config.n_layer,
    )
    .build(vb)?;
    Ok((model, varmap))
}

/// Builds a fresh model, trains it and writes the results to `config.results_path()`.
pub fn train<E: Env>(
    config: TrainConfig,
    dataset: OfflineDataset,
    env: E,
    device: &Device,
) -> anyhow::Result<TrainingResults> {
    if !device.is_cpu() {
        device.set_seed(config.seed)?;
    }
    let (model, varmap) = build_decision_mamba(&config, &dataset, device)?;
    let path = config.results_path();
    info!(
        experiment = %config.experiment_name(),
        parameters = varmap.all_vars().iter().map(|v| v.elem_count()).sum::<usize>(),
        "starting training"
    );
    let mut trainer =
        DecisionMambaTrainer::new(config, dataset, model, varmap, env, device.clone())?;
    trainer.train()?;
    trainer.results.write_json(&path)?;
    info!(path = %path.display(), "wrote results");
    Ok(trainer.results)
}
