pub mod config;
pub mod evaluation;
pub mod results;
pub mod trainer;

pub use config::TrainConfig;
pub use evaluation::{EvalRound, EvalSummary, EvaluationOrchestrator, TargetRegime};
pub use results::TrainingResults;
pub use trainer::{DecisionMambaTrainer, build_decision_mamba, train};
