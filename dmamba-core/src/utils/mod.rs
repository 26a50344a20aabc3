pub mod clip_grad;
pub mod loss;
pub mod stats;
pub mod warmup;
