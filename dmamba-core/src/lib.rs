pub mod dataset;
pub mod env;
pub mod normalizer;
pub mod optimizer;
pub mod predictor;
pub mod rollout;
pub mod sampler;
pub mod tensors;
#[cfg(feature = "test-utils")]
pub mod test_utils;
pub mod utils;
pub mod window;
