pub mod decision_mamba;
pub mod mamba;

pub use decision_mamba::{DecisionMamba, DecisionMambaConfig};
