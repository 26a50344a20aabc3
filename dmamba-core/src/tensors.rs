use candle_core::Tensor;
use derive_more::{Deref, DerefMut, Display};

/// Predicted actions in physical units, [B, K, action_size].
#[derive(Deref, DerefMut, Debug, Display, Clone)]
pub struct ActionPreds(pub Tensor);

/// Ground truth actions, zero at padded positions, [B, K, action_size].
#[derive(Deref, DerefMut, Debug, Display, Clone)]
pub struct ActionLabels(pub Tensor);

/// 1 for real positions, 0 for left padding, [B, K] as u8.
#[derive(Deref, DerefMut, Debug, Display, Clone)]
pub struct PaddingMask(pub Tensor);

/// Scalar masked regression loss.
#[derive(Deref, DerefMut, Debug, Display)]
pub struct ActionLoss(pub Tensor);
