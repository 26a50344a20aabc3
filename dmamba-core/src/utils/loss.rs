use crate::tensors::{ActionLabels, ActionLoss, ActionPreds, PaddingMask};
use candle_core::{DType, Result};

/// Mean squared error over the real positions only. Values at padded positions never reach the
/// result, not even through a NaN.
pub fn masked_mse(
    preds: &ActionPreds,
    labels: &ActionLabels,
    mask: &PaddingMask,
) -> Result<ActionLoss> {
    let loss = preds.0.sub(&labels.0)?.sqr()?;
    let keep = mask.unsqueeze(2)?.broadcast_as(loss.dims())?;
    let masked = keep.where_cond(&loss, &loss.zeros_like()?)?;
    let count = keep.to_dtype(DType::F32)?.sum_all()?;
    Ok(ActionLoss(masked.sum_all()?.div(&count)?))
}

#[cfg(test)]
mod test {
    use super::*;
    use candle_core::{Device, Tensor};

    fn mask() -> Result<PaddingMask> {
        Ok(PaddingMask(Tensor::new(&[[0u8, 1, 1], [0, 0, 1]], &Device::Cpu)?))
    }

    #[test]
    fn averages_over_real_positions() -> Result<()> {
        let preds = Tensor::new(
            &[
                [[9f32, 9.], [1., 1.], [2., 2.]],
                [[9., 9.], [9., 9.], [0., 3.]],
            ],
            &Device::Cpu,
        )?;
        let labels = preds.zeros_like()?;
        let loss = masked_mse(&ActionPreds(preds), &ActionLabels(labels), &mask()?)?;
        // (1 + 1 + 4 + 4 + 0 + 9) / 6
        let loss = loss.to_scalar::<f32>()?;
        assert!((loss - 19. / 6.).abs() < 1e-6);
        Ok(())
    }

    #[test]
    fn padded_positions_do_not_matter() -> Result<()> {
        let device = Device::Cpu;
        let preds = Tensor::randn(0f32, 1., (2, 3, 2), &device)?;
        let labels = Tensor::randn(0f32, 1., (2, 3, 2), &device)?;
        let reference = masked_mse(
            &ActionPreds(preds.clone()),
            &ActionLabels(labels.clone()),
            &mask()?,
        )?
        .to_scalar::<f32>()?;
        let keep = mask()?.unsqueeze(2)?.broadcast_as((2, 3, 2))?;
        for _ in 0..5 {
            let noise = (Tensor::randn(0f32, 100., (2, 3, 2), &device)? + 1e4)?;
            let noisy_preds = keep.where_cond(&preds, &noise)?;
            let noisy_labels = keep.where_cond(&labels, &noise.neg()?)?;
            let loss = masked_mse(
                &ActionPreds(noisy_preds),
                &ActionLabels(noisy_labels),
                &mask()?,
            )?
            .to_scalar::<f32>()?;
            assert_eq!(loss, reference);
        }
        let nan = Tensor::full(f32::NAN, (2, 3, 2), &device)?;
        let loss = masked_mse(
            &ActionPreds(keep.where_cond(&preds, &nan)?),
            &ActionLabels(labels),
            &mask()?,
        )?
        .to_scalar::<f32>()?;
        assert_eq!(loss, reference);
        Ok(())
    }
}
