/// Linear warmup to the base learning rate, then constant. Iteration `t` trains with
/// `base_lr * min((t + 1) / warmup_steps, 1)`.
#[derive(Debug, Clone, Copy)]
pub struct LinearWarmup {
    pub base_lr: f64,
    pub warmup_steps: usize,
}

impl LinearWarmup {
    pub fn new(base_lr: f64, warmup_steps: usize) -> Self {
        Self {
            base_lr,
            warmup_steps,
        }
    }

    pub fn factor(&self, iteration: usize) -> f64 {
        if self.warmup_steps == 0 {
            return 1.;
        }
        ((iteration + 1) as f64 / self.warmup_steps as f64).min(1.)
    }

    pub fn learning_rate(&self, iteration: usize) -> f64 {
        self.base_lr * self.factor(iteration)
    }
}

#[cfg(test)]
mod test {
    use super::LinearWarmup;

    #[test]
    fn warms_up_then_holds() {
        let schedule = LinearWarmup::new(1e-4, 10);
        for t in 0..10 {
            let expected = 1e-4 * (t + 1) as f64 / 10.;
            assert!((schedule.learning_rate(t) - expected).abs() < 1e-15);
        }
        for t in [10, 11, 1000] {
            assert_eq!(schedule.learning_rate(t), 1e-4);
        }
        assert_eq!(LinearWarmup::new(0.5, 0).learning_rate(0), 0.5);
    }
}
