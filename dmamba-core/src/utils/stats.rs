/// Arithmetic mean, NaN for an empty slice.
pub fn mean(xs: &[f64]) -> f64 {
    xs.iter().sum::<f64>() / xs.len() as f64
}

/// Population standard deviation (no Bessel correction).
pub fn std(xs: &[f64]) -> f64 {
    let mean = mean(xs);
    let variance = xs.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / xs.len() as f64;
    variance.sqrt()
}

#[cfg(test)]
mod test {
    #[test]
    fn population_statistics() {
        let xs = [2., 4., 4., 4., 5., 5., 7., 9.];
        assert_eq!(super::mean(&xs), 5.);
        assert_eq!(super::std(&xs), 2.);
        assert_eq!(super::std(&[3.]), 0.);
    }
}
