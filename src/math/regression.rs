//! Least-squares goodness-of-fit for calibration scoring

/// Coefficient of determination between paired samples
///
/// Computes the squared Pearson correlation of `x` against `y`. Series
/// shorter than two points, length mismatches, and zero-variance series
/// all score 0.0 so a degenerate replication ranks last instead of
/// poisoning the fit product.
pub fn r_squared(x: &[f64], y: &[f64]) -> f64 {
    if x.len() != y.len() || x.len() < 2 {
        return 0.0;
    }

    let n = x.len() as f64;
    let mean_x = x.iter().sum::<f64>() / n;
    let mean_y = y.iter().sum::<f64>() / n;

    let mut cov = 0.0;
    let mut var_x = 0.0;
    let mut var_y = 0.0;
    for (&xi, &yi) in x.iter().zip(y.iter()) {
        let dx = xi - mean_x;
        let dy = yi - mean_y;
        cov += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }

    if var_x <= 0.0 || var_y <= 0.0 {
        return 0.0;
    }

    let r = cov / (var_x * var_y).sqrt();
    if r.is_finite() { (r * r).min(1.0) } else { 0.0 }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn perfect_linear_fit_scores_one() {
        let x = [1.0, 2.0, 3.0, 4.0];
        let y = [10.0, 20.0, 30.0, 40.0];
        assert!((r_squared(&x, &y) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn negative_slope_still_scores_high() {
        let x = [1.0, 2.0, 3.0];
        let y = [9.0, 6.0, 3.0];
        assert!((r_squared(&x, &y) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn constant_series_scores_zero() {
        let x = [5.0, 5.0, 5.0];
        let y = [1.0, 2.0, 3.0];
        assert_eq!(r_squared(&x, &y), 0.0);
        assert_eq!(r_squared(&y, &x), 0.0);
    }

    #[test]
    fn short_or_mismatched_series_score_zero() {
        assert_eq!(r_squared(&[1.0], &[2.0]), 0.0);
        assert_eq!(r_squared(&[1.0, 2.0], &[2.0]), 0.0);
        assert_eq!(r_squared(&[], &[]), 0.0);
    }

    #[test]
    fn noisy_fit_scores_between_zero_and_one() {
        let x = [1.0, 2.0, 3.0, 4.0, 5.0];
        let y = [1.2, 1.9, 3.4, 3.8, 5.1];
        let r2 = r_squared(&x, &y);
        assert!(r2 > 0.9 && r2 < 1.0);
    }
}
