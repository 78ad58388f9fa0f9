//! Small numerically-stable math utilities used across probability code.

/// Stable `log(sum_i exp(x_i))`.
///
/// Shifts by the maximum before exponentiating so that the largest term
/// contributes `exp(0) = 1` and nothing overflows.
pub fn logsumexp(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NEG_INFINITY;
    }
    let max = values.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    if !max.is_finite() {
        return max;
    }
    let sum: f64 = values.iter().map(|v| (v - max).exp()).sum();
    max + sum.ln()
}

/// Stable `log(sum_i w_i exp(x_i))` for non-negative weights.
///
/// Weights enter linearly, so zero-weight components drop out even when
/// their log-density is `-inf`.
pub fn log_mixture(log_densities: &[f64], weights: &[f64]) -> f64 {
    debug_assert_eq!(log_densities.len(), weights.len());
    let max = log_densities.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    if !max.is_finite() {
        return max;
    }
    let sum: f64 = log_densities
        .iter()
        .zip(weights.iter())
        .map(|(&l, &w)| w * (l - max).exp())
        .sum();
    max + sum.ln()
}
