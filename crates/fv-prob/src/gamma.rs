//! Log-gamma and regularized incomplete gamma functions.

use fv_core::{Error, Result};
use statrs::function::gamma;

/// Natural log of the gamma function, `ln Gamma(x)` for `x > 0`.
pub fn ln_gamma(x: f64) -> Result<f64> {
    if !(x.is_finite() && x > 0.0) {
        return Err(Error::Computation(format!("ln_gamma requires x > 0, got {x}")));
    }
    Ok(gamma::ln_gamma(x))
}

/// Regularized upper incomplete gamma function `Q(a, x)`.
///
/// `Q(a, 0) = 1` and `Q(a, x) -> 0` as `x -> inf`.
pub fn regularized_upper_gamma(a: f64, x: f64) -> Result<f64> {
    if !(a.is_finite() && a > 0.0) {
        return Err(Error::Computation(format!("incomplete gamma requires a > 0, got {a}")));
    }
    if !x.is_finite() || x < 0.0 {
        return Err(Error::Computation(format!("incomplete gamma requires x >= 0, got {x}")));
    }
    if x == 0.0 {
        return Ok(1.0);
    }
    Ok(gamma::gamma_ur(a, x))
}

/// Regularized lower incomplete gamma function `P(a, x) = 1 - Q(a, x)`.
pub fn regularized_lower_gamma(a: f64, x: f64) -> Result<f64> {
    Ok(1.0 - regularized_upper_gamma(a, x)?)
}
