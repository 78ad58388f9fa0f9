//! Gaussian CDF and quantile helpers.

use fv_core::{Error, Result};
use statrs::distribution::{ContinuousCDF, Normal};

#[inline]
fn standard_normal() -> Normal {
    // Safe by construction for mean=0, sigma=1.
    Normal::new(0.0, 1.0).expect("standard normal should be constructible")
}

/// CDF of the standard normal at `z`.
#[inline]
pub fn ugaussian_cdf(z: f64) -> f64 {
    standard_normal().cdf(z)
}

/// Quantile of the standard normal: `Phi^-1(p)` for `p` in `(0, 1)`.
pub fn ugaussian_inv_cdf(p: f64) -> Result<f64> {
    if !(p.is_finite() && p > 0.0 && p < 1.0) {
        return Err(Error::Computation(format!("normal quantile requires p in (0,1), got {p}")));
    }
    Ok(standard_normal().inverse_cdf(p))
}

/// CDF of a centered Gaussian with standard deviation `sigma` at `x`.
pub fn gaussian_cdf(x: f64, sigma: f64) -> Result<f64> {
    if !(sigma.is_finite() && sigma > 0.0) {
        return Err(Error::Computation(format!("sigma must be finite and > 0, got {sigma}")));
    }
    Ok(ugaussian_cdf(x / sigma))
}

/// Quantile of a centered Gaussian with standard deviation `sigma`.
pub fn gaussian_inv_cdf(p: f64, sigma: f64) -> Result<f64> {
    if !(sigma.is_finite() && sigma > 0.0) {
        return Err(Error::Computation(format!("sigma must be finite and > 0, got {sigma}")));
    }
    Ok(sigma * ugaussian_inv_cdf(p)?)
}

/// Gaussian-equivalent significance of a central probability mass.
///
/// Maps the probability `p` contained in the smallest interval around the
/// mode to standard-normal sigma units: `Phi^-1((p+1)/2)`. `p = 0.6827`
/// gives 1 sigma.
pub fn sigma_from_central_probability(p: f64) -> Result<f64> {
    if !(p.is_finite() && (0.0..=1.0).contains(&p)) {
        return Err(Error::Computation(format!("central probability must be in [0,1], got {p}")));
    }
    if p >= 1.0 {
        return Ok(f64::INFINITY);
    }
    if p == 0.0 {
        return Ok(0.0);
    }
    ugaussian_inv_cdf((p + 1.0) / 2.0)
}
