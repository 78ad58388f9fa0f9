//! Chi-square CDF helper.

use fv_core::{Error, Result};
use statrs::distribution::{ChiSquared, ContinuousCDF};

/// CDF of a chi-square distribution with `k` degrees of freedom at `x`.
pub fn chi_squared_cdf(x: f64, k: usize) -> Result<f64> {
    if k == 0 {
        return Err(Error::Computation("chi-square requires at least 1 degree of freedom".to_string()));
    }
    if !x.is_finite() || x < 0.0 {
        return Err(Error::Computation(format!("chi-square statistic must be finite and >= 0, got {x}")));
    }
    let dist = ChiSquared::new(k as f64)
        .map_err(|e| Error::Computation(format!("chi-square({k}): {e}")))?;
    Ok(dist.cdf(x))
}
