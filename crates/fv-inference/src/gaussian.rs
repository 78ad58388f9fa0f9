//! Two-piece (asymmetric) Gaussian likelihood block.
//!
//! Models a measurement quoted as `central +sigma_upper -sigma_lower`: two
//! half-normals with different widths spliced at the mode. The coefficients
//! are fixed so that the density is continuous at the mode and integrates to
//! one, giving the normalization `sqrt(2/pi) / (sigma_lower + sigma_upper)`.

use std::fmt;

use fv_core::{Error, ObservableRef, Result};
use fv_prob::normal::gaussian_inv_cdf;
use rand::Rng;

use crate::cache::ObservableCache;

/// Asymmetric Gaussian block for a single observable.
pub struct GaussianBlock {
    observable: ObservableRef,
    id: usize,
    mode: f64,
    sigma_lower: f64,
    sigma_upper: f64,
    /// Log of the two-piece normalization, independent of x.
    norm: f64,
    number_of_observations: usize,
}

impl GaussianBlock {
    /// Build from `(min, central, max)` with `min < central < max`.
    pub fn new(
        cache: &mut ObservableCache,
        observable: ObservableRef,
        min: f64,
        central: f64,
        max: f64,
        number_of_observations: usize,
    ) -> Result<Self> {
        if min >= central {
            return Err(Error::Configuration(format!(
                "Gaussian block: min value ({min}) >= central value ({central})"
            )));
        }
        if max <= central {
            return Err(Error::Configuration(format!(
                "Gaussian block: max value ({max}) <= central value ({central})"
            )));
        }

        let sigma_lower = central - min;
        let sigma_upper = max - central;
        let id = cache.add(observable.clone());

        Ok(Self {
            observable,
            id,
            mode: central,
            sigma_lower,
            sigma_upper,
            norm: ((2.0 / std::f64::consts::PI).sqrt() / (sigma_upper + sigma_lower)).ln(),
            number_of_observations,
        })
    }

    /// Log-density of the current cached prediction.
    pub fn evaluate(&self, cache: &ObservableCache) -> Result<f64> {
        let value = cache.value(self.id);

        // Side-dependent uncertainty.
        let sigma = if value > self.mode { self.sigma_upper } else { self.sigma_lower };

        let chi = (value - self.mode) / sigma;
        Ok(self.norm - chi * chi / 2.0)
    }

    /// Draw one pseudo-observation and return its log-density.
    ///
    /// The experimental distribution is mirrored and shifted onto the fixed
    /// theory prediction: without a full forward model, the theory value is
    /// taken as the most likely outcome and the experimental uncertainties
    /// carried over. The returned log-density is evaluated with the
    /// theory-centered mean, which is what calibrates the test statistic.
    pub fn sample<R: Rng>(&self, cache: &ObservableCache, rng: &mut R) -> Result<f64> {
        let u: f64 = rng.random();

        let a = self.sigma_lower;
        let b = self.sigma_upper;
        let c_b = 2.0 * b / (a + b);

        // Fixed theory prediction.
        let theory = cache.value(self.id);

        // Inverse-transform draw from the two-piece density. The uniform is
        // half-open, so guard the p = 0 edge of the quantile function.
        let (obs, sigma) = if u < b / (a + b) {
            let p = (u / c_b).max(f64::MIN_POSITIVE);
            (gaussian_inv_cdf(p, b)? + theory, b)
        } else {
            let p = (u - 0.5 * c_b).max(f64::MIN_POSITIVE);
            (gaussian_inv_cdf(p, a)? + theory, a)
        };

        let chi = (theory - obs) / sigma;
        Ok(self.norm - chi * chi / 2.0)
    }

    /// Signed distance from the mode in side-appropriate sigma units.
    ///
    /// Positive when the measured mode exceeds the prediction.
    pub fn significance(&self, cache: &ObservableCache) -> f64 {
        let value = cache.value(self.id);
        let sigma = if value > self.mode { self.sigma_upper } else { self.sigma_lower };
        (self.mode - value) / sigma
    }

    /// Number of observations this block represents (0 = prior-only).
    pub fn number_of_observations(&self) -> usize {
        self.number_of_observations
    }

    /// Clone onto a target cache, re-binding the observable to its
    /// parameter set.
    pub fn clone_onto(&self, cache: &mut ObservableCache) -> Result<Self> {
        let observable = self.observable.clone_with(cache.parameters().clone());
        Self::new(
            cache,
            observable,
            self.mode - self.sigma_lower,
            self.mode,
            self.mode + self.sigma_upper,
            self.number_of_observations,
        )
    }
}

impl fmt::Display for GaussianBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Gaussian: {}", self.mode)?;
        if self.sigma_upper == self.sigma_lower {
            write!(f, " +- {}", self.sigma_upper)?;
        } else {
            write!(f, " + {} - {}", self.sigma_upper, self.sigma_lower)?;
        }
        if self.number_of_observations == 0 {
            write!(f, "; no observation")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use fv_core::{ParameterObservable, Parameters};

    fn block_at(value: f64, min: f64, central: f64, max: f64) -> (GaussianBlock, ObservableCache) {
        let p = Parameters::new();
        p.declare("obs", value);
        let mut cache = ObservableCache::new(p.clone());
        let obs = ParameterObservable::new(p, "obs");
        let block = GaussianBlock::new(&mut cache, obs, min, central, max, 1).unwrap();
        cache.update().unwrap();
        (block, cache)
    }

    #[test]
    fn test_evaluate_at_mode() {
        let (block, cache) = block_at(2.0, 1.0, 2.0, 4.0);
        let expected = ((2.0 / std::f64::consts::PI).sqrt() / 3.0).ln();
        assert_relative_eq!(block.evaluate(&cache).unwrap(), expected, epsilon = 1e-12);
    }

    #[test]
    fn test_evaluate_above_mode_uses_sigma_upper() {
        let (block, cache) = block_at(3.0, 1.0, 2.0, 4.0);
        let norm = ((2.0 / std::f64::consts::PI).sqrt() / 3.0).ln();
        // chi = (3 - 2) / 2 = 1/2
        assert_relative_eq!(block.evaluate(&cache).unwrap(), norm - 0.125, epsilon = 1e-12);
    }

    #[test]
    fn test_evaluate_below_mode_uses_sigma_lower() {
        let (block, cache) = block_at(1.0, 1.0, 2.0, 4.0);
        let norm = ((2.0 / std::f64::consts::PI).sqrt() / 3.0).ln();
        assert_relative_eq!(block.evaluate(&cache).unwrap(), norm - 0.5, epsilon = 1e-12);
    }

    #[test]
    fn test_asymmetric_density_integrates_to_one() {
        // Trapezoidal integral of exp(evaluate) out to 10 sigma on each side.
        let p = Parameters::new();
        p.declare("obs", 0.0);
        let mut cache = ObservableCache::new(p.clone());
        let obs = ParameterObservable::new(p.clone(), "obs");
        // sigma_lower = 2, sigma_upper = 1
        let block = GaussianBlock::new(&mut cache, obs, -2.0, 0.0, 1.0, 1).unwrap();

        let n = 20_000;
        let (lo, hi) = (-20.0, 10.0);
        let h = (hi - lo) / n as f64;
        let mut integral = 0.0;
        for i in 0..=n {
            p.set("obs", lo + i as f64 * h).unwrap();
            cache.update().unwrap();
            let w = if i == 0 || i == n { 0.5 } else { 1.0 };
            integral += w * block.evaluate(&cache).unwrap().exp();
        }
        integral *= h;
        assert_relative_eq!(integral, 1.0, epsilon = 1e-6);
    }

    #[test]
    fn test_significance_symmetric() {
        for k in [-2.0, -1.0, 0.0, 0.5, 3.0] {
            let (block, cache) = block_at(k, -1.0, 0.0, 1.0);
            assert_relative_eq!(block.significance(&cache), -k, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_significance_asymmetric_sides() {
        // sigma_lower = 1, sigma_upper = 2.
        let (block, cache) = block_at(4.0, 1.0, 2.0, 4.0);
        assert_relative_eq!(block.significance(&cache), -1.0, epsilon = 1e-12);
        let (block, cache) = block_at(1.0, 1.0, 2.0, 4.0);
        assert_relative_eq!(block.significance(&cache), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_invalid_ordering_rejected() {
        let p = Parameters::new();
        p.declare("obs", 0.0);
        let mut cache = ObservableCache::new(p.clone());
        let obs = ParameterObservable::new(p, "obs");
        assert!(GaussianBlock::new(&mut cache, obs.clone(), 3.0, 2.0, 4.0, 1).is_err());
        assert!(GaussianBlock::new(&mut cache, obs, 1.0, 2.0, 2.0, 1).is_err());
    }

    #[test]
    fn test_sample_log_density_is_bounded_by_norm() {
        use rand::SeedableRng;
        let (block, cache) = block_at(0.5, -1.0, 0.0, 1.0);
        let mut rng = rand::rngs::StdRng::seed_from_u64(7);
        let norm = ((2.0 / std::f64::consts::PI).sqrt() / 2.0).ln();
        for _ in 0..500 {
            let lp = block.sample(&cache, &mut rng).unwrap();
            assert!(lp <= norm + 1e-12);
        }
    }
}
