//! Amoroso (generalized gamma) likelihood block.
//!
//! Encodes one-sided limits: a measurement quoted as upper limits at given
//! confidence levels above a physical boundary. The density is
//! `p(x) ~ (z)^(alpha*beta - 1) * exp(-z^beta)` with `z = (x - a)/theta`,
//! where `a` is the physical limit. Shape parameters come from an external
//! fit and are verified here against the quoted limits.

use std::fmt;

use fv_core::{Error, ObservableRef, Result};
use fv_prob::gamma::{ln_gamma, regularized_lower_gamma};
use fv_prob::normal::sigma_from_central_probability;
use fv_prob::roots::{self, DEFAULT_TOL, MAX_ITERATIONS};
use rand::Rng;
use rand_distr::Distribution;

use crate::cache::ObservableCache;
use crate::log_gamma::CHECK_EPS;

/// Amoroso block for a single observable bounded below by a physical limit.
pub struct AmorosoBlock {
    observable: ObservableRef,
    id: usize,
    physical_limit: f64,
    theta: f64,
    alpha: f64,
    beta: f64,
    /// `ln(beta/theta) - lnGamma(alpha)`, independent of x.
    norm: f64,
    number_of_observations: usize,
}

impl AmorosoBlock {
    /// Build from explicit shape parameters without quantile checks.
    pub fn new(
        cache: &mut ObservableCache,
        observable: ObservableRef,
        physical_limit: f64,
        theta: f64,
        alpha: f64,
        beta: f64,
        number_of_observations: usize,
    ) -> Result<Self> {
        for (name, value) in [("theta", theta), ("alpha", alpha), ("beta", beta)] {
            if !(value.is_finite() && value > 0.0) {
                return Err(Error::Configuration(format!(
                    "Amoroso block: {name} ({value}) must be finite and positive"
                )));
            }
        }

        let id = cache.add(observable.clone());
        Ok(Self {
            observable,
            id,
            physical_limit,
            theta,
            alpha,
            beta,
            norm: (beta / theta).ln() - ln_gamma(alpha)?,
            number_of_observations,
        })
    }

    /// Build from a boundary-mode limit: `beta = 1/alpha`, which puts the
    /// density maximum exactly on the physical limit. The 90% and 95% upper
    /// limits are verified.
    #[allow(clippy::too_many_arguments)]
    pub fn limit(
        cache: &mut ObservableCache,
        observable: ObservableRef,
        physical_limit: f64,
        upper_limit_90: f64,
        upper_limit_95: f64,
        theta: f64,
        alpha: f64,
        number_of_observations: usize,
    ) -> Result<Self> {
        let block = Self::new(
            cache,
            observable,
            physical_limit,
            theta,
            alpha,
            1.0 / alpha,
            number_of_observations,
        )?;
        block.check_quantile(upper_limit_90, 0.90)?;
        block.check_quantile(upper_limit_95, 0.95)?;
        Ok(block)
    }

    /// Build from a quoted mode and the 90% and 95% upper limits, all three
    /// verified against the shape parameters.
    #[allow(clippy::too_many_arguments)]
    pub fn with_mode(
        cache: &mut ObservableCache,
        observable: ObservableRef,
        physical_limit: f64,
        mode: f64,
        upper_limit_90: f64,
        upper_limit_95: f64,
        theta: f64,
        alpha: f64,
        beta: f64,
        number_of_observations: usize,
    ) -> Result<Self> {
        let block = Self::new(
            cache,
            observable,
            physical_limit,
            theta,
            alpha,
            beta,
            number_of_observations,
        )?;
        if (block.mode() - mode).abs() > CHECK_EPS {
            return Err(Error::Configuration(format!(
                "Amoroso block: for theta = {theta}, alpha = {alpha}, beta = {beta}, \
                 the mode is at {} instead of the quoted {mode}",
                block.mode()
            )));
        }
        block.check_quantile(upper_limit_90, 0.90)?;
        block.check_quantile(upper_limit_95, 0.95)?;
        Ok(block)
    }

    /// Build from three quoted quantiles (10%, 50%, 90%), all verified
    /// against the shape parameters.
    #[allow(clippy::too_many_arguments)]
    pub fn with_quantiles(
        cache: &mut ObservableCache,
        observable: ObservableRef,
        physical_limit: f64,
        upper_limit_10: f64,
        upper_limit_50: f64,
        upper_limit_90: f64,
        theta: f64,
        alpha: f64,
        beta: f64,
        number_of_observations: usize,
    ) -> Result<Self> {
        let block = Self::new(
            cache,
            observable,
            physical_limit,
            theta,
            alpha,
            beta,
            number_of_observations,
        )?;
        block.check_quantile(upper_limit_10, 0.10)?;
        block.check_quantile(upper_limit_50, 0.50)?;
        block.check_quantile(upper_limit_90, 0.90)?;
        Ok(block)
    }

    fn check_quantile(&self, upper_limit: f64, probability: f64) -> Result<()> {
        if upper_limit <= self.physical_limit {
            return Err(Error::Configuration(format!(
                "Amoroso block: upper limit ({upper_limit}) must exceed the physical \
                 limit ({})",
                self.physical_limit
            )));
        }
        let cdf = self.cdf(upper_limit)?;
        if (cdf - probability).abs() > CHECK_EPS {
            return Err(Error::Configuration(format!(
                "Amoroso block: for theta = {}, alpha = {}, beta = {}, the cumulative \
                 probability at {upper_limit} is {cdf:.6} instead of {probability}",
                self.theta, self.alpha, self.beta
            )));
        }
        Ok(())
    }

    /// Most likely value: the physical limit itself when `alpha*beta <= 1`.
    pub fn mode(&self) -> f64 {
        if self.alpha * self.beta > 1.0 {
            self.physical_limit + self.theta * (self.alpha - 1.0 / self.beta).powf(1.0 / self.beta)
        } else {
            self.physical_limit
        }
    }

    /// Cumulative distribution at `x`; zero below the physical limit.
    pub fn cdf(&self, x: f64) -> Result<f64> {
        if x <= self.physical_limit {
            return Ok(0.0);
        }
        let w = ((x - self.physical_limit) / self.theta).powf(self.beta);
        regularized_lower_gamma(self.alpha, w)
    }

    /// Log-density of the current cached prediction; `-inf` outside the
    /// physical region.
    pub fn evaluate(&self, cache: &ObservableCache) -> Result<f64> {
        Ok(self.log_density(cache.value(self.id)))
    }

    fn log_density(&self, x: f64) -> f64 {
        let z = (x - self.physical_limit) / self.theta;
        if z < 0.0 {
            return f64::NEG_INFINITY;
        }
        self.norm + (self.alpha * self.beta - 1.0) * z.ln() - z.powf(self.beta)
    }

    /// Draw one pseudo-observation and return its log-density.
    ///
    /// Limits carry no forward model to re-center on: draws come from the
    /// block's own distribution via a standard gamma and the power
    /// transform `x = a + theta * g^(1/beta)`.
    pub fn sample<R: Rng>(&self, _cache: &ObservableCache, rng: &mut R) -> Result<f64> {
        let standard_gamma = rand_distr::Gamma::new(self.alpha, 1.0)
            .map_err(|e| Error::Computation(format!("gamma sampler (alpha = {}): {e}", self.alpha)))?;
        let g: f64 = standard_gamma.sample(rng);
        let x = self.physical_limit + self.theta * g.powf(1.0 / self.beta);
        Ok(self.log_density(x))
    }

    /// Gaussian-equivalent significance of the current prediction.
    ///
    /// When the mode sits on the physical limit the density is monotonic,
    /// the enclosed mass is the CDF itself and the result is unsigned.
    /// Otherwise the equal-density mirror point on the far side of the mode
    /// is bracketed and bisected, and the sign is positive when the mode
    /// exceeds the prediction.
    pub fn significance(&self, cache: &ObservableCache) -> Result<f64> {
        let value = cache.value(self.id);
        let mode = self.mode();

        // Monotonic density: mode on the boundary, one-sided mass.
        if (self.alpha * self.beta - 1.0).abs() < 1e-13 || self.alpha * self.beta < 1.0 {
            return sigma_from_central_probability(self.cdf(value)?);
        }

        let p = if (value - mode).abs() < 1e-15 {
            0.0
        } else {
            let target = self.log_density(value);
            let g = |x: f64| self.log_density(x) - target;

            let (lo, hi) = if value > mode {
                // Mirror in (limit, mode): density falls to -inf at the limit.
                (self.physical_limit + 1e-15 * self.theta.max(1.0), mode)
            } else {
                // Bracket outward from the mode by doubling.
                let mut step = (mode - value).max(self.theta);
                let mut hi = mode + step;
                let mut tries = 0;
                while g(hi) > 0.0 {
                    step *= 2.0;
                    hi = mode + step;
                    tries += 1;
                    if tries > 200 {
                        return Err(Error::Computation(format!(
                            "Amoroso significance: no bracket for the mirror of {value}"
                        )));
                    }
                }
                (mode, hi)
            };

            let found = roots::bisect(g, lo, hi, DEFAULT_TOL, MAX_ITERATIONS)?;
            if !found.converged {
                tracing::error!(
                    mirror = found.root,
                    "Amoroso significance: mirror-point search did not converge, \
                     using the best estimate"
                );
            }
            (self.cdf(value)? - self.cdf(found.root)?).abs()
        };

        let abs_significance = sigma_from_central_probability(p)?;
        Ok(if mode > value { abs_significance } else { -abs_significance })
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
            self.physical_limit,
            self.theta,
            self.alpha,
            self.beta,
            self.number_of_observations,
        )
    }
}

impl fmt::Display for AmorosoBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Amoroso: limit = {}, theta = {}, alpha = {}, beta = {}",
            self.physical_limit, self.theta, self.alpha, self.beta
        )?;
        if self.number_of_observations == 0 {
            write!(f, "; no observation")?;
        }
        Ok(())
    }
}
