//! The likelihood-block union.
//!
//! Every experimental constraint is built from a fixed set of block kinds;
//! the closed enum keeps dispatch static and lets constraints own their
//! blocks by value. New densities are added here, not through a trait
//! object.

use std::fmt;

use fv_core::{Error, ObservableRef, Result};
use nalgebra::{DMatrix, DVector};
use rand::Rng;

use crate::amoroso::AmorosoBlock;
use crate::cache::ObservableCache;
use crate::gaussian::GaussianBlock;
use crate::log_gamma::LogGammaBlock;
use crate::mixture::MixtureBlock;
use crate::multivariate::MultivariateGaussianBlock;

/// One probability-density contribution to a log-likelihood.
pub enum LikelihoodBlock {
    /// Two-piece (asymmetric) Gaussian.
    Gaussian(GaussianBlock),
    /// LogGamma for significantly skewed measurements.
    LogGamma(LogGammaBlock),
    /// Amoroso for one-sided limits.
    Amoroso(AmorosoBlock),
    /// Correlated multivariate Gaussian.
    MultivariateGaussian(MultivariateGaussianBlock),
    /// Weighted mixture of blocks.
    Mixture(MixtureBlock),
}

impl LikelihoodBlock {
    /// Two-piece Gaussian from `(min, central, max)`.
    pub fn gaussian(
        cache: &mut ObservableCache,
        observable: ObservableRef,
        min: f64,
        central: f64,
        max: f64,
        number_of_observations: usize,
    ) -> Result<Self> {
        GaussianBlock::new(cache, observable, min, central, max, number_of_observations)
            .map(Self::Gaussian)
    }

    /// LogGamma from `(min, central, max)`, fitting the shape parameters.
    pub fn log_gamma(
        cache: &mut ObservableCache,
        observable: ObservableRef,
        min: f64,
        central: f64,
        max: f64,
        number_of_observations: usize,
    ) -> Result<Self> {
        LogGammaBlock::fit(cache, observable, min, central, max, number_of_observations)
            .map(Self::LogGamma)
    }

    /// LogGamma with explicit shape parameters, verified against the
    /// interval.
    #[allow(clippy::too_many_arguments)]
    pub fn log_gamma_with_shape(
        cache: &mut ObservableCache,
        observable: ObservableRef,
        min: f64,
        central: f64,
        max: f64,
        lambda: f64,
        alpha: f64,
        number_of_observations: usize,
    ) -> Result<Self> {
        LogGammaBlock::with_shape(
            cache,
            observable,
            min,
            central,
            max,
            lambda,
            alpha,
            number_of_observations,
        )
        .map(Self::LogGamma)
    }

    /// Amoroso with explicit shape parameters and no quantile checks.
    #[allow(clippy::too_many_arguments)]
    pub fn amoroso(
        cache: &mut ObservableCache,
        observable: ObservableRef,
        physical_limit: f64,
        theta: f64,
        alpha: f64,
        beta: f64,
        number_of_observations: usize,
    ) -> Result<Self> {
        AmorosoBlock::new(
            cache,
            observable,
            physical_limit,
            theta,
            alpha,
            beta,
            number_of_observations,
        )
        .map(Self::Amoroso)
    }

    /// Amoroso upper limit with the density maximal at the physical limit.
    #[allow(clippy::too_many_arguments)]
    pub fn amoroso_limit(
        cache: &mut ObservableCache,
        observable: ObservableRef,
        physical_limit: f64,
        upper_limit_90: f64,
        upper_limit_95: f64,
        theta: f64,
        alpha: f64,
        number_of_observations: usize,
    ) -> Result<Self> {
        AmorosoBlock::limit(
            cache,
            observable,
            physical_limit,
            upper_limit_90,
            upper_limit_95,
            theta,
            alpha,
            number_of_observations,
        )
        .map(Self::Amoroso)
    }

    /// Amoroso from a quoted mode and two upper limits.
    #[allow(clippy::too_many_arguments)]
    pub fn amoroso_mode(
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
        AmorosoBlock::with_mode(
            cache,
            observable,
            physical_limit,
            mode,
            upper_limit_90,
            upper_limit_95,
            theta,
            alpha,
            beta,
            number_of_observations,
        )
        .map(Self::Amoroso)
    }

    /// Amoroso from three quoted quantiles (10%, 50%, 90%).
    #[allow(clippy::too_many_arguments)]
    pub fn amoroso_quantiles(
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
        AmorosoBlock::with_quantiles(
            cache,
            observable,
            physical_limit,
            upper_limit_10,
            upper_limit_50,
            upper_limit_90,
            theta,
            alpha,
            beta,
            number_of_observations,
        )
        .map(Self::Amoroso)
    }

    /// Multivariate Gaussian from means and a row-major covariance.
    pub fn multivariate_gaussian(
        cache: &mut ObservableCache,
        observables: Vec<ObservableRef>,
        mean: &[f64],
        covariance: &[f64],
        number_of_observations: usize,
    ) -> Result<Self> {
        let dim = observables.len();
        if covariance.len() != dim * dim {
            return Err(Error::Configuration(format!(
                "MultivariateGaussian block: covariance has {} entries, expected {}",
                covariance.len(),
                dim * dim
            )));
        }
        MultivariateGaussianBlock::new(
            cache,
            observables,
            DVector::from_row_slice(mean),
            DMatrix::from_row_slice(dim, dim, covariance),
            number_of_observations,
        )
        .map(Self::MultivariateGaussian)
    }

    /// Weighted mixture of already-built blocks.
    pub fn mixture(components: Vec<LikelihoodBlock>, weights: Vec<f64>) -> Result<Self> {
        MixtureBlock::new(components, weights).map(Self::Mixture)
    }

    /// Log-density of the current cached predictions.
    pub fn evaluate(&self, cache: &ObservableCache) -> Result<f64> {
        match self {
            Self::Gaussian(b) => b.evaluate(cache),
            Self::LogGamma(b) => b.evaluate(cache),
            Self::Amoroso(b) => b.evaluate(cache),
            Self::MultivariateGaussian(b) => b.evaluate(cache),
            Self::Mixture(b) => b.evaluate(cache),
        }
    }

    /// Draw one pseudo-observation and return its log-density.
    pub fn sample<R: Rng>(&self, cache: &ObservableCache, rng: &mut R) -> Result<f64> {
        match self {
            Self::Gaussian(b) => b.sample(cache, rng),
            Self::LogGamma(b) => b.sample(cache, rng),
            Self::Amoroso(b) => b.sample(cache, rng),
            Self::MultivariateGaussian(b) => b.sample(cache, rng),
            Self::Mixture(b) => b.sample(),
        }
    }

    /// Gaussian-equivalent significance of the current prediction.
    pub fn significance(&self, cache: &ObservableCache) -> Result<f64> {
        match self {
            Self::Gaussian(b) => Ok(b.significance(cache)),
            Self::LogGamma(b) => b.significance(cache),
            Self::Amoroso(b) => b.significance(cache),
            Self::MultivariateGaussian(b) => b.significance(cache),
            Self::Mixture(b) => b.significance(),
        }
    }

    /// Number of observations this block represents (0 = prior-only).
    pub fn number_of_observations(&self) -> usize {
        match self {
            Self::Gaussian(b) => b.number_of_observations(),
            Self::LogGamma(b) => b.number_of_observations(),
            Self::Amoroso(b) => b.number_of_observations(),
            Self::MultivariateGaussian(b) => b.number_of_observations(),
            Self::Mixture(b) => b.number_of_observations(),
        }
    }

    /// Clone onto a target cache, re-binding every observable to the
    /// cache's parameter set.
    pub fn clone_onto(&self, cache: &mut ObservableCache) -> Result<Self> {
        match self {
            Self::Gaussian(b) => b.clone_onto(cache).map(Self::Gaussian),
            Self::LogGamma(b) => b.clone_onto(cache).map(Self::LogGamma),
            Self::Amoroso(b) => b.clone_onto(cache).map(Self::Amoroso),
            Self::MultivariateGaussian(b) => {
                b.clone_onto(cache).map(Self::MultivariateGaussian)
            }
            Self::Mixture(b) => b.clone_onto(cache).map(Self::Mixture),
        }
    }
}

impl fmt::Display for LikelihoodBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Gaussian(b) => b.fmt(f),
            Self::LogGamma(b) => b.fmt(f),
            Self::Amoroso(b) => b.fmt(f),
            Self::MultivariateGaussian(b) => b.fmt(f),
            Self::Mixture(b) => b.fmt(f),
        }
    }
}
