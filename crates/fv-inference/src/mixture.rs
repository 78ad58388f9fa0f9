//! Finite mixture of likelihood blocks.
//!
//! Combines component densities as `sum_i w_i p_i(x)` with normalized
//! non-negative weights, evaluated stably in log space. Used when an
//! experiment publishes a likelihood that is itself multimodal.

use std::fmt;

use fv_core::{Error, Result};
use fv_prob::math::log_mixture;

use crate::block::LikelihoodBlock;
use crate::cache::ObservableCache;

/// Weighted mixture over component blocks.
pub struct MixtureBlock {
    components: Vec<LikelihoodBlock>,
    /// Normalized to unit sum on construction.
    weights: Vec<f64>,
}

impl MixtureBlock {
    /// Build from components and their (unnormalized) weights.
    pub fn new(components: Vec<LikelihoodBlock>, weights: Vec<f64>) -> Result<Self> {
        if components.is_empty() {
            return Err(Error::Configuration("Mixture block: no components given".to_string()));
        }
        if components.len() != weights.len() {
            return Err(Error::Configuration(format!(
                "Mixture block: {} components but {} weights",
                components.len(),
                weights.len()
            )));
        }
        if weights.iter().any(|w| !w.is_finite() || *w < 0.0) {
            return Err(Error::Configuration(format!(
                "Mixture block: weights must be finite and non-negative, got {weights:?}"
            )));
        }
        let total: f64 = weights.iter().sum();
        if total <= 0.0 {
            return Err(Error::Configuration(
                "Mixture block: weights must not all vanish".to_string(),
            ));
        }

        let weights = weights.into_iter().map(|w| w / total).collect();
        Ok(Self { components, weights })
    }

    /// Number of mixture components.
    pub fn len(&self) -> usize {
        self.components.len()
    }

    /// Whether the mixture has no components (never true after construction).
    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    /// Log of the weighted component-density sum.
    pub fn evaluate(&self, cache: &ObservableCache) -> Result<f64> {
        let mut log_densities = Vec::with_capacity(self.components.len());
        for component in &self.components {
            log_densities.push(component.evaluate(cache)?);
        }
        Ok(log_mixture(&log_densities, &self.weights))
    }

    /// Sampling from a mixture is not supported.
    pub fn sample(&self) -> Result<f64> {
        Err(Error::Unsupported("sampling from a mixture block".to_string()))
    }

    /// A scalar significance is not defined for a mixture.
    pub fn significance(&self) -> Result<f64> {
        Err(Error::Unsupported("significance of a mixture block".to_string()))
    }

    /// Total observation count over all components.
    pub fn number_of_observations(&self) -> usize {
        self.components.iter().map(|c| c.number_of_observations()).sum()
    }

    /// Clone onto a target cache, cloning every component.
    pub fn clone_onto(&self, cache: &mut ObservableCache) -> Result<Self> {
        let components = self
            .components
            .iter()
            .map(|c| c.clone_onto(cache))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { components, weights: self.weights.clone() })
    }
}

impl fmt::Display for MixtureBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Mixture({} components)", self.components.len())
    }
}
