//! The combined log-likelihood.
//!
//! Owns the parameter set, the observable cache and every constraint, and
//! sums block log-densities at the current parameter point. Also provides
//! the parametric-bootstrap goodness-of-fit calibration of that sum.

use std::fmt;

use fv_core::{ObservableRef, Parameters, Result};
use rand::SeedableRng;

use crate::block::LikelihoodBlock;
use crate::cache::ObservableCache;
use crate::constraint::Constraint;

/// Bootstrap estimate of the goodness-of-fit p-value.
#[derive(Debug, Clone, Copy)]
pub struct PValue {
    /// Observed fraction of pseudo-experiments below the observed statistic.
    pub p: f64,
    /// One-sigma uncertainty of the estimate, from the posterior mean of a
    /// binomial with a flat prior.
    pub uncertainty: f64,
}

/// Sum of likelihood-block log-densities over all constraints.
pub struct LogLikelihood {
    parameters: Parameters,
    cache: ObservableCache,
    constraints: Vec<Constraint>,
}

impl LogLikelihood {
    /// Create an empty likelihood over a parameter set.
    pub fn new(parameters: Parameters) -> Self {
        let cache = ObservableCache::new(parameters.clone());
        Self { parameters, cache, constraints: Vec::new() }
    }

    /// The parameter set all observables evaluate against.
    pub fn parameters(&self) -> &Parameters {
        &self.parameters
    }

    /// The internal observable cache. Blocks destined for this likelihood
    /// are built against it (or against any cache and then [`add`]ed, which
    /// clones them over).
    ///
    /// [`add`]: LogLikelihood::add
    pub fn cache_mut(&mut self) -> &mut ObservableCache {
        &mut self.cache
    }

    /// The internal observable cache, read-only.
    pub fn cache(&self) -> &ObservableCache {
        &self.cache
    }

    /// The constraints added so far.
    pub fn constraints(&self) -> &[Constraint] {
        &self.constraints
    }

    /// Add a constraint, cloning its blocks onto the internal cache and
    /// re-binding its observables to this likelihood's parameters.
    pub fn add(&mut self, constraint: &Constraint) -> Result<()> {
        let blocks = constraint
            .blocks()
            .iter()
            .map(|b| b.clone_onto(&mut self.cache))
            .collect::<Result<Vec<_>>>()?;
        let observables = constraint
            .observables()
            .iter()
            .map(|o| o.clone_with(self.parameters.clone()))
            .collect();
        tracing::debug!(name = constraint.name(), blocks = blocks.len(), "constraint added");
        self.constraints.push(Constraint::new(constraint.name(), observables, blocks));
        Ok(())
    }

    /// Shortcut: add a single two-piece Gaussian constraint named after
    /// the observable.
    pub fn add_gaussian(
        &mut self,
        observable: ObservableRef,
        min: f64,
        central: f64,
        max: f64,
        number_of_observations: usize,
    ) -> Result<()> {
        let name = observable.name().to_string();
        let block = LikelihoodBlock::gaussian(
            &mut self.cache,
            observable.clone(),
            min,
            central,
            max,
            number_of_observations,
        )?;
        self.constraints.push(Constraint::new(name, vec![observable], vec![block]));
        Ok(())
    }

    /// Total observation count over all constraints.
    pub fn number_of_observations(&self) -> usize {
        self.constraints.iter().map(|c| c.number_of_observations()).sum()
    }

    /// The log-likelihood at the current parameter point.
    ///
    /// Updates the cache first; at an unchanged parameter point the
    /// predictions are reused.
    pub fn evaluate(&mut self) -> Result<f64> {
        self.cache.update()?;
        let mut total = 0.0;
        for constraint in &self.constraints {
            for block in constraint.blocks() {
                total += block.evaluate(&self.cache)?;
            }
        }
        Ok(total)
    }

    /// Goodness-of-fit p-value by parametric bootstrap.
    ///
    /// The observed statistic sums only blocks carrying observations, so
    /// priors (zero observations) do not dilute it; pseudo-experiments
    /// sample every block. The RNG is seeded with the dataset count, so a
    /// given call is reproducible.
    pub fn bootstrap_p_value(&mut self, datasets: usize) -> Result<PValue> {
        self.cache.update()?;

        let mut t_obs = 0.0;
        for constraint in &self.constraints {
            for block in constraint.blocks() {
                if block.number_of_observations() > 0 {
                    t_obs += block.evaluate(&self.cache)?;
                }
            }
        }
        tracing::info!(t_obs, "bootstrap: observed test statistic");

        let mut rng = rand::rngs::StdRng::seed_from_u64(datasets as u64);
        let mut n_low = 0_usize;
        for _ in 0..datasets {
            let mut t = 0.0;
            for constraint in &self.constraints {
                for block in constraint.blocks() {
                    t += block.sample(&self.cache, &mut rng)?;
                }
            }
            if t < t_obs {
                n_low += 1;
            }
        }

        let n = datasets as f64;
        let p = n_low as f64 / n;
        let p_expected = (n_low as f64 + 1.0) / (n + 2.0);
        let uncertainty = (p_expected * (1.0 - p_expected) / (n + 3.0)).sqrt();
        tracing::info!(p, uncertainty, datasets, "bootstrap: p-value estimated");

        Ok(PValue { p, uncertainty })
    }

    /// Independent copy: own parameter values, fresh cache, cloned
    /// constraints. Changes on either side are invisible to the other.
    pub fn try_clone(&self) -> Result<LogLikelihood> {
        let parameters = self.parameters.independent_copy();
        let mut clone = LogLikelihood::new(parameters);
        for constraint in &self.constraints {
            clone.add(constraint)?;
        }
        Ok(clone)
    }
}

impl fmt::Display for LogLikelihood {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LogLikelihood({} constraints)", self.constraints.len())?;
        for constraint in &self.constraints {
            write!(f, "\n  {constraint}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use fv_core::ParameterObservable;

    fn gaussian_norm(sigma_sum: f64) -> f64 {
        ((2.0 / std::f64::consts::PI).sqrt() / sigma_sum).ln()
    }

    #[test]
    fn test_evaluate_sums_blocks() {
        let p = Parameters::new();
        p.declare("x", 0.0);
        p.declare("y", 1.0);
        let mut llh = LogLikelihood::new(p);

        let obs_x = ParameterObservable::new(llh.parameters().clone(), "x");
        let obs_y = ParameterObservable::new(llh.parameters().clone(), "y");
        llh.add_gaussian(obs_x, -1.0, 0.0, 1.0, 1).unwrap();
        llh.add_gaussian(obs_y, 0.0, 1.0, 2.0, 1).unwrap();

        // Both predictions sit at their modes.
        let expected = 2.0 * gaussian_norm(2.0);
        assert_relative_eq!(llh.evaluate().unwrap(), expected, epsilon = 1e-12);
        assert_eq!(llh.number_of_observations(), 2);
    }

    #[test]
    fn test_add_gaussian_names_constraint_after_observable() {
        let p = Parameters::new();
        p.declare("B->Xll::BR", 0.0);
        let mut llh = LogLikelihood::new(p.clone());
        let obs = ParameterObservable::new(p, "B->Xll::BR");
        llh.add_gaussian(obs, -1.0, 0.0, 1.0, 1).unwrap();

        let constraint = &llh.constraints()[0];
        assert_eq!(constraint.name(), "B->Xll::BR");
        assert_eq!(constraint.observables().len(), 1);
        assert_eq!(constraint.observables()[0].name(), "B->Xll::BR");
    }

    #[test]
    fn test_evaluate_tracks_parameter_changes() {
        let p = Parameters::new();
        p.declare("x", 0.0);
        let mut llh = LogLikelihood::new(p.clone());
        let obs = ParameterObservable::new(p.clone(), "x");
        llh.add_gaussian(obs, -1.0, 0.0, 1.0, 1).unwrap();

        let at_mode = llh.evaluate().unwrap();
        p.set("x", 1.0).unwrap();
        let off_mode = llh.evaluate().unwrap();
        assert_relative_eq!(off_mode, at_mode - 0.5, epsilon = 1e-12);
    }

    #[test]
    fn test_add_clones_blocks_from_foreign_cache() {
        let p = Parameters::new();
        p.declare("x", 0.3);

        // Build the constraint against a scratch cache.
        let mut scratch = ObservableCache::new(p.clone());
        let obs = ParameterObservable::new(p.clone(), "x");
        let block =
            LikelihoodBlock::gaussian(&mut scratch, obs.clone(), -1.0, 0.0, 1.0, 1).unwrap();
        let constraint = Constraint::new("scratch::x", vec![obs], vec![block]);

        let mut llh = LogLikelihood::new(p);
        llh.add(&constraint).unwrap();
        assert_eq!(llh.constraints().len(), 1);
        assert_eq!(llh.cache().len(), 1);
        // The observable list came along, re-bound to our parameters.
        assert_eq!(llh.constraints()[0].observables().len(), 1);
        assert_eq!(llh.constraints()[0].observables()[0].name(), "x");
        assert_relative_eq!(
            llh.evaluate().unwrap(),
            gaussian_norm(2.0) - 0.5 * 0.09,
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_try_clone_is_independent() {
        let p = Parameters::new();
        p.declare("x", 0.0);
        let mut llh = LogLikelihood::new(p.clone());
        let obs = ParameterObservable::new(p.clone(), "x");
        llh.add_gaussian(obs, -1.0, 0.0, 1.0, 1).unwrap();

        let mut twin = llh.try_clone().unwrap();
        assert_relative_eq!(twin.evaluate().unwrap(), llh.evaluate().unwrap(), epsilon = 1e-12);

        twin.parameters().set("x", 2.0).unwrap();
        assert_relative_eq!(twin.evaluate().unwrap(), gaussian_norm(2.0) - 2.0, epsilon = 1e-12);
        // Original untouched.
        assert_relative_eq!(llh.evaluate().unwrap(), gaussian_norm(2.0), epsilon = 1e-12);
    }

    #[test]
    fn test_bootstrap_p_value_good_fit() {
        let p = Parameters::new();
        p.declare("x", 0.0);
        let mut llh = LogLikelihood::new(p.clone());
        let obs = ParameterObservable::new(p, "x");
        llh.add_gaussian(obs, -1.0, 0.0, 1.0, 1).unwrap();

        // Theory at the mode: the observed statistic is maximal, every
        // pseudo-experiment falls below it.
        let pv = llh.bootstrap_p_value(500).unwrap();
        assert!(pv.p > 0.99, "p = {}", pv.p);
        assert!(pv.uncertainty > 0.0 && pv.uncertainty < 0.05);
    }

    #[test]
    fn test_bootstrap_p_value_bad_fit() {
        let p = Parameters::new();
        p.declare("x", 6.0);
        let mut llh = LogLikelihood::new(p.clone());
        let obs = ParameterObservable::new(p, "x");
        llh.add_gaussian(obs, -1.0, 0.0, 1.0, 1).unwrap();

        // Theory six sigma out: essentially no pseudo-experiment is worse.
        let pv = llh.bootstrap_p_value(500).unwrap();
        assert!(pv.p < 0.01, "p = {}", pv.p);
    }

    #[test]
    fn test_bootstrap_p_value_is_deterministic() {
        let p = Parameters::new();
        p.declare("x", 0.8);
        let mut llh = LogLikelihood::new(p.clone());
        let obs = ParameterObservable::new(p, "x");
        llh.add_gaussian(obs, -1.0, 0.0, 1.0, 1).unwrap();

        let a = llh.bootstrap_p_value(200).unwrap();
        let b = llh.bootstrap_p_value(200).unwrap();
        assert_eq!(a.p, b.p);
        assert_eq!(a.uncertainty, b.uncertainty);
    }

    #[test]
    fn test_prior_blocks_do_not_enter_observed_statistic() {
        let p = Parameters::new();
        p.declare("x", 0.0);
        p.declare("nuisance", 5.0);
        let mut llh = LogLikelihood::new(p.clone());
        let obs = ParameterObservable::new(p.clone(), "x");
        let prior = ParameterObservable::new(p, "nuisance");
        llh.add_gaussian(obs, -1.0, 0.0, 1.0, 1).unwrap();
        // Far-off prior with zero observations.
        llh.add_gaussian(prior, -1.0, 0.0, 1.0, 0).unwrap();

        // A five-sigma prior pull would crater p if it entered t_obs.
        let pv = llh.bootstrap_p_value(300).unwrap();
        assert!(pv.p > 0.9, "p = {}", pv.p);
    }
}
