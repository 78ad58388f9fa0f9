//! Correlated multivariate Gaussian likelihood block.
//!
//! Constrains several observables at once with a full covariance matrix.
//! The covariance is Cholesky-factorized on construction: the factor drives
//! sampling, its inverse the density, and the log-determinant the
//! normalization.

use std::fmt;

use fv_core::{Error, ObservableRef, Result};
use fv_prob::chi_squared::chi_squared_cdf;
use fv_prob::normal::sigma_from_central_probability;
use nalgebra::{DMatrix, DVector};
use rand::Rng;
use rand_distr::StandardNormal;

use crate::cache::ObservableCache;

/// Multivariate Gaussian block over a vector of observables.
pub struct MultivariateGaussianBlock {
    observables: Vec<ObservableRef>,
    ids: Vec<usize>,
    mean: DVector<f64>,
    covariance: DMatrix<f64>,
    inverse: DMatrix<f64>,
    /// Lower Cholesky factor, used for sampling.
    chol_lower: DMatrix<f64>,
    /// `-k/2 ln(2 pi) - 1/2 ln det(cov)`, independent of x.
    norm: f64,
    number_of_observations: usize,
}

impl MultivariateGaussianBlock {
    /// Build from observables, their measured means and a covariance matrix.
    pub fn new(
        cache: &mut ObservableCache,
        observables: Vec<ObservableRef>,
        mean: DVector<f64>,
        covariance: DMatrix<f64>,
        number_of_observations: usize,
    ) -> Result<Self> {
        let dim = observables.len();
        if dim == 0 {
            return Err(Error::Configuration(
                "MultivariateGaussian block: no observables given".to_string(),
            ));
        }
        if mean.len() != dim {
            return Err(Error::Configuration(format!(
                "MultivariateGaussian block: {} observables but {} mean values",
                dim,
                mean.len()
            )));
        }
        if covariance.nrows() != dim || covariance.ncols() != dim {
            return Err(Error::Configuration(format!(
                "MultivariateGaussian block: covariance is {}x{}, expected {dim}x{dim}",
                covariance.nrows(),
                covariance.ncols()
            )));
        }
        for i in 0..dim {
            for j in 0..i {
                if (covariance[(i, j)] - covariance[(j, i)]).abs()
                    > 1e-12 * covariance[(i, i)].abs().max(1.0)
                {
                    return Err(Error::Configuration(format!(
                        "MultivariateGaussian block: covariance is not symmetric \
                         at ({i}, {j})"
                    )));
                }
            }
        }

        let cholesky = nalgebra::Cholesky::new(covariance.clone()).ok_or_else(|| {
            Error::Configuration(
                "MultivariateGaussian block: covariance is not positive definite".to_string(),
            )
        })?;
        let chol_lower = cholesky.l();
        let inverse = cholesky.inverse();

        // ln det(cov) = 2 * sum of the log-diagonal of the Cholesky factor.
        let log_det: f64 = 2.0 * chol_lower.diagonal().iter().map(|d| d.ln()).sum::<f64>();
        let norm =
            -0.5 * dim as f64 * (2.0 * std::f64::consts::PI).ln() - 0.5 * log_det;

        let ids = observables.iter().map(|o| cache.add(o.clone())).collect();
        Ok(Self {
            observables,
            ids,
            mean,
            covariance,
            inverse,
            chol_lower,
            norm,
            number_of_observations,
        })
    }

    /// Dimension of the constrained observable vector.
    pub fn dim(&self) -> usize {
        self.ids.len()
    }

    fn predictions(&self, cache: &ObservableCache) -> DVector<f64> {
        DVector::from_iterator(self.ids.len(), self.ids.iter().map(|&id| cache.value(id)))
    }

    fn quadratic_form(&self, chi: &DVector<f64>) -> f64 {
        (chi.transpose() * &self.inverse * chi)[(0, 0)]
    }

    /// Log-density of the current cached predictions.
    pub fn evaluate(&self, cache: &ObservableCache) -> Result<f64> {
        let chi = self.predictions(cache) - &self.mean;
        Ok(self.norm - 0.5 * self.quadratic_form(&chi))
    }

    /// Draw one pseudo-observation vector and return its log-density.
    ///
    /// As in the scalar case the distribution is re-centered on the theory
    /// predictions, with the experimental covariance carried over.
    pub fn sample<R: Rng>(&self, cache: &ObservableCache, rng: &mut R) -> Result<f64> {
        let z = DVector::from_iterator(
            self.ids.len(),
            (0..self.ids.len()).map(|_| rng.sample::<f64, _>(StandardNormal)),
        );
        let theory = self.predictions(cache);
        let observation = &theory + &self.chol_lower * z;

        let chi = theory - observation;
        Ok(self.norm - 0.5 * self.quadratic_form(&chi))
    }

    /// Gaussian-equivalent significance from the chi-square of the pull
    /// vector. Unsigned: there is no natural direction in several
    /// dimensions.
    pub fn significance(&self, cache: &ObservableCache) -> Result<f64> {
        let chi = self.predictions(cache) - &self.mean;
        let p = chi_squared_cdf(self.quadratic_form(&chi), self.dim())?;
        sigma_from_central_probability(p)
    }

    /// Number of observations this block represents (0 = prior-only).
    pub fn number_of_observations(&self) -> usize {
        self.number_of_observations
    }

    /// Clone onto a target cache, re-binding each observable to its
    /// parameter set.
    pub fn clone_onto(&self, cache: &mut ObservableCache) -> Result<Self> {
        let observables = self
            .observables
            .iter()
            .map(|o| o.clone_with(cache.parameters().clone()))
            .collect();
        Self::new(
            cache,
            observables,
            self.mean.clone(),
            self.covariance.clone(),
            self.number_of_observations,
        )
    }
}

impl fmt::Display for MultivariateGaussianBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MultivariateGaussian(dim = {})", self.dim())?;
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

    fn two_observables(a: f64, b: f64) -> (Parameters, ObservableCache, Vec<ObservableRef>) {
        let p = Parameters::new();
        p.declare("a", a);
        p.declare("b", b);
        let cache = ObservableCache::new(p.clone());
        let obs = vec![
            ParameterObservable::new(p.clone(), "a"),
            ParameterObservable::new(p.clone(), "b"),
        ];
        (p, cache, obs)
    }

    #[test]
    fn test_diagonal_equals_sum_of_univariate() {
        let (_, mut cache, obs) = two_observables(0.5, -1.0);
        let mean = DVector::from_vec(vec![0.0, 0.0]);
        let cov = DMatrix::from_diagonal(&DVector::from_vec(vec![1.0, 4.0]));
        let block =
            MultivariateGaussianBlock::new(&mut cache, obs, mean, cov, 2).unwrap();
        cache.update().unwrap();

        let ln_2pi = (2.0 * std::f64::consts::PI).ln();
        let expected = (-0.5 * ln_2pi - 0.5 * 0.25) + (-0.5 * ln_2pi - 0.5 * 4.0_f64.ln() - 0.5 * 0.25);
        assert_relative_eq!(block.evaluate(&cache).unwrap(), expected, epsilon = 1e-12);
    }

    #[test]
    fn test_correlated_evaluate() {
        let (_, mut cache, obs) = two_observables(1.0, 1.0);
        let mean = DVector::from_vec(vec![0.0, 0.0]);
        let cov = DMatrix::from_row_slice(2, 2, &[1.0, 0.5, 0.5, 1.0]);
        let block =
            MultivariateGaussianBlock::new(&mut cache, obs, mean, cov, 2).unwrap();
        cache.update().unwrap();

        // det = 0.75, chi' Sigma^-1 chi = (1 - 1 + 1) / 0.75 ... solved:
        // Sigma^-1 = 1/0.75 * [[1, -0.5], [-0.5, 1]], form = (1 - 0.5 - 0.5 + 1)/0.75 = 4/3.
        let expected = -(2.0 * std::f64::consts::PI).ln() - 0.5 * 0.75_f64.ln() - 0.5 * (4.0 / 3.0);
        assert_relative_eq!(block.evaluate(&cache).unwrap(), expected, epsilon = 1e-12);
    }

    #[test]
    fn test_one_dimensional_significance_is_the_pull() {
        let p = Parameters::new();
        p.declare("a", 1.7);
        let mut cache = ObservableCache::new(p.clone());
        let obs = vec![ParameterObservable::new(p, "a")];
        let block = MultivariateGaussianBlock::new(
            &mut cache,
            obs,
            DVector::from_vec(vec![0.0]),
            DMatrix::from_row_slice(1, 1, &[1.0]),
            1,
        )
        .unwrap();
        cache.update().unwrap();

        assert_relative_eq!(block.significance(&cache).unwrap(), 1.7, epsilon = 1e-9);
    }

    #[test]
    fn test_significance_at_mean_is_zero() {
        let (_, mut cache, obs) = two_observables(0.0, 0.0);
        let block = MultivariateGaussianBlock::new(
            &mut cache,
            obs,
            DVector::from_vec(vec![0.0, 0.0]),
            DMatrix::identity(2, 2),
            2,
        )
        .unwrap();
        cache.update().unwrap();
        assert_relative_eq!(block.significance(&cache).unwrap(), 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_rejects_bad_covariance() {
        let (_, mut cache, obs) = two_observables(0.0, 0.0);
        let mean = DVector::from_vec(vec![0.0, 0.0]);

        // Not positive definite.
        let cov = DMatrix::from_row_slice(2, 2, &[1.0, 2.0, 2.0, 1.0]);
        assert!(
            MultivariateGaussianBlock::new(&mut cache, obs.clone(), mean.clone(), cov, 2).is_err()
        );

        // Not symmetric.
        let cov = DMatrix::from_row_slice(2, 2, &[1.0, 0.5, 0.1, 1.0]);
        assert!(
            MultivariateGaussianBlock::new(&mut cache, obs.clone(), mean.clone(), cov, 2).is_err()
        );

        // Dimension mismatch.
        let cov = DMatrix::identity(3, 3);
        assert!(MultivariateGaussianBlock::new(&mut cache, obs, mean, cov, 2).is_err());
    }

    #[test]
    fn test_sample_log_density_is_bounded_by_norm() {
        use rand::SeedableRng;
        let (_, mut cache, obs) = two_observables(0.3, -0.2);
        let cov = DMatrix::from_row_slice(2, 2, &[1.0, 0.3, 0.3, 2.0]);
        let block = MultivariateGaussianBlock::new(
            &mut cache,
            obs,
            DVector::from_vec(vec![0.0, 0.0]),
            cov,
            2,
        )
        .unwrap();
        cache.update().unwrap();

        let mut rng = rand::rngs::StdRng::seed_from_u64(5);
        for _ in 0..500 {
            let lp = block.sample(&cache, &mut rng).unwrap();
            assert!(lp.is_finite());
            assert!(lp <= block.norm + 1e-12);
        }
    }
}
