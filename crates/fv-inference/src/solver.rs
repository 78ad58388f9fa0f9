//! Bound-constrained equation solver.
//!
//! Solves `r(params) = 0` for a small vector of residuals over box-bounded
//! parameters by minimizing the squared residual norm with L-BFGS (argmin)
//! and clamped bounds. Used once per LogGamma construction to fit the shape
//! parameters from quantile constraints.

use argmin::core::{CostFunction, Executor, Gradient, State, TerminationReason, TerminationStatus};
use argmin::solver::linesearch::MoreThuenteLineSearch;
use argmin::solver::quasinewton::LBFGS;
use fv_core::{Error, Result};

/// Residual function type: maps a parameter vector to a residual vector.
pub type ResidualFn<'a> = &'a (dyn Fn(&[f64]) -> Vec<f64> + Send + Sync);

/// Configuration for the equation solver.
#[derive(Debug, Clone)]
pub struct SolverConfig {
    /// Maximum number of L-BFGS iterations.
    pub max_iter: u64,
    /// Convergence tolerance for the gradient norm of the squared residual.
    pub tol: f64,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self { max_iter: 1000, tol: 1e-10 }
    }
}

/// Solution of an equation system.
#[derive(Debug, Clone)]
pub struct Solution {
    /// Best parameter values found (clamped to bounds).
    pub parameters: Vec<f64>,
    /// Squared residual norm at the solution; zero means solved exactly.
    pub residual: f64,
    /// Whether the minimizer reported convergence.
    pub converged: bool,
}

struct ResidualProblem<'a> {
    residuals: ResidualFn<'a>,
    bounds: &'a [(f64, f64)],
}

fn clamp_params(params: &[f64], bounds: &[(f64, f64)]) -> Vec<f64> {
    params.iter().zip(bounds.iter()).map(|(&v, &(lo, hi))| v.clamp(lo, hi)).collect()
}

impl ResidualProblem<'_> {
    fn squared_norm(&self, params: &[f64]) -> f64 {
        let clamped = clamp_params(params, self.bounds);
        (self.residuals)(&clamped).iter().map(|r| r * r).sum()
    }
}

impl CostFunction for ResidualProblem<'_> {
    type Param = Vec<f64>;
    type Output = f64;

    fn cost(&self, params: &Self::Param) -> std::result::Result<f64, argmin::core::Error> {
        Ok(self.squared_norm(params))
    }
}

impl Gradient for ResidualProblem<'_> {
    type Param = Vec<f64>;
    type Gradient = Vec<f64>;

    fn gradient(
        &self,
        params: &Self::Param,
    ) -> std::result::Result<Vec<f64>, argmin::core::Error> {
        // Central differences with step scaled to the parameter magnitude.
        let mut grad = vec![0.0; params.len()];
        for i in 0..params.len() {
            let eps = 1e-7 * params[i].abs().max(1.0);
            let mut plus = params.clone();
            plus[i] += eps;
            let mut minus = params.clone();
            minus[i] -= eps;
            grad[i] = (self.squared_norm(&plus) - self.squared_norm(&minus)) / (2.0 * eps);
        }
        Ok(grad)
    }
}

/// L-BFGS-based solver for small bound-constrained equation systems.
pub struct EquationSolver {
    config: SolverConfig,
}

impl EquationSolver {
    /// Create a solver with the given configuration.
    pub fn new(config: SolverConfig) -> Self {
        Self { config }
    }

    /// Minimize the squared residual norm of `residuals` starting from
    /// `init`, with each parameter clamped to its `(lower, upper)` bound.
    pub fn solve(
        &self,
        residuals: ResidualFn<'_>,
        init: &[f64],
        bounds: &[(f64, f64)],
    ) -> Result<Solution> {
        if init.len() != bounds.len() {
            return Err(Error::Configuration(format!(
                "parameter and bounds length mismatch: {} != {}",
                init.len(),
                bounds.len()
            )));
        }
        if init.iter().any(|v| !v.is_finite()) {
            return Err(Error::Configuration(format!(
                "equation solver requires finite starting values, got {init:?}"
            )));
        }

        let init_clamped = clamp_params(init, bounds);
        let problem = ResidualProblem { residuals, bounds };

        let linesearch = MoreThuenteLineSearch::new();
        let solver = LBFGS::new(linesearch, 7)
            .with_tolerance_grad(self.config.tol)
            .map_err(|e| Error::Configuration(format!("invalid solver tolerance: {e}")))?
            .with_tolerance_cost(1e-14)
            .map_err(|e| Error::Configuration(format!("invalid solver cost tolerance: {e}")))?;

        let res = Executor::new(problem, solver)
            .configure(|state| state.param(init_clamped).max_iters(self.config.max_iter))
            .run()
            .map_err(|e| Error::Computation(format!("equation solver failed: {e}")))?;

        let state = res.state();
        let best = state
            .get_best_param()
            .ok_or_else(|| Error::Computation("equation solver found no parameters".to_string()))?;
        let parameters = clamp_params(best, bounds);
        let residual = state.get_best_cost();
        let converged = matches!(
            state.get_termination_status(),
            TerminationStatus::Terminated(TerminationReason::SolverConverged)
                | TerminationStatus::Terminated(TerminationReason::TargetCostReached)
        );

        Ok(Solution { parameters, residual, converged })
    }
}

impl Default for EquationSolver {
    fn default() -> Self {
        Self::new(SolverConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_solves_linear_system() {
        // x + y = 3, x - y = 1  =>  (2, 1)
        let residuals = |p: &[f64]| vec![p[0] + p[1] - 3.0, p[0] - p[1] - 1.0];
        let solver = EquationSolver::default();
        let sol = solver
            .solve(&residuals, &[0.0, 0.0], &[(-10.0, 10.0), (-10.0, 10.0)])
            .unwrap();

        assert!(sol.residual < 1e-10, "residual {}", sol.residual);
        assert_relative_eq!(sol.parameters[0], 2.0, epsilon = 1e-4);
        assert_relative_eq!(sol.parameters[1], 1.0, epsilon = 1e-4);
    }

    #[test]
    fn test_respects_bounds() {
        // Single equation x = -5, but x is constrained to [0, 10].
        let residuals = |p: &[f64]| vec![p[0] + 5.0];
        let solver = EquationSolver::default();
        let sol = solver.solve(&residuals, &[1.0], &[(0.0, 10.0)]).unwrap();

        assert_relative_eq!(sol.parameters[0], 0.0, epsilon = 1e-6);
        assert!(sol.residual >= 25.0 - 1e-6);
    }

    #[test]
    fn test_rejects_mismatched_bounds() {
        let residuals = |p: &[f64]| vec![p[0]];
        let solver = EquationSolver::default();
        assert!(solver.solve(&residuals, &[0.0, 0.0], &[(0.0, 1.0)]).is_err());
    }

    #[test]
    fn test_nonlinear_system() {
        // x^2 = 2, x*y = 2  =>  (sqrt(2), sqrt(2))
        let residuals = |p: &[f64]| vec![p[0] * p[0] - 2.0, p[0] * p[1] - 2.0];
        let solver = EquationSolver::default();
        let sol = solver
            .solve(&residuals, &[1.0, 1.0], &[(0.1, 10.0), (0.1, 10.0)])
            .unwrap();

        assert!(sol.residual < 1e-8, "residual {}", sol.residual);
        assert_relative_eq!(sol.parameters[0], 2.0_f64.sqrt(), epsilon = 1e-3);
        assert_relative_eq!(sol.parameters[1], 2.0_f64.sqrt(), epsilon = 1e-3);
    }
}
