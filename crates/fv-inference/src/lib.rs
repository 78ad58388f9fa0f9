//! # fv-inference
//!
//! The statistical inference engine: the mapping from a theory observable
//! plus an experimental constraint into a composable log-likelihood
//! contribution.
//!
//! Components, leaf first:
//! - [`ObservableCache`]: memoizes theory predictions shared across blocks
//! - [`LikelihoodBlock`]: one probability-density term (two-piece Gaussian,
//!   LogGamma, Amoroso, multivariate Gaussian, or a finite mixture)
//! - [`Constraint`]: a named bundle of observables and blocks representing
//!   one experimental measurement
//! - [`LogLikelihood`]: sums block log-densities over all constraints and
//!   runs the bootstrap goodness-of-fit calibration
//!
//! Evaluation is single-threaded and synchronous. Independent evaluation
//! contexts (e.g. one per sampling chain) are obtained exclusively through
//! [`LogLikelihood::try_clone`], never by sharing a cache across threads.

#![warn(missing_docs)]
#![warn(clippy::all)]

/// Amoroso (generalized gamma) block for one-sided limits.
pub mod amoroso;
/// The closed likelihood-block union and its factory constructors.
pub mod block;
/// Memoized observable evaluation.
pub mod cache;
/// Named measurement bundles.
pub mod constraint;
/// Two-piece (asymmetric) Gaussian block.
pub mod gaussian;
/// The log-likelihood aggregator and bootstrap p-value.
pub mod likelihood;
/// LogGamma block with quantile fitting.
pub mod log_gamma;
/// Finite mixture of blocks.
pub mod mixture;
/// Correlated multivariate Gaussian block.
pub mod multivariate;
/// Bound-constrained equation solver (used by the LogGamma fit).
pub mod solver;

pub use block::LikelihoodBlock;
pub use cache::ObservableCache;
pub use constraint::Constraint;
pub use likelihood::{LogLikelihood, PValue};
pub use solver::{EquationSolver, Solution, SolverConfig};
