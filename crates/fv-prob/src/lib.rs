//! Probability building blocks for the likelihood engine.
//!
//! This crate hosts reusable probability math used by the likelihood blocks:
//! - stable log-domain helpers (log-sum-exp)
//! - Gaussian and chi-square CDF/inverse-CDF wrappers
//! - log-gamma and regularized incomplete gamma functions
//! - capped scalar root finders (Newton, bisection)

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod chi_squared;
pub mod gamma;
pub mod math;
pub mod normal;
pub mod roots;
