//! Capped scalar root finders.
//!
//! Both solvers stop after a hard iteration cap and report the best estimate
//! with `converged = false` instead of blocking indefinitely; the caller
//! decides whether to log or fail.

use fv_core::{Error, Result};

/// Default convergence tolerance for root finding.
pub const DEFAULT_TOL: f64 = 1e-7;

/// Hard iteration cap for all root finders.
pub const MAX_ITERATIONS: usize = 400;

/// Outcome of a root search.
#[derive(Debug, Clone, Copy)]
pub struct RootFind {
    /// Best root estimate found.
    pub root: f64,
    /// Whether the tolerance was met within the iteration cap.
    pub converged: bool,
    /// Iterations used.
    pub iterations: usize,
}

/// Newton iteration on `f` with derivative `df`, starting from `x0`.
///
/// Convergence is declared when successive estimates differ by less than
/// `tol`. A vanishing or non-finite derivative stops the search early with
/// the current estimate.
pub fn newton<F, G>(f: F, df: G, x0: f64, tol: f64, max_iter: usize) -> Result<RootFind>
where
    F: Fn(f64) -> f64,
    G: Fn(f64) -> f64,
{
    if !x0.is_finite() {
        return Err(Error::Computation(format!("newton: starting point is not finite: {x0}")));
    }

    let mut x = x0;
    for iter in 1..=max_iter {
        let d = df(x);
        if d == 0.0 || !d.is_finite() {
            return Ok(RootFind { root: x, converged: false, iterations: iter });
        }
        let next = x - f(x) / d;
        if !next.is_finite() {
            return Ok(RootFind { root: x, converged: false, iterations: iter });
        }
        let delta = (next - x).abs();
        x = next;
        if delta < tol {
            return Ok(RootFind { root: x, converged: true, iterations: iter });
        }
    }

    Ok(RootFind { root: x, converged: false, iterations: max_iter })
}

/// Bisection on a bracketing interval `[lo, hi]`.
///
/// Requires `f(lo)` and `f(hi)` to differ in sign. Converges when the
/// interval width drops below `tol`.
pub fn bisect<F>(f: F, lo: f64, hi: f64, tol: f64, max_iter: usize) -> Result<RootFind>
where
    F: Fn(f64) -> f64,
{
    if !(lo.is_finite() && hi.is_finite() && lo < hi) {
        return Err(Error::Computation(format!("bisect: invalid interval [{lo}, {hi}]")));
    }

    let mut lo = lo;
    let mut hi = hi;
    let f_lo = f(lo);
    let f_hi = f(hi);
    if f_lo == 0.0 {
        return Ok(RootFind { root: lo, converged: true, iterations: 0 });
    }
    if f_hi == 0.0 {
        return Ok(RootFind { root: hi, converged: true, iterations: 0 });
    }
    if f_lo.signum() == f_hi.signum() {
        return Err(Error::Computation(format!(
            "bisect: no sign change over [{lo}, {hi}]: f(lo)={f_lo}, f(hi)={f_hi}"
        )));
    }

    let mut mid = 0.5 * (lo + hi);
    for iter in 1..=max_iter {
        mid = 0.5 * (lo + hi);
        let f_mid = f(mid);
        if f_mid == 0.0 || (hi - lo) < tol {
            return Ok(RootFind { root: mid, converged: true, iterations: iter });
        }
        if f_mid.signum() == f_lo.signum() {
            lo = mid;
        } else {
            hi = mid;
        }
    }

    Ok(RootFind { root: mid, converged: false, iterations: max_iter })
}
