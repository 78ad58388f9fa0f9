//! Error types for the likelihood engine.

use thiserror::Error;

/// Engine-wide error type.
#[derive(Error, Debug)]
pub enum Error {
    /// Invalid construction input: malformed quantile ordering, non-positive
    /// scale/shape parameters, dimension mismatches, or a distribution
    /// failing its consistency check beyond tolerance. Always aborts
    /// construction; nothing is silently clamped or defaulted.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Numerical failure during evaluation (non-finite intermediate,
    /// exhausted rejection sampling, singular matrix).
    #[error("computation error: {0}")]
    Computation(String),

    /// Lookup of a parameter name that was never declared.
    #[error("unknown parameter: {0}")]
    UnknownParameter(String),

    /// Operation that is deliberately not supported for this block kind.
    #[error("unsupported operation: {0}")]
    Unsupported(String),
}

/// Result type alias.
pub type Result<T> = std::result::Result<T, Error>;
