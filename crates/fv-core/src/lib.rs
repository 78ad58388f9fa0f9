//! # fv-core
//!
//! Core types shared across the flavor-physics likelihood engine:
//! - the crate-wide error type and `Result` alias
//! - the `Parameters` handle (named model parameters with shared storage)
//! - the `Observable` trait (a named, parameter-dependent theory prediction)
//!
//! Higher layers (fv-prob, fv-inference) depend on these narrow interfaces,
//! never on concrete physics code.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod observable;
pub mod parameters;

pub use error::{Error, Result};
pub use observable::{Observable, ObservableRef, ParameterObservable};
pub use parameters::Parameters;
