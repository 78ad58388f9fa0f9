//! The `Observable` trait: a named, parameter-dependent theory prediction.

use std::sync::Arc;

use crate::{Parameters, Result};

/// A named scalar function of the model parameters.
///
/// Concrete observables (form factors, branching ratios, ...) live in the
/// physics layer; the inference engine only ever evaluates them through this
/// trait and re-binds them to new parameter sets when cloning a likelihood.
pub trait Observable: Send + Sync {
    /// Qualified observable name, e.g. `B->K^*ll::A_FB`.
    fn name(&self) -> &str;

    /// Compute the prediction at the current parameter point.
    fn evaluate(&self) -> Result<f64>;

    /// Clone this observable, bound to a different parameter set.
    fn clone_with(&self, parameters: Parameters) -> ObservableRef;
}

/// Shared handle to an observable.
///
/// Caches de-duplicate by handle identity (`Arc::ptr_eq`), never by name:
/// two distinct instances computing the same physics are tracked separately.
pub type ObservableRef = Arc<dyn Observable>;

/// Observable that forwards a single named parameter.
///
/// The simplest prediction there is; used wherever a constraint acts
/// directly on a model parameter, and throughout the test suites.
pub struct ParameterObservable {
    name: String,
    parameters: Parameters,
}

impl ParameterObservable {
    /// Bind the parameter `name` within `parameters` as an observable.
    pub fn new(parameters: Parameters, name: &str) -> ObservableRef {
        Arc::new(Self { name: name.to_string(), parameters })
    }
}

impl Observable for ParameterObservable {
    fn name(&self) -> &str {
        &self.name
    }

    fn evaluate(&self) -> Result<f64> {
        self.parameters.get(&self.name)
    }

    fn clone_with(&self, parameters: Parameters) -> ObservableRef {
        ParameterObservable::new(parameters, &self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parameter_observable_tracks_parameter() {
        let p = Parameters::new();
        p.declare("mass::c", 1.27);
        let obs = ParameterObservable::new(p.clone(), "mass::c");
        assert_eq!(obs.evaluate().unwrap(), 1.27);
        p.set("mass::c", 1.3).unwrap();
        assert_eq!(obs.evaluate().unwrap(), 1.3);
    }

    #[test]
    fn test_clone_with_rebinds() {
        let p = Parameters::new();
        p.declare("x", 1.0);
        let obs = ParameterObservable::new(p.clone(), "x");

        let q = p.independent_copy();
        q.set("x", 2.0).unwrap();
        let cloned = obs.clone_with(q);

        assert_eq!(obs.evaluate().unwrap(), 1.0);
        assert_eq!(cloned.evaluate().unwrap(), 2.0);
        assert_eq!(cloned.name(), "x");
    }
}
