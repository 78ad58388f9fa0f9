//! Memoized evaluation of theory predictions.
//!
//! Many likelihood blocks constrain the same observable; the cache makes
//! sure each prediction is computed exactly once per parameter point. It is
//! an arena of `(observable, last value)` pairs indexed by dense ids: blocks
//! store ids only and read values through the cache, never recomputing
//! physics themselves.

use std::ops::Index;
use std::sync::Arc;

use fv_core::{Error, ObservableRef, Parameters, Result};

/// Dense arena of observables and their last-computed values.
pub struct ObservableCache {
    parameters: Parameters,
    observables: Vec<ObservableRef>,
    values: Vec<f64>,
    /// Parameter generation the values were last computed at; `None` before
    /// the first update.
    updated_at: Option<u64>,
}

impl ObservableCache {
    /// Create an empty cache bound to a parameter set.
    pub fn new(parameters: Parameters) -> Self {
        Self { parameters, observables: Vec::new(), values: Vec::new(), updated_at: None }
    }

    /// Track an observable, returning its id.
    ///
    /// De-duplication is by object identity (`Arc::ptr_eq`), never by name:
    /// two distinct instances evaluating the same physics are tracked
    /// separately.
    pub fn add(&mut self, observable: ObservableRef) -> usize {
        if let Some(id) =
            self.observables.iter().position(|o| Arc::ptr_eq(o, &observable))
        {
            return id;
        }
        self.observables.push(observable);
        self.values.push(f64::NAN);
        // Newly added entries have no value yet; force the next update.
        self.updated_at = None;
        self.observables.len() - 1
    }

    /// Recompute all tracked values.
    ///
    /// Skipped when the parameters have not changed since the last update,
    /// so repeated likelihood evaluations at one parameter point pay for the
    /// physics once. Must be called before any block's `evaluate()`,
    /// `sample()` or `significance()` is trusted.
    pub fn update(&mut self) -> Result<()> {
        let generation = self.parameters.generation();
        if self.updated_at == Some(generation) {
            return Ok(());
        }
        for (observable, value) in self.observables.iter().zip(self.values.iter_mut()) {
            *value = observable.evaluate()?;
        }
        self.updated_at = Some(generation);
        Ok(())
    }

    /// Last-updated value of the observable with the given id.
    ///
    /// Does not recompute; `NaN` before the first `update()`.
    pub fn value(&self, id: usize) -> f64 {
        self.values[id]
    }

    /// The tracked observable behind an id.
    pub fn observable(&self, id: usize) -> &ObservableRef {
        &self.observables[id]
    }

    /// Number of tracked observables.
    pub fn len(&self) -> usize {
        self.observables.len()
    }

    /// Whether the cache tracks no observables.
    pub fn is_empty(&self) -> bool {
        self.observables.is_empty()
    }

    /// The parameter set this cache evaluates against.
    pub fn parameters(&self) -> &Parameters {
        &self.parameters
    }

    /// Deep-clone every tracked observable, bound to a new parameter set.
    ///
    /// Index order is preserved 1:1, so ids computed against this cache
    /// remain valid against the clone.
    pub fn clone_with(&self, parameters: Parameters) -> Result<ObservableCache> {
        let observables: Vec<ObservableRef> = self
            .observables
            .iter()
            .map(|o| o.clone_with(parameters.clone()))
            .collect();
        if observables.len() != self.observables.len() {
            return Err(Error::Computation("observable clone changed cache size".to_string()));
        }
        Ok(ObservableCache {
            parameters,
            values: vec![f64::NAN; observables.len()],
            observables,
            updated_at: None,
        })
    }
}

impl Index<usize> for ObservableCache {
    type Output = f64;

    fn index(&self, id: usize) -> &f64 {
        &self.values[id]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fv_core::ParameterObservable;

    fn setup() -> (Parameters, ObservableCache) {
        let p = Parameters::new();
        p.declare("a", 1.5);
        p.declare("b", -0.5);
        let cache = ObservableCache::new(p.clone());
        (p, cache)
    }

    #[test]
    fn test_add_deduplicates_by_identity_not_name() {
        let (p, mut cache) = setup();
        let obs = ParameterObservable::new(p.clone(), "a");
        let twin = ParameterObservable::new(p.clone(), "a");

        let id = cache.add(obs.clone());
        assert_eq!(cache.add(obs), id);
        // Same name, distinct instance: tracked separately.
        assert_ne!(cache.add(twin), id);
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_update_computes_values() {
        let (p, mut cache) = setup();
        let id_a = cache.add(ParameterObservable::new(p.clone(), "a"));
        let id_b = cache.add(ParameterObservable::new(p.clone(), "b"));

        assert!(cache.value(id_a).is_nan());
        cache.update().unwrap();
        assert_eq!(cache[id_a], 1.5);
        assert_eq!(cache[id_b], -0.5);
    }

    #[test]
    fn test_update_is_lazy_until_parameters_change() {
        let (p, mut cache) = setup();
        let id = cache.add(ParameterObservable::new(p.clone(), "a"));
        cache.update().unwrap();
        assert_eq!(cache.value(id), 1.5);

        // Mutating the stored value directly shows that an update at the
        // same generation is a no-op.
        cache.values[id] = 99.0;
        cache.update().unwrap();
        assert_eq!(cache.value(id), 99.0);

        p.set("a", 2.5).unwrap();
        cache.update().unwrap();
        assert_eq!(cache.value(id), 2.5);
    }

    #[test]
    fn test_clone_with_preserves_index_order() {
        let (p, mut cache) = setup();
        let id_a = cache.add(ParameterObservable::new(p.clone(), "a"));
        let id_b = cache.add(ParameterObservable::new(p.clone(), "b"));

        let q = p.independent_copy();
        q.set("a", 10.0).unwrap();
        let mut cloned = cache.clone_with(q).unwrap();
        cloned.update().unwrap();

        assert_eq!(cloned.len(), cache.len());
        assert_eq!(cloned.value(id_a), 10.0);
        assert_eq!(cloned.value(id_b), -0.5);
        assert_eq!(cloned.observable(id_a).name(), "a");
    }

    #[test]
    fn test_unknown_parameter_propagates_from_update() {
        let p = Parameters::new();
        let mut cache = ObservableCache::new(p.clone());
        cache.add(ParameterObservable::new(p, "missing"));
        assert!(cache.update().is_err());
    }
}
