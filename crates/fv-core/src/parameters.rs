//! Named model parameters with shared, generation-counted storage.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::{Error, Result};

#[derive(Debug, Default)]
struct Store {
    values: HashMap<String, f64>,
    /// Bumped on every mutation; observable caches compare this against the
    /// generation they last evaluated at to skip redundant updates.
    generation: u64,
}

/// Handle to a set of named model parameters.
///
/// `Clone` shares the underlying storage: two clones of the same handle see
/// each other's mutations, which is what lets many observables read one
/// consistent parameter point. [`Parameters::independent_copy`] produces a
/// deep copy with independent mutable storage; this is the sole isolation
/// primitive for running evaluations concurrently.
#[derive(Debug, Clone, Default)]
pub struct Parameters {
    inner: Arc<RwLock<Store>>,
}

impl Parameters {
    /// Create an empty parameter set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a parameter, overwriting any previous value under that name.
    pub fn declare(&self, name: &str, value: f64) {
        let mut store = self.inner.write().expect("parameter store poisoned");
        store.values.insert(name.to_string(), value);
        store.generation += 1;
    }

    /// Set the value of a previously declared parameter.
    pub fn set(&self, name: &str, value: f64) -> Result<()> {
        let mut store = self.inner.write().expect("parameter store poisoned");
        match store.values.get_mut(name) {
            Some(slot) => {
                *slot = value;
                store.generation += 1;
                Ok(())
            }
            None => Err(Error::UnknownParameter(name.to_string())),
        }
    }

    /// Current value of a declared parameter.
    pub fn get(&self, name: &str) -> Result<f64> {
        let store = self.inner.read().expect("parameter store poisoned");
        store.values.get(name).copied().ok_or_else(|| Error::UnknownParameter(name.to_string()))
    }

    /// Monotonically increasing mutation counter.
    pub fn generation(&self) -> u64 {
        self.inner.read().expect("parameter store poisoned").generation
    }

    /// Deep copy with independent mutable storage.
    pub fn independent_copy(&self) -> Parameters {
        let store = self.inner.read().expect("parameter store poisoned");
        Parameters {
            inner: Arc::new(RwLock::new(Store {
                values: store.values.clone(),
                generation: 0,
            })),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_declare_get_set() {
        let p = Parameters::new();
        p.declare("mass::b", 4.2);
        assert_eq!(p.get("mass::b").unwrap(), 4.2);
        p.set("mass::b", 4.3).unwrap();
        assert_eq!(p.get("mass::b").unwrap(), 4.3);
    }

    #[test]
    fn test_set_unknown_fails() {
        let p = Parameters::new();
        assert!(matches!(p.set("nope", 1.0), Err(Error::UnknownParameter(_))));
    }

    #[test]
    fn test_clone_shares_storage() {
        let p = Parameters::new();
        p.declare("x", 1.0);
        let q = p.clone();
        q.set("x", 2.0).unwrap();
        assert_eq!(p.get("x").unwrap(), 2.0);
    }

    #[test]
    fn test_independent_copy_isolates() {
        let p = Parameters::new();
        p.declare("x", 1.0);
        let q = p.independent_copy();
        q.set("x", 2.0).unwrap();
        assert_eq!(p.get("x").unwrap(), 1.0);
        assert_eq!(q.get("x").unwrap(), 2.0);
    }

    #[test]
    fn test_generation_advances_on_mutation() {
        let p = Parameters::new();
        let g0 = p.generation();
        p.declare("x", 1.0);
        let g1 = p.generation();
        assert!(g1 > g0);
        p.set("x", 5.0).unwrap();
        assert!(p.generation() > g1);
    }
}
