//! Named experimental constraints.
//!
//! A constraint bundles the likelihood blocks derived from one publication
//! or measurement under a stable name, e.g. `"B->K^*mumu::BR@LHCb-2016"`,
//! together with the observables those blocks constrain. The name is what
//! shows up in logs and goodness-of-fit reports; the observable list is the
//! enumeration surface for constraint builders.

use std::fmt;

use fv_core::ObservableRef;

use crate::block::LikelihoodBlock;

/// One experimental measurement: a name, the constrained observables and
/// the likelihood blocks.
pub struct Constraint {
    name: String,
    observables: Vec<ObservableRef>,
    blocks: Vec<LikelihoodBlock>,
}

impl Constraint {
    /// Bundle observables and blocks under a measurement name.
    pub fn new(
        name: impl Into<String>,
        observables: Vec<ObservableRef>,
        blocks: Vec<LikelihoodBlock>,
    ) -> Self {
        Self { name: name.into(), observables, blocks }
    }

    /// The measurement name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The observables this measurement constrains.
    pub fn observables(&self) -> &[ObservableRef] {
        &self.observables
    }

    /// The likelihood blocks of this measurement.
    pub fn blocks(&self) -> &[LikelihoodBlock] {
        &self.blocks
    }

    /// Total observation count over all blocks.
    pub fn number_of_observations(&self) -> usize {
        self.blocks.iter().map(|b| b.number_of_observations()).sum()
    }
}

impl fmt::Display for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:", self.name)?;
        for block in &self.blocks {
            write!(f, "\n    {block}")?;
        }
        Ok(())
    }
}
