//! Added/removed deltas over sets of comparable values.
//!
//! Everything here treats its inputs as sets, so the order of the produced
//! vectors is unspecified. Callers that need a stable order (the wire
//! payload) call [`Diff::sorted`].

use std::collections::HashSet;
use std::hash::Hash;

use serde::Serialize;

/// Values that appeared and disappeared between two observations.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Diff<T> {
    pub added: Vec<T>,
    pub removed: Vec<T>,
}

impl<T> Diff<T> {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }

    /// Appends both sides of `other`. Duplicates are kept.
    pub fn merge(&mut self, other: Diff<T>) {
        self.added.extend(other.added);
        self.removed.extend(other.removed);
    }
}

impl<T: Eq + Hash + Clone> Diff<T> {
    /// Set difference between two observations.
    ///
    /// `removed` holds values only in `old`, `added` values only in `new`.
    pub fn between(old: &[T], new: &[T]) -> Self {
        let old: HashSet<&T> = old.iter().collect();
        let new: HashSet<&T> = new.iter().collect();

        Self {
            added: new.difference(&old).map(|&value| value.clone()).collect(),
            removed: old.difference(&new).map(|&value| value.clone()).collect(),
        }
    }

    /// Cancels values that were both added and removed and deduplicates
    /// each side.
    pub fn clean(&self) -> Self {
        let added: HashSet<&T> = self.added.iter().collect();
        let removed: HashSet<&T> = self.removed.iter().collect();

        Self {
            added: added.difference(&removed).map(|&value| value.clone()).collect(),
            removed: removed.difference(&added).map(|&value| value.clone()).collect(),
        }
    }
}

impl<T: Ord> Diff<T> {
    pub fn sorted(mut self) -> Self {
        self.added.sort();
        self.removed.sort();
        self
    }
}
