//! Unordered key sets and set-difference reconciliation.
//!
//! # Responsibility
//! - Provide a thin unordered collection for comparable keys.
//! - Compute additions/overlaps/removals between a current and target
//!   collection.
//!
//! # Invariants
//! - `added`, `overlapped` and `deleted` are pairwise disjoint.
//! - `added ∪ overlapped == target` and `deleted ∪ overlapped == current`
//!   when compared as sets.
//! - No returned collection has a guaranteed order.

use std::collections::HashSet;
use std::hash::Hash;

/// Unordered collection of unique keys.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Set<E: Eq + Hash> {
    items: HashSet<E>,
}

impl<E: Eq + Hash> Default for Set<E> {
    fn default() -> Self {
        Self {
            items: HashSet::new(),
        }
    }
}

impl<E: Eq + Hash> Set<E> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts `item`. Returns `false` when it was already present.
    pub fn add(&mut self, item: E) -> bool {
        self.items.insert(item)
    }

    /// Removes `item`. Returns `false` when it was absent.
    pub fn remove(&mut self, item: &E) -> bool {
        self.items.remove(item)
    }

    pub fn contains(&self, item: &E) -> bool {
        self.items.contains(item)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &E> {
        self.items.iter()
    }
}

impl<E: Eq + Hash + Clone> Set<E> {
    /// Copies the members out in unspecified order.
    pub fn to_vec(&self) -> Vec<E> {
        self.items.iter().cloned().collect()
    }

    /// Members of `self` that are not in `other`.
    pub fn difference(&self, other: &Set<E>) -> Set<E> {
        self.items.difference(&other.items).cloned().collect()
    }

    /// Members present in both sets.
    pub fn intersection(&self, other: &Set<E>) -> Set<E> {
        self.items.intersection(&other.items).cloned().collect()
    }
}

impl<E: Eq + Hash> FromIterator<E> for Set<E> {
    fn from_iter<I: IntoIterator<Item = E>>(iter: I) -> Self {
        Self {
            items: iter.into_iter().collect(),
        }
    }
}

impl<E: Eq + Hash> Extend<E> for Set<E> {
    fn extend<I: IntoIterator<Item = E>>(&mut self, iter: I) {
        self.items.extend(iter);
    }
}

impl<E: Eq + Hash> IntoIterator for Set<E> {
    type Item = E;
    type IntoIter = std::collections::hash_set::IntoIter<E>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}

/// Result of comparing a current collection against a target collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetDiff<E> {
    /// In target, missing from current.
    pub added: Vec<E>,
    /// Present in both.
    pub overlapped: Vec<E>,
    /// In current, missing from target.
    pub deleted: Vec<E>,
}

impl<E> SetDiff<E> {
    /// Returns `(added, overlapped, deleted)`.
    pub fn into_parts(self) -> (Vec<E>, Vec<E>, Vec<E>) {
        (self.added, self.overlapped, self.deleted)
    }

    /// Whether applying the diff would change anything.
    pub fn is_noop(&self) -> bool {
        self.added.is_empty() && self.deleted.is_empty()
    }
}

/// Compares `current` against `target` using value equality.
///
/// Duplicates in either input are collapsed; each key appears at most once
/// in the result.
pub fn set_cmp<E: Eq + Hash + Clone>(current: &[E], target: &[E]) -> SetDiff<E> {
    let current_set: Set<E> = current.iter().cloned().collect();
    let target_set: Set<E> = target.iter().cloned().collect();

    SetDiff {
        added: target_set.difference(&current_set).to_vec(),
        overlapped: current_set.intersection(&target_set).to_vec(),
        deleted: current_set.difference(&target_set).to_vec(),
    }
}

/// Removes duplicate elements. Output order is unspecified.
pub fn uniq<E: Eq + Hash>(list: impl IntoIterator<Item = E>) -> Vec<E> {
    list.into_iter()
        .collect::<HashSet<E>>()
        .into_iter()
        .collect()
}
