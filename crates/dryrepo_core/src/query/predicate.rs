//! Inclusion/exclusion predicates and bulk-update field maps.
//!
//! # Responsibility
//! - Describe which rows an operation applies to, independent of SQL.
//! - Carry field→value assignments for bulk updates.
//!
//! # Invariants
//! - Include entries are joined with `AND`; every exclude entry is negated
//!   on its own and joined with `AND` as well.
//! - A field may appear in both maps; both conditions then apply.
//! - Maps are ordered by field name so rendered SQL is deterministic.

use rusqlite::types::Value;
use std::collections::BTreeMap;

/// One condition on a single field.
#[derive(Debug, Clone, PartialEq)]
pub enum Criterion {
    /// Field equals the value (`NULL` compares with `IS`).
    Eq(Value),
    /// Field equals any of the values.
    In(Vec<Value>),
}

impl Criterion {
    pub fn any_of<V: Into<Value>>(values: impl IntoIterator<Item = V>) -> Self {
        Self::In(values.into_iter().map(Into::into).collect())
    }
}

/// Conjunctive filter made of an include map and an exclude map.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Predicate {
    include: BTreeMap<String, Criterion>,
    exclude: BTreeMap<String, Criterion>,
}

impl Predicate {
    /// Builds a predicate requiring every `field = value` pair.
    pub fn new<K, V>(include: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<Value>,
    {
        Self {
            include: equality_map(include),
            exclude: BTreeMap::new(),
        }
    }

    /// Matches every row.
    pub fn all() -> Self {
        Self::default()
    }

    /// Replaces the exclude map; rows matching any pair are rejected.
    pub fn exclude<K, V>(mut self, exclude: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<Value>,
    {
        self.exclude = equality_map(exclude);
        self
    }

    pub fn equals(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.include.insert(field.into(), Criterion::Eq(value.into()));
        self
    }

    pub fn not_equals(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.exclude.insert(field.into(), Criterion::Eq(value.into()));
        self
    }

    pub fn include_in<V: Into<Value>>(
        mut self,
        field: impl Into<String>,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        self.include.insert(field.into(), Criterion::any_of(values));
        self
    }

    pub fn exclude_in<V: Into<Value>>(
        mut self,
        field: impl Into<String>,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        self.exclude.insert(field.into(), Criterion::any_of(values));
        self
    }

    pub fn includes(&self) -> impl Iterator<Item = (&str, &Criterion)> {
        self.include.iter().map(|(field, c)| (field.as_str(), c))
    }

    pub fn excludes(&self) -> impl Iterator<Item = (&str, &Criterion)> {
        self.exclude.iter().map(|(field, c)| (field.as_str(), c))
    }

    /// True when the predicate matches every row.
    pub fn is_empty(&self) -> bool {
        self.include.is_empty() && self.exclude.is_empty()
    }
}

fn equality_map<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> BTreeMap<String, Criterion>
where
    K: Into<String>,
    V: Into<Value>,
{
    pairs
        .into_iter()
        .map(|(field, value)| (field.into(), Criterion::Eq(value.into())))
        .collect()
}

/// Field→value assignments for bulk updates.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldValues {
    values: BTreeMap<String, Value>,
}

impl FieldValues {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.values.insert(field.into(), value.into());
        self
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.values.iter().map(|(field, value)| (field.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for FieldValues {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            values: iter
                .into_iter()
                .map(|(field, value)| (field.into(), value.into()))
                .collect(),
        }
    }
}
