//! Field projection and keying over record slices.
//!
//! # Responsibility
//! - Extract values from records through compile-time selectors.
//! - Build key→record and key→value lookups for reconciliation.
//!
//! # Invariants
//! - A selector returning `None` excludes the record; outputs are compacted,
//!   never padded with defaults.
//! - On duplicate keys the later record in input order wins.

use crate::reconcile::set::uniq;
use std::collections::HashMap;
use std::hash::Hash;

/// Wraps an unconditional extractor into a selector that includes every record.
pub fn select_all<R, V>(extract: impl Fn(&R) -> V) -> impl Fn(&R) -> Option<V> {
    move |record: &R| Some(extract(record))
}

/// Collects `selector` output for every included record, in input order.
pub fn pluck_fn<R, V>(records: &[R], selector: impl Fn(&R) -> Option<V>) -> Vec<V> {
    records.iter().filter_map(selector).collect()
}

/// Same as [`pluck_fn`] with duplicates removed. Output order is unspecified.
pub fn pluck_uniq_fn<R, V: Eq + Hash>(
    records: &[R],
    selector: impl Fn(&R) -> Option<V>,
) -> Vec<V> {
    uniq(records.iter().filter_map(selector))
}

/// Maps the selected key to the record it came from.
pub fn field_map_struct_fn<R, K: Eq + Hash>(
    records: &[R],
    key_selector: impl Fn(&R) -> Option<K>,
) -> HashMap<K, &R> {
    let mut mapped = HashMap::with_capacity(records.len());
    for record in records {
        if let Some(key) = key_selector(record) {
            mapped.insert(key, record);
        }
    }
    mapped
}

/// Maps the selected key to a second selected value.
///
/// A record contributes only when both selectors include it.
pub fn field_map_field_fn<R, K: Eq + Hash, V>(
    records: &[R],
    key_selector: impl Fn(&R) -> Option<K>,
    value_selector: impl Fn(&R) -> Option<V>,
) -> HashMap<K, V> {
    let mut mapped = HashMap::with_capacity(records.len());
    for record in records {
        let Some(key) = key_selector(record) else {
            continue;
        };
        let Some(value) = value_selector(record) else {
            continue;
        };
        mapped.insert(key, value);
    }
    mapped
}

#[cfg(test)]
mod tests {
    use super::{field_map_field_fn, field_map_struct_fn, pluck_fn, pluck_uniq_fn, select_all};

    #[derive(Debug, Clone, PartialEq)]
    struct User {
        id: i64,
        name: &'static str,
        age: u32,
    }

    fn user(id: i64, name: &'static str, age: u32) -> User {
        User { id, name, age }
    }

    fn users() -> Vec<User> {
        vec![
            user(1, "Alice", 30),
            user(2, "Bob", 25),
            user(3, "Charlie", 35),
        ]
    }

    #[test]
    fn pluck_with_select_all_keeps_every_record_in_order() {
        let names = pluck_fn(&users(), select_all(|u: &User| u.name));
        assert_eq!(names, vec!["Alice", "Bob", "Charlie"]);
    }

    #[test]
    fn pluck_compacts_excluded_records() {
        let names = pluck_fn(&users(), |u: &User| (u.age > 28).then_some(u.name));
        assert_eq!(names, vec!["Alice", "Charlie"]);
    }

    #[test]
    fn pluck_of_empty_slice_is_empty() {
        let ids = pluck_fn(&[] as &[User], select_all(|u: &User| u.id));
        assert!(ids.is_empty());
    }

    #[test]
    fn pluck_uniq_drops_duplicates() {
        let mut list = users();
        list.push(user(4, "Alice", 41));
        let mut names = pluck_uniq_fn(&list, select_all(|u: &User| u.name));
        names.sort_unstable();
        assert_eq!(names, vec!["Alice", "Bob", "Charlie"]);
    }

    #[test]
    fn field_map_struct_last_duplicate_wins() {
        let mut list = users();
        list.push(user(2, "Bobby", 26));

        let by_id = field_map_struct_fn(&list, select_all(|u: &User| u.id));
        assert_eq!(by_id.len(), 3);
        assert_eq!(by_id[&2].name, "Bobby");
        assert!(std::ptr::eq(by_id[&2], &list[3]));
    }

    #[test]
    fn field_map_struct_skips_excluded_keys() {
        let list = users();
        let adults = field_map_struct_fn(&list, |u: &User| (u.age >= 30).then_some(u.id));
        assert_eq!(adults.len(), 2);
        assert!(!adults.contains_key(&2));
    }

    #[test]
    fn field_map_field_later_name_wins_and_value_exclusion_suppresses() {
        let list = vec![
            user(1, "Alice", 30),
            user(1, "Alicia", 31),
            user(2, "", 20),
        ];

        let names = field_map_field_fn(
            &list,
            select_all(|u: &User| u.id),
            |u: &User| (!u.name.is_empty()).then_some(u.name),
        );
        assert_eq!(names.len(), 1);
        assert_eq!(names[&1], "Alicia");
        assert!(!names.contains_key(&2));
    }
}
