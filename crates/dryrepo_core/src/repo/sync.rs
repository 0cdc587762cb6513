//! Keyed membership sync on top of the generic repository.
//!
//! Typical use: make the rows of a join table under one parent match a
//! desired key list (team members, note tags) with the minimum number of
//! inserts and deletes.

use crate::query::predicate::Predicate;
use crate::reconcile::project::pluck_fn;
use crate::reconcile::set::{set_cmp, SetDiff};
use crate::repo::crud::{Crud, Repository};
use crate::repo::error::{RepoError, RepoResult};
use crate::store::{Entity, Store};
use log::info;
use rusqlite::types::Value;
use std::hash::Hash;

/// Reconciles the keys stored under `scope` with `target_keys`.
///
/// Records under `scope` are keyed by `key_of`; every key only present in
/// `target_keys` gets a record built by `make_record`, every key only
/// present in the store is deleted through `key_column`. Everything runs in
/// one transaction and the applied diff is returned.
///
/// # Errors
/// - `RepoError::Configuration` when `scope` is empty, since the delete
///   would otherwise reach rows outside the membership.
/// - Any store error; the transaction is rolled back.
pub fn sync_keys<S, T, K>(
    repo: &Repository<S, T>,
    scope: &Predicate,
    key_column: &str,
    key_of: impl Fn(&T) -> Option<K>,
    target_keys: &[K],
    mut make_record: impl FnMut(&K) -> T,
) -> RepoResult<SetDiff<K>>
where
    S: Store,
    T: Entity,
    K: Eq + Hash + Clone + Into<Value>,
{
    if scope.is_empty() {
        return Err(RepoError::configuration(format!(
            "sync of `{}` requires a scope",
            T::TABLE
        )));
    }

    let diff = repo.transaction(|store: &S| -> RepoResult<SetDiff<K>> {
        let members = Repository::<S, T>::from_store(store);
        let current = pluck_fn(&members.list(scope, &[])?.items, &key_of);
        let diff = set_cmp(&current, target_keys);

        let mut additions: Vec<T> = diff.added.iter().map(&mut make_record).collect();
        members.create(&mut additions)?;

        if !diff.deleted.is_empty() {
            let removed = scope
                .clone()
                .include_in(key_column, diff.deleted.iter().cloned());
            members.delete(&removed, &[])?;
        }
        Ok(diff)
    })?;

    info!(
        "event=sync_keys module=repo status=ok table={} added={} kept={} deleted={}",
        T::TABLE,
        diff.added.len(),
        diff.overlapped.len(),
        diff.deleted.len()
    );
    Ok(diff)
}
