//! Generic CRUD contract and its store-backed implementation.
//!
//! # Responsibility
//! - Offer one repository API for every `Entity` type: create, get, list,
//!   bulk update, delete, read-modify-write and ad-hoc transactions.
//! - Apply query options (pagination, ordering, preloading, not-found
//!   suppression) uniformly.
//!
//! # Invariants
//! - `update_by_fn` and `transaction` each map to exactly one store
//!   transaction.
//! - `update_by_fn` never writes when the closure reports no change.
//! - Closure errors are returned verbatim after rollback.
//! - Bulk `update`/`delete` refuse an empty predicate.

use crate::query::options::{page_count, QueryOpt, QueryOpts, Window};
use crate::query::predicate::{FieldValues, Predicate};
use crate::repo::error::{RepoError, RepoResult};
use crate::store::{Entity, Mutation, SqliteStore, Store};
use log::{debug, info, warn};
use serde::Serialize;
use std::fmt::{Debug, Formatter};
use std::marker::PhantomData;
use std::time::Instant;

/// One page of records plus pagination metadata.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ListResult<T> {
    pub items: Vec<T>,
    /// Matching rows ignoring pagination.
    pub total: u64,
    pub page_size: u32,
    /// `ceil(total / page_size)`.
    pub page_count: u64,
    /// 1-based.
    pub page: u32,
}

/// Repository contract shared by every record type.
pub trait Crud<T: Entity> {
    type Store: Store;

    /// Inserts `records`, back-filling generated columns into each one.
    fn create(&self, records: &mut [T]) -> RepoResult<()>;

    /// Returns the first record matching `predicate` after ordering.
    ///
    /// `Ok(None)` is only possible when a not-found mapper swallowed the miss.
    fn get(&self, predicate: &Predicate, opts: &[QueryOpt]) -> RepoResult<Option<T>>;

    fn list(&self, predicate: &Predicate, opts: &[QueryOpt]) -> RepoResult<ListResult<T>>;

    fn count(&self, predicate: &Predicate) -> RepoResult<u64>;

    /// Sets `values` on every matching row.
    fn update(&self, predicate: &Predicate, values: &FieldValues) -> RepoResult<()>;

    /// Deletes every matching row; no match is a not-found.
    fn delete(&self, predicate: &Predicate, opts: &[QueryOpt]) -> RepoResult<()>;

    /// Fetches the first match, lets `update_fn` mutate it and saves it when
    /// `update_fn` returns `Ok(true)`, all in one transaction.
    fn update_by_fn<E, F>(&self, predicate: &Predicate, update_fn: F) -> Result<(), E>
    where
        F: FnOnce(&mut T) -> Result<bool, E>,
        E: From<RepoError>;

    /// Runs `unit` in one transaction. The store handed to `unit` can back
    /// repositories of other record types that join the same transaction.
    fn transaction<R, E, F>(&self, unit: F) -> Result<R, E>
    where
        F: FnOnce(&Self::Store) -> Result<R, E>,
        E: From<RepoError>;
}

/// Store-backed [`Crud`] implementation for record type `T`.
pub struct Repository<S, T> {
    store: S,
    _record: PhantomData<fn() -> T>,
}

/// Repository over a borrowed SQLite connection.
pub type SqliteRepository<'conn, T> = Repository<SqliteStore<'conn>, T>;

impl<S: Store, T: Entity> Repository<S, T> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            _record: PhantomData,
        }
    }

    /// Repository sharing `store`, e.g. inside a transaction closure.
    pub fn from_store(store: &S) -> Self {
        Self::new(store.clone())
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    fn preload(&self, records: &mut [T], opts: &QueryOpts) -> RepoResult<()> {
        for relation in opts.preloads() {
            T::preload(&self.store, records, relation)?;
        }
        Ok(())
    }
}

impl<'conn, T: Entity> Repository<SqliteStore<'conn>, T> {
    pub fn sqlite(conn: &'conn rusqlite::Connection) -> Self {
        Self::new(SqliteStore::new(conn))
    }
}

impl<S: Clone, T> Clone for Repository<S, T> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            _record: PhantomData,
        }
    }
}

impl<S: Debug, T> Debug for Repository<S, T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Repository")
            .field("store", &self.store)
            .field("record", &std::any::type_name::<T>())
            .finish()
    }
}

impl<S: Store, T: Entity> Crud<T> for Repository<S, T> {
    type Store = S;

    fn create(&self, records: &mut [T]) -> RepoResult<()> {
        if records.is_empty() {
            return Ok(());
        }

        let started_at = Instant::now();
        match self.store.insert_all(records) {
            Ok(()) => {
                debug!(
                    "event=repo_create module=repo status=ok table={} count={} duration_ms={}",
                    T::TABLE,
                    records.len(),
                    started_at.elapsed().as_millis()
                );
                Ok(())
            }
            Err(err) => {
                warn!(
                    "event=repo_create module=repo status=error table={} count={} error_code={} error={}",
                    T::TABLE,
                    records.len(),
                    err.code(),
                    err
                );
                Err(err)
            }
        }
    }

    fn get(&self, predicate: &Predicate, opts: &[QueryOpt]) -> RepoResult<Option<T>> {
        let opts = QueryOpts::build(opts);
        let mut records = self
            .store
            .query::<T>(predicate, &opts, Some(Window::first()))?;

        if records.is_empty() {
            return opts
                .resolve_not_found(RepoError::not_found(T::TABLE))
                .map(|()| None);
        }

        self.preload(&mut records, &opts)?;
        Ok(records.pop())
    }

    fn list(&self, predicate: &Predicate, opts: &[QueryOpt]) -> RepoResult<ListResult<T>> {
        let started_at = Instant::now();
        let opts = QueryOpts::build(opts);

        let total = if opts.paginate() {
            Some(self.store.count::<T>(predicate)?)
        } else {
            None
        };

        let mut items = self.store.query::<T>(predicate, &opts, opts.window())?;
        self.preload(&mut items, &opts)?;

        let result = match total {
            Some(total) => ListResult {
                total,
                page_size: opts.page_size().get(),
                page_count: page_count(total, opts.page_size()),
                page: opts.page().get(),
                items,
            },
            None => ListResult {
                total: items.len() as u64,
                page_size: u32::try_from(items.len()).unwrap_or(u32::MAX),
                page_count: u64::from(!items.is_empty()),
                page: 1,
                items,
            },
        };

        debug!(
            "event=repo_list module=repo status=ok table={} returned={} total={} page={} duration_ms={}",
            T::TABLE,
            result.items.len(),
            result.total,
            result.page,
            started_at.elapsed().as_millis()
        );
        Ok(result)
    }

    fn count(&self, predicate: &Predicate) -> RepoResult<u64> {
        self.store.count::<T>(predicate)
    }

    fn update(&self, predicate: &Predicate, values: &FieldValues) -> RepoResult<()> {
        ensure_scoped_write::<T>(predicate, "update")?;
        if values.is_empty() {
            return Ok(());
        }

        let affected = self
            .store
            .execute::<T>(predicate, Mutation::Update(values))?;
        debug!(
            "event=repo_update module=repo status=ok table={} fields={} affected={}",
            T::TABLE,
            values.len(),
            affected
        );
        Ok(())
    }

    fn delete(&self, predicate: &Predicate, opts: &[QueryOpt]) -> RepoResult<()> {
        let opts = QueryOpts::build(opts);
        ensure_scoped_write::<T>(predicate, "delete")?;

        let affected = self.store.execute::<T>(predicate, Mutation::Delete)?;
        if affected == 0 {
            return opts.resolve_not_found(RepoError::not_found(T::TABLE));
        }

        debug!(
            "event=repo_delete module=repo status=ok table={} affected={}",
            T::TABLE,
            affected
        );
        Ok(())
    }

    fn update_by_fn<E, F>(&self, predicate: &Predicate, update_fn: F) -> Result<(), E>
    where
        F: FnOnce(&mut T) -> Result<bool, E>,
        E: From<RepoError>,
    {
        let started_at = Instant::now();
        let outcome = self.store.run_in_transaction(|store: &S| -> Result<bool, E> {
            let mut record = store
                .query::<T>(predicate, &QueryOpts::default(), Some(Window::first()))?
                .into_iter()
                .next()
                .ok_or_else(|| RepoError::not_found(T::TABLE))?;

            if !update_fn(&mut record)? {
                return Ok(false);
            }

            save(store, &record)?;
            Ok(true)
        });

        match &outcome {
            Ok(written) => info!(
                "event=repo_update_by_fn module=repo status=ok table={} written={} duration_ms={}",
                T::TABLE,
                written,
                started_at.elapsed().as_millis()
            ),
            Err(_) => info!(
                "event=repo_update_by_fn module=repo status=rolled_back table={} duration_ms={}",
                T::TABLE,
                started_at.elapsed().as_millis()
            ),
        }
        outcome.map(|_| ())
    }

    fn transaction<R, E, F>(&self, unit: F) -> Result<R, E>
    where
        F: FnOnce(&S) -> Result<R, E>,
        E: From<RepoError>,
    {
        let started_at = Instant::now();
        let outcome = self.store.run_in_transaction(unit);
        info!(
            "event=repo_transaction module=repo status={} table={} duration_ms={}",
            if outcome.is_ok() {
                "committed"
            } else {
                "rolled_back"
            },
            T::TABLE,
            started_at.elapsed().as_millis()
        );
        outcome
    }
}

/// Writes every column of `record` back to its row, matched by key.
fn save<S: Store, T: Entity>(store: &S, record: &T) -> RepoResult<()> {
    let values: FieldValues = record.values().into_iter().collect();
    let by_key = Predicate::all().equals(T::KEY, record.key());

    let affected = store.execute::<T>(&by_key, Mutation::Update(&values))?;
    if affected == 0 && !values.is_empty() {
        return Err(RepoError::not_found(T::TABLE));
    }
    Ok(())
}

fn ensure_scoped_write<T: Entity>(predicate: &Predicate, operation: &str) -> RepoResult<()> {
    if predicate.is_empty() {
        return Err(RepoError::configuration(format!(
            "refusing to {operation} every row of `{}` without conditions",
            T::TABLE
        )));
    }
    Ok(())
}
