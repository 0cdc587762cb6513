//! Backing-store boundary and the record contract.
//!
//! # Responsibility
//! - Describe how a record type maps to one table (`Entity`).
//! - Define the narrow store interface repositories are written against
//!   (`Store`): insert, query, count, execute, run-in-transaction.
//!
//! # Invariants
//! - Stores never inspect records beyond the `Entity` contract.
//! - Every field a store renders must be one of the entity's `COLUMNS`.
//! - `run_in_transaction` maps to exactly one store transaction; nested
//!   calls join the outer one.
//! - A caller error returned from a transactional closure is handed back
//!   unchanged after rollback.

use crate::query::options::{QueryOpts, Window};
use crate::query::predicate::{FieldValues, Predicate};
use crate::repo::error::{RepoError, RepoResult};
use rusqlite::types::Value;
use rusqlite::Row;

pub mod sqlite;

pub use sqlite::SqliteStore;

/// Record type persisted in a single table.
///
/// Server-generated columns (identity, timestamps) are listed in
/// `COLUMNS` but left out of `values()`; inserts read them back.
pub trait Entity: Sized {
    /// Table name.
    const TABLE: &'static str;
    /// Primary key column.
    const KEY: &'static str;
    /// Columns selected when loading a record.
    const COLUMNS: &'static [&'static str];
    /// Column refreshed with the current time on every update, if any.
    const UPDATED_AT: Option<&'static str> = None;

    /// Decodes one row selected with `COLUMNS`.
    fn from_row(row: &Row<'_>) -> RepoResult<Self>;

    /// Writable column values used by inserts and saves.
    fn values(&self) -> Vec<(&'static str, Value)>;

    /// Primary key value of this record.
    fn key(&self) -> Value;

    /// Loads `relation` for every record in `records`.
    ///
    /// The default knows no relations.
    fn preload<S: Store>(store: &S, records: &mut [Self], relation: &str) -> RepoResult<()> {
        let _ = (store, records);
        Err(RepoError::configuration(format!(
            "unknown relation `{relation}` for `{}`",
            Self::TABLE
        )))
    }
}

/// Write applied to every row matching a predicate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Mutation<'a> {
    Update(&'a FieldValues),
    Delete,
}

/// Transactional backing store.
pub trait Store: Clone {
    /// Inserts `record` and back-fills it with the stored row.
    fn insert<T: Entity>(&self, record: &mut T) -> RepoResult<()>;

    /// Inserts every record; more than one record runs in a single
    /// transaction unless the store is configured otherwise.
    fn insert_all<T: Entity>(&self, records: &mut [T]) -> RepoResult<()>;

    /// Loads matching records using the ordering in `opts` and the optional row window.
    fn query<T: Entity>(
        &self,
        predicate: &Predicate,
        opts: &QueryOpts,
        window: Option<Window>,
    ) -> RepoResult<Vec<T>>;

    /// Counts matching records, ignoring ordering and windows.
    fn count<T: Entity>(&self, predicate: &Predicate) -> RepoResult<u64>;

    /// Applies `mutation` to matching rows and returns the affected row count.
    fn execute<T: Entity>(
        &self,
        predicate: &Predicate,
        mutation: Mutation<'_>,
    ) -> RepoResult<usize>;

    /// Runs `unit` inside one transaction; `Err` rolls back, `Ok` commits.
    fn run_in_transaction<R, E, F>(&self, unit: F) -> Result<R, E>
    where
        F: FnOnce(&Self) -> Result<R, E>,
        E: From<RepoError>;
}
