//! Generic repository layer.
//!
//! # Responsibility
//! - Provide one CRUD contract for every record type (`crud`).
//! - Reconcile keyed memberships through that contract (`sync`).
//!
//! # Invariants
//! - Repository APIs return semantic errors (`NotFound`, `Configuration`)
//!   in addition to store transport errors.

pub mod crud;
pub mod error;
pub mod sync;

pub use crud::{Crud, ListResult, Repository, SqliteRepository};
pub use error::{RepoError, RepoResult};
pub use sync::sync_keys;
