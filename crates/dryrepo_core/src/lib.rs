//! Generic data-access toolkit.
//!
//! One repository contract over any record type implementing [`Entity`],
//! with predicate filters, query options, transactional read-modify-write
//! and set reconciliation helpers for keyed collections.

pub mod config;
pub mod db;
pub mod logging;
pub mod query;
pub mod reconcile;
pub mod repo;
pub mod store;

pub use config::{ConfigError, ConfigResult, Driver, StoreConfig};
pub use db::{open_db, open_db_in_memory, open_store, DbError, DbResult};
pub use logging::{
    default_log_level, init_logging, logging_status, panic_err, recover_with_stack,
};
pub use query::{Criterion, FieldValues, Predicate, QueryOpt, QueryOpts};
pub use reconcile::project::{
    field_map_field_fn, field_map_struct_fn, pluck_fn, pluck_uniq_fn, select_all,
};
pub use reconcile::set::{set_cmp, uniq, Set, SetDiff};
pub use repo::{
    sync_keys, Crud, ListResult, RepoError, RepoResult, Repository, SqliteRepository,
};
pub use store::{Entity, Mutation, SqliteStore, Store};

/// Returns the crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::core_version;

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
