//! Connection bootstrap utilities for SQLite.
//!
//! # Responsibility
//! - Open file or in-memory SQLite connections.
//! - Configure connection pragmas required by repository behavior.
//!
//! # Invariants
//! - Returned connections have `foreign_keys=ON`.
//! - Double-quoted identifiers never fall back to string literals.
//! - Every open attempt emits one `db_open` start event and one result event.

use super::DbResult;
use crate::config::{Driver, StoreConfig};
use log::{error, info};
use rusqlite::config::DbConfig;
use rusqlite::Connection;
use std::path::Path;
use std::time::{Duration, Instant};

const PREPARED_STATEMENT_CACHE_CAPACITY: usize = 64;

/// Opens the store described by `config`.
///
/// # Side effects
/// - Emits `db_open` logging events with duration and status.
///
/// # Errors
/// - Returns `DbError::Config` when `config` fails validation.
/// - Returns `DbError::Sqlite` when the connection cannot be opened or configured.
pub fn open_store(config: &StoreConfig) -> DbResult<Connection> {
    config.validate()?;

    match config.driver {
        Driver::Sqlite if config.is_in_memory() => {
            open_with(config, "memory", Connection::open_in_memory)
        }
        Driver::Sqlite => open_with(config, "file", || Connection::open(&config.dsn)),
    }
}

/// Opens a SQLite database file with default settings.
pub fn open_db(path: impl AsRef<Path>) -> DbResult<Connection> {
    let path = path.as_ref();
    open_with(&StoreConfig::default(), "file", || Connection::open(path))
}

/// Opens an in-memory SQLite database with default settings.
pub fn open_db_in_memory() -> DbResult<Connection> {
    open_with(&StoreConfig::default(), "memory", Connection::open_in_memory)
}

fn open_with(
    config: &StoreConfig,
    mode: &str,
    open: impl FnOnce() -> rusqlite::Result<Connection>,
) -> DbResult<Connection> {
    let started_at = Instant::now();
    info!("event=db_open module=db status=start driver=sqlite mode={mode}");

    let conn = match open() {
        Ok(conn) => conn,
        Err(err) => {
            error!(
                "event=db_open module=db status=error mode={} duration_ms={} error_code=db_open_failed error={}",
                mode,
                started_at.elapsed().as_millis(),
                err
            );
            return Err(err.into());
        }
    };

    match bootstrap_connection(&conn, config) {
        Ok(()) => {
            info!(
                "event=db_open module=db status=ok mode={} duration_ms={} debug={} prepare_stmt={}",
                mode,
                started_at.elapsed().as_millis(),
                config.debug,
                config.prepare_stmt
            );
            Ok(conn)
        }
        Err(err) => {
            error!(
                "event=db_open module=db status=error mode={} duration_ms={} error_code=db_bootstrap_failed error={}",
                mode,
                started_at.elapsed().as_millis(),
                err
            );
            Err(err)
        }
    }
}

fn bootstrap_connection(conn: &Connection, config: &StoreConfig) -> DbResult<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.set_db_config(DbConfig::SQLITE_DBCONFIG_DQS_DML, false)?;
    conn.set_db_config(DbConfig::SQLITE_DBCONFIG_DQS_DDL, false)?;
    conn.busy_timeout(Duration::from_millis(config.busy_timeout_ms))?;
    if config.prepare_stmt {
        conn.set_prepared_statement_cache_capacity(PREPARED_STATEMENT_CACHE_CAPACITY);
    }
    Ok(())
}
