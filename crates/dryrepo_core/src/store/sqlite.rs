//! SQLite implementation of the store boundary.
//!
//! # Responsibility
//! - Render predicates, ordering and windows into parameterized SQL.
//! - Map store transactions onto SQLite transactions and savepoints.
//!
//! # Invariants
//! - Every identifier is validated before it reaches SQL text; values are
//!   always bound, never interpolated.
//! - Field names in predicates, ordering and assignments must be declared
//!   in `Entity::COLUMNS`; anything else fails before SQL is rendered.
//! - Top-level transactions are `IMMEDIATE`, so the write lock is held from
//!   the first read until commit.
//! - Nested transactions become savepoints of the outer transaction.

use crate::config::StoreConfig;
use crate::query::options::{QueryOpts, Window};
use crate::query::predicate::{Criterion, Predicate};
use crate::repo::error::{RepoError, RepoResult};
use crate::store::{Entity, Mutation, Store};
use log::{debug, warn};
use once_cell::sync::Lazy;
use regex::Regex;
use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection, Statement, Transaction, TransactionBehavior};

static IDENTIFIER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("valid identifier regex"));
static ORDER_CLAUSE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*([A-Za-z_][A-Za-z0-9_]*)(?:\s+((?i:asc|desc)))?\s*$")
        .expect("valid order clause regex")
});

const NESTED_SAVEPOINT: &str = "dryrepo_nested";

/// Per-store behavior switches taken from [`StoreConfig`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreSettings {
    /// Log every rendered statement at `debug`.
    pub debug: bool,
    /// Reuse prepared statements through the connection cache.
    pub prepare_stmt: bool,
    /// Insert multiple records without wrapping them in a transaction.
    pub skip_default_transaction: bool,
}

impl From<&StoreConfig> for StoreSettings {
    fn from(config: &StoreConfig) -> Self {
        Self {
            debug: config.debug,
            prepare_stmt: config.prepare_stmt,
            skip_default_transaction: config.skip_default_transaction,
        }
    }
}

/// Store backed by one borrowed SQLite connection.
#[derive(Debug, Clone, Copy)]
pub struct SqliteStore<'conn> {
    conn: &'conn Connection,
    settings: StoreSettings,
}

impl<'conn> SqliteStore<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self::with_settings(conn, StoreSettings::default())
    }

    pub fn with_settings(conn: &'conn Connection, settings: StoreSettings) -> Self {
        Self { conn, settings }
    }

    /// Builds a store honoring the behavior switches of `config`.
    pub fn with_config(conn: &'conn Connection, config: &StoreConfig) -> Self {
        Self::with_settings(conn, StoreSettings::from(config))
    }

    pub fn connection(&self) -> &'conn Connection {
        self.conn
    }

    pub fn settings(&self) -> StoreSettings {
        self.settings
    }

    fn with_statement<R>(
        &self,
        sql: &str,
        run: impl FnOnce(&mut Statement<'_>) -> RepoResult<R>,
    ) -> RepoResult<R> {
        if self.settings.debug {
            debug!("event=sql module=store sql={sql}");
        }

        if self.settings.prepare_stmt {
            let mut stmt = self.conn.prepare_cached(sql)?;
            run(&mut *stmt)
        } else {
            let mut stmt = self.conn.prepare(sql)?;
            run(&mut stmt)
        }
    }

    fn run_savepoint<R, E, F>(&self, unit: F) -> Result<R, E>
    where
        F: FnOnce(&Self) -> Result<R, E>,
        E: From<RepoError>,
    {
        self.conn
            .execute_batch(&format!("SAVEPOINT {NESTED_SAVEPOINT};"))
            .map_err(RepoError::from)?;

        match unit(self) {
            Ok(value) => {
                self.conn
                    .execute_batch(&format!("RELEASE {NESTED_SAVEPOINT};"))
                    .map_err(RepoError::from)?;
                Ok(value)
            }
            Err(err) => {
                if let Err(rollback_err) = self.conn.execute_batch(&format!(
                    "ROLLBACK TO {NESTED_SAVEPOINT}; RELEASE {NESTED_SAVEPOINT};"
                )) {
                    warn!(
                        "event=tx_rollback module=store status=error scope=savepoint error={}",
                        rollback_err
                    );
                }
                Err(err)
            }
        }
    }
}

impl Store for SqliteStore<'_> {
    fn insert<T: Entity>(&self, record: &mut T) -> RepoResult<()> {
        let values = record.values();
        let columns = select_list::<T>()?;
        let table = quote_identifier(T::TABLE)?;

        let sql = if values.is_empty() {
            format!("INSERT INTO {table} DEFAULT VALUES RETURNING {columns};")
        } else {
            let names = values
                .iter()
                .map(|(name, _)| column::<T>(name))
                .collect::<RepoResult<Vec<_>>>()?;
            format!(
                "INSERT INTO {table} ({}) VALUES ({}) RETURNING {columns};",
                names.join(", "),
                placeholders(values.len())
            )
        };

        let stored = self.with_statement(&sql, |stmt| {
            let mut rows = stmt.query(params_from_iter(values.into_iter().map(|(_, v)| v)))?;
            match rows.next()? {
                Some(row) => T::from_row(row),
                None => Err(RepoError::InvalidData(format!(
                    "insert into `{}` returned no row",
                    T::TABLE
                ))),
            }
        })?;

        *record = stored;
        Ok(())
    }

    fn insert_all<T: Entity>(&self, records: &mut [T]) -> RepoResult<()> {
        if records.len() < 2 || self.settings.skip_default_transaction {
            return records.iter_mut().try_for_each(|record| self.insert(record));
        }

        self.run_in_transaction(|store| {
            records
                .iter_mut()
                .try_for_each(|record| store.insert(record))
        })
    }

    fn query<T: Entity>(
        &self,
        predicate: &Predicate,
        opts: &QueryOpts,
        window: Option<Window>,
    ) -> RepoResult<Vec<T>> {
        let mut binds = Vec::new();
        let mut sql = format!(
            "SELECT {} FROM {}{}",
            select_list::<T>()?,
            quote_identifier(T::TABLE)?,
            render_where::<T>(predicate, &mut binds)?
        );
        sql.push_str(&render_order_by::<T>(opts.order_by())?);

        if let Some(window) = window {
            sql.push_str(" LIMIT ? OFFSET ?");
            binds.push(Value::Integer(i64::from(window.limit)));
            binds.push(Value::Integer(i64::try_from(window.offset).map_err(|_| {
                RepoError::configuration(format!("offset {} is out of range", window.offset))
            })?));
        }
        sql.push(';');

        self.with_statement(&sql, |stmt| {
            let mut rows = stmt.query(params_from_iter(binds))?;
            let mut records = Vec::new();
            while let Some(row) = rows.next()? {
                records.push(T::from_row(row)?);
            }
            Ok(records)
        })
    }

    fn count<T: Entity>(&self, predicate: &Predicate) -> RepoResult<u64> {
        let mut binds = Vec::new();
        let sql = format!(
            "SELECT COUNT(*) FROM {}{};",
            quote_identifier(T::TABLE)?,
            render_where::<T>(predicate, &mut binds)?
        );

        let total: i64 = self.with_statement(&sql, |stmt| {
            Ok(stmt.query_row(params_from_iter(binds), |row| row.get(0))?)
        })?;
        u64::try_from(total)
            .map_err(|_| RepoError::InvalidData(format!("negative row count {total}")))
    }

    fn execute<T: Entity>(
        &self,
        predicate: &Predicate,
        mutation: Mutation<'_>,
    ) -> RepoResult<usize> {
        let table = quote_identifier(T::TABLE)?;
        let mut binds = Vec::new();

        let sql = match mutation {
            Mutation::Update(values) => {
                if values.is_empty() {
                    return Ok(0);
                }

                let mut assignments = Vec::with_capacity(values.len() + 1);
                for (name, value) in values.iter() {
                    assignments.push(format!("{} = ?", column::<T>(name)?));
                    binds.push(value.clone());
                }
                if let Some(updated_at) = T::UPDATED_AT {
                    if !values.iter().any(|(column, _)| column == updated_at) {
                        assignments.push(format!(
                            "{} = (strftime('%s', 'now') * 1000)",
                            column::<T>(updated_at)?
                        ));
                    }
                }

                format!(
                    "UPDATE {table} SET {}{};",
                    assignments.join(", "),
                    render_where::<T>(predicate, &mut binds)?
                )
            }
            Mutation::Delete => {
                format!(
                    "DELETE FROM {table}{};",
                    render_where::<T>(predicate, &mut binds)?
                )
            }
        };

        self.with_statement(&sql, |stmt| Ok(stmt.execute(params_from_iter(binds))?))
    }

    fn run_in_transaction<R, E, F>(&self, unit: F) -> Result<R, E>
    where
        F: FnOnce(&Self) -> Result<R, E>,
        E: From<RepoError>,
    {
        if !self.conn.is_autocommit() {
            return self.run_savepoint(unit);
        }

        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)
            .map_err(RepoError::from)?;

        match unit(self) {
            Ok(value) => {
                tx.commit().map_err(RepoError::from)?;
                Ok(value)
            }
            Err(err) => {
                if let Err(rollback_err) = tx.rollback() {
                    warn!(
                        "event=tx_rollback module=store status=error scope=transaction error={}",
                        rollback_err
                    );
                }
                Err(err)
            }
        }
    }
}

/// Checks that `name` is a plain SQL identifier.
pub fn validate_identifier(name: &str) -> RepoResult<()> {
    if IDENTIFIER_RE.is_match(name) {
        Ok(())
    } else {
        Err(RepoError::configuration(format!(
            "`{name}` is not a valid column or table name"
        )))
    }
}

fn quote_identifier(name: &str) -> RepoResult<String> {
    validate_identifier(name)?;
    Ok(format!("\"{name}\""))
}

/// Quotes `name` after checking it is a declared column of `T`.
fn column<T: Entity>(name: &str) -> RepoResult<String> {
    validate_identifier(name)?;
    if !T::COLUMNS.contains(&name) {
        return Err(RepoError::configuration(format!(
            "`{name}` is not a column of `{}`",
            T::TABLE
        )));
    }
    Ok(format!("\"{name}\""))
}

fn select_list<T: Entity>() -> RepoResult<String> {
    if T::COLUMNS.is_empty() {
        return Err(RepoError::configuration(format!(
            "entity `{}` declares no columns",
            T::TABLE
        )));
    }
    let columns = T::COLUMNS
        .iter()
        .map(|column| quote_identifier(column))
        .collect::<RepoResult<Vec<_>>>()?;
    Ok(columns.join(", "))
}

/// Renders one sort clause (`column [ASC|DESC]`) over a column of `T`.
pub fn render_order_clause<T: Entity>(clause: &str) -> RepoResult<String> {
    let captures = ORDER_CLAUSE_RE.captures(clause).ok_or_else(|| {
        RepoError::configuration(format!("`{clause}` is not a valid order clause"))
    })?;
    let column = column::<T>(&captures[1])?;
    let direction = match captures.get(2) {
        Some(direction) if direction.as_str().eq_ignore_ascii_case("desc") => "DESC",
        _ => "ASC",
    };
    Ok(format!("{column} {direction}"))
}

fn render_order_by<T: Entity>(clauses: &[String]) -> RepoResult<String> {
    if clauses.is_empty() {
        return Ok(format!(" ORDER BY {} ASC", column::<T>(T::KEY)?));
    }
    let rendered = clauses
        .iter()
        .map(|clause| render_order_clause::<T>(clause))
        .collect::<RepoResult<Vec<_>>>()?;
    Ok(format!(" ORDER BY {}", rendered.join(", ")))
}

/// Renders ` WHERE ...` for `predicate` over the columns of `T`, appending
/// bind values in order.
///
/// Returns an empty string for a predicate that matches every row.
pub fn render_where<T: Entity>(
    predicate: &Predicate,
    binds: &mut Vec<Value>,
) -> RepoResult<String> {
    let mut clauses = Vec::new();

    for (field, criterion) in predicate.includes() {
        let column = column::<T>(field)?;
        clauses.push(match criterion {
            Criterion::Eq(Value::Null) => format!("{column} IS NULL"),
            Criterion::Eq(value) => {
                binds.push(value.clone());
                format!("{column} = ?")
            }
            Criterion::In(values) if values.is_empty() => "0 = 1".to_string(),
            Criterion::In(values) => {
                binds.extend(values.iter().cloned());
                format!("{column} IN ({})", placeholders(values.len()))
            }
        });
    }

    for (field, criterion) in predicate.excludes() {
        let column = column::<T>(field)?;
        match criterion {
            Criterion::Eq(Value::Null) => clauses.push(format!("{column} IS NOT NULL")),
            Criterion::Eq(value) => {
                binds.push(value.clone());
                clauses.push(format!("{column} IS NOT ?"));
            }
            Criterion::In(values) if values.is_empty() => {}
            Criterion::In(values) => {
                binds.extend(values.iter().cloned());
                clauses.push(format!(
                    "({column} IS NULL OR {column} NOT IN ({}))",
                    placeholders(values.len())
                ));
            }
        }
    }

    if clauses.is_empty() {
        Ok(String::new())
    } else {
        Ok(format!(" WHERE {}", clauses.join(" AND ")))
    }
}

fn placeholders(count: usize) -> String {
    vec!["?"; count].join(", ")
}
