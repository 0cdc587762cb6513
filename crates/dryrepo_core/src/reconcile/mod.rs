//! In-memory reconciliation helpers.
//!
//! # Responsibility
//! - Project keys out of records fetched through repositories.
//! - Diff current keys against target keys to decide which rows to write.
//!
//! # Invariants
//! - Helpers are pure; they never touch the store.

pub mod project;
pub mod set;
