//! Query inputs shared by every repository: predicates and options.

pub mod options;
pub mod predicate;

pub use options::{QueryOpt, QueryOpts, Window, DEFAULT_PAGE_SIZE};
pub use predicate::{Criterion, FieldValues, Predicate};
