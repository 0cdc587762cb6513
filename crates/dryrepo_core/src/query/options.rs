//! Optional query behavior: pagination, ordering, preloading and not-found
//! suppression.
//!
//! # Responsibility
//! - Expose option constructors that each wrap a `QueryOpts -> QueryOpts`
//!   function.
//! - Fold option sequences left to right over the defaults.
//!
//! # Invariants
//! - Page number and page size are never zero.
//! - Later options override earlier scalars; list options replace the
//!   previous list wholesale.
//! - Only `RepoError::NotFound` is routed through the suppression mapper.

use crate::repo::error::{RepoError, RepoResult};
use std::fmt::{Debug, Formatter};
use std::num::NonZeroU32;
use std::sync::Arc;

/// Page size used when pagination is enabled without an explicit size.
pub const DEFAULT_PAGE_SIZE: NonZeroU32 = match NonZeroU32::new(50) {
    Some(size) => size,
    None => panic!("default page size must be non-zero"),
};

/// Maps a not-found error to `None` (swallow) or a replacement error.
pub type NotFoundMapper = Arc<dyn Fn(RepoError) -> Option<RepoError> + Send + Sync>;

/// Resolved query configuration.
#[derive(Clone)]
pub struct QueryOpts {
    order_by: Vec<String>,
    preloads: Vec<String>,
    paginate: bool,
    page: NonZeroU32,
    page_size: NonZeroU32,
    not_found: Option<NotFoundMapper>,
}

impl Default for QueryOpts {
    fn default() -> Self {
        Self {
            order_by: Vec::new(),
            preloads: Vec::new(),
            paginate: false,
            page: NonZeroU32::MIN,
            page_size: DEFAULT_PAGE_SIZE,
            not_found: None,
        }
    }
}

impl Debug for QueryOpts {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryOpts")
            .field("order_by", &self.order_by)
            .field("preloads", &self.preloads)
            .field("paginate", &self.paginate)
            .field("page", &self.page)
            .field("page_size", &self.page_size)
            .field("suppress_not_found", &self.not_found.is_some())
            .finish()
    }
}

impl QueryOpts {
    /// Applies `opts` in order to the default configuration.
    pub fn build(opts: &[QueryOpt]) -> Self {
        opts.iter().fold(Self::default(), |config, opt| (opt.apply)(config))
    }

    pub fn order_by(&self) -> &[String] {
        &self.order_by
    }

    pub fn preloads(&self) -> &[String] {
        &self.preloads
    }

    pub fn paginate(&self) -> bool {
        self.paginate
    }

    pub fn page(&self) -> NonZeroU32 {
        self.page
    }

    pub fn page_size(&self) -> NonZeroU32 {
        self.page_size
    }

    pub fn suppresses_not_found(&self) -> bool {
        self.not_found.is_some()
    }

    /// Row window for the configured page, or `None` when pagination is off.
    pub fn window(&self) -> Option<Window> {
        if !self.paginate {
            return None;
        }
        let size = self.page_size.get();
        Some(Window {
            limit: size,
            offset: u64::from(self.page.get() - 1) * u64::from(size),
        })
    }

    /// Routes `err` through the suppression mapper.
    ///
    /// Returns `Ok(())` when the error is swallowed; every other outcome is
    /// an error, unchanged unless it was a mapped not-found.
    pub fn resolve_not_found(&self, err: RepoError) -> RepoResult<()> {
        match (&self.not_found, err.is_not_found()) {
            (Some(mapper), true) => match mapper(err) {
                Some(mapped) => Err(mapped),
                None => Ok(()),
            },
            _ => Err(err),
        }
    }
}

/// `LIMIT`/`OFFSET` pair applied to a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub limit: u32,
    pub offset: u64,
}

impl Window {
    /// First row only.
    pub fn first() -> Self {
        Self {
            limit: 1,
            offset: 0,
        }
    }
}

/// Number of pages needed for `total` rows.
pub fn page_count(total: u64, page_size: NonZeroU32) -> u64 {
    total.div_ceil(u64::from(page_size.get()))
}

/// One option-function applied by [`QueryOpts::build`].
pub struct QueryOpt {
    apply: Box<dyn Fn(QueryOpts) -> QueryOpts + Send + Sync>,
}

impl Debug for QueryOpt {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str("QueryOpt(..)")
    }
}

impl QueryOpt {
    /// Wraps an arbitrary configuration function.
    pub fn custom(apply: impl Fn(QueryOpts) -> QueryOpts + Send + Sync + 'static) -> Self {
        Self {
            apply: Box::new(apply),
        }
    }

    /// Enables pagination. A zero `page` or `size` keeps the current value.
    pub fn pagination(page: u32, size: u32) -> Self {
        Self::custom(move |mut config| {
            config.paginate = true;
            if let Some(page) = NonZeroU32::new(page) {
                config.page = page;
            }
            if let Some(size) = NonZeroU32::new(size) {
                config.page_size = size;
            }
            config
        })
    }

    /// Sets sort clauses such as `"age DESC"` or `"name"`.
    pub fn order_by<S: Into<String>>(clauses: impl IntoIterator<Item = S>) -> Self {
        let clauses: Vec<String> = clauses.into_iter().map(Into::into).collect();
        Self::custom(move |mut config| {
            config.order_by = clauses.clone();
            config
        })
    }

    /// Sets relations to load eagerly after the main query.
    pub fn preload<S: Into<String>>(relations: impl IntoIterator<Item = S>) -> Self {
        let relations: Vec<String> = relations.into_iter().map(Into::into).collect();
        Self::custom(move |mut config| {
            config.preloads = relations.clone();
            config
        })
    }

    /// Routes not-found errors through `mapper` instead of failing.
    ///
    /// `mapper` returning `None` turns the miss into an empty result;
    /// `Some(err)` replaces the error.
    pub fn suppress_not_found(
        mapper: impl Fn(RepoError) -> Option<RepoError> + Send + Sync + 'static,
    ) -> Self {
        let mapper: NotFoundMapper = Arc::new(mapper);
        Self::custom(move |mut config| {
            config.not_found = Some(Arc::clone(&mapper));
            config
        })
    }
}
