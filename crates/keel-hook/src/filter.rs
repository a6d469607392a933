//! Row-level visibility filters.
//!
//! Each `FilterQuery` handler produces one [`FilterQueryResult`] per
//! query-build event: a translatable predicate the storage engine pushes
//! into the query, and an equivalent in-memory predicate applied to
//! instances that are already materialised (cached rows, preloaded
//! graphs). Both forms must agree.
//!
//! The registry returns results in registration order and never caches
//! them. Composing them is the consumer's job; [`CombinedFilter`] is the
//! conjunction most consumers want.

use keel_types::Expr;
use std::fmt;
use std::sync::Arc;

/// In-memory form of a visibility predicate.
pub type InMemoryPredicate<T> = Arc<dyn Fn(&T) -> bool + Send + Sync>;

/// One filter handler's contribution to a query.
pub struct FilterQueryResult<T> {
    in_database: Expr,
    in_memory: InMemoryPredicate<T>,
}

impl<T> FilterQueryResult<T> {
    /// Pairs a translatable predicate with its in-memory equivalent.
    pub fn new(in_database: Expr, in_memory: impl Fn(&T) -> bool + Send + Sync + 'static) -> Self {
        Self {
            in_database,
            in_memory: Arc::new(in_memory),
        }
    }

    /// Predicate pushed into the storage query.
    #[must_use]
    pub fn in_database(&self) -> &Expr {
        &self.in_database
    }

    /// Shared handle to the in-memory predicate.
    #[must_use]
    pub fn in_memory(&self) -> &InMemoryPredicate<T> {
        &self.in_memory
    }

    /// Evaluates the in-memory predicate.
    #[must_use]
    pub fn matches(&self, entity: &T) -> bool {
        (self.in_memory)(entity)
    }
}

impl<T> Clone for FilterQueryResult<T> {
    fn clone(&self) -> Self {
        Self {
            in_database: self.in_database.clone(),
            in_memory: Arc::clone(&self.in_memory),
        }
    }
}

impl<T> fmt::Debug for FilterQueryResult<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FilterQueryResult")
            .field("in_database", &self.in_database)
            .finish_non_exhaustive()
    }
}

/// Conjunction of several filter results.
///
/// # Example
///
/// ```
/// use keel_hook::{CombinedFilter, FilterQueryResult};
/// use keel_types::Expr;
///
/// struct Doc { archived: bool, tenant: u32 }
///
/// let filters = vec![
///     FilterQueryResult::new(!Expr::field("archived"), |d: &Doc| !d.archived),
///     FilterQueryResult::new(
///         Expr::field("tenant").equals(Expr::param("current")),
///         |d: &Doc| d.tenant == 1,
///     ),
/// ];
///
/// let combined = CombinedFilter::conjoin(filters);
/// assert_eq!(combined.in_database().to_string(), "!archived && tenant == @current");
/// assert!(combined.matches(&Doc { archived: false, tenant: 1 }));
/// assert!(!combined.matches(&Doc { archived: true, tenant: 1 }));
/// ```
pub struct CombinedFilter<T> {
    in_database: Expr,
    predicates: Vec<InMemoryPredicate<T>>,
}

impl<T> CombinedFilter<T> {
    /// Conjoins results in the given order. Zero results accept everything.
    pub fn conjoin(results: impl IntoIterator<Item = FilterQueryResult<T>>) -> Self {
        let (exprs, predicates): (Vec<_>, Vec<_>) = results
            .into_iter()
            .map(|r| (r.in_database, r.in_memory))
            .unzip();
        Self {
            in_database: Expr::and_all(exprs),
            predicates,
        }
    }

    /// Conjoined translatable predicate (`true` when no filters apply).
    #[must_use]
    pub fn in_database(&self) -> &Expr {
        &self.in_database
    }

    /// Returns `true` if no filter restricts visibility.
    #[must_use]
    pub fn is_unrestricted(&self) -> bool {
        self.predicates.is_empty()
    }

    /// Evaluates every in-memory predicate, short-circuiting on the first
    /// rejection.
    #[must_use]
    pub fn matches(&self, entity: &T) -> bool {
        self.predicates.iter().all(|p| p(entity))
    }

    /// Keeps the visible entities of an already-materialised sequence.
    pub fn apply<'a>(&'a self, entities: impl IntoIterator<Item = &'a T>) -> Vec<&'a T> {
        entities.into_iter().filter(|e| self.matches(e)).collect()
    }
}

impl<T> fmt::Debug for CombinedFilter<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CombinedFilter")
            .field("in_database", &self.in_database)
            .field("predicates", &self.predicates.len())
            .finish()
    }
}
