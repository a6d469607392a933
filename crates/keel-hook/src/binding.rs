//! Computed query bindings.
//!
//! A binding tells the storage engine how to compute a member that has no
//! column of its own: when a query touches the route, the engine asks the
//! factory for an expression and inlines it.

use crate::EventError;
use keel_types::{Expr, PropertyRoute};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Zero-argument factory producing a binding expression.
pub type BindingFactory = Arc<dyn Fn() -> Expr + Send + Sync>;

/// Route-keyed binding table. Keys are unique.
#[derive(Clone, Default)]
pub struct BindingTable {
    entries: HashMap<PropertyRoute, BindingFactory>,
}

impl BindingTable {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a binding.
    ///
    /// # Errors
    ///
    /// Returns [`EventError::DuplicateBinding`] if `route` is already bound;
    /// the existing binding is kept.
    pub fn insert(&mut self, route: PropertyRoute, factory: BindingFactory) -> Result<(), EventError> {
        if self.entries.contains_key(&route) {
            return Err(EventError::DuplicateBinding { route });
        }
        self.entries.insert(route, factory);
        Ok(())
    }

    /// The factory bound to `route`.
    #[must_use]
    pub fn get(&self, route: &PropertyRoute) -> Option<&BindingFactory> {
        self.entries.get(route)
    }

    /// Builds the expression bound to `route`.
    #[must_use]
    pub fn expression(&self, route: &PropertyRoute) -> Option<Expr> {
        self.entries.get(route).map(|factory| factory())
    }

    /// Returns `true` if `route` is bound.
    #[must_use]
    pub fn contains(&self, route: &PropertyRoute) -> bool {
        self.entries.contains_key(route)
    }

    /// Bound routes (unordered).
    pub fn routes(&self) -> impl Iterator<Item = &PropertyRoute> {
        self.entries.keys()
    }

    /// Number of bindings.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if nothing is bound.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Debug for BindingTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.entries.keys()).finish()
    }
}
