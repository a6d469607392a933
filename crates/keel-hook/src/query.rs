//! Query descriptors handed to bulk-operation handlers.
//!
//! The storage engine owns query translation; handlers only see what a
//! bulk operation targets: a source table plus an optional predicate.

use crate::EventError;
use keel_types::{Entity, EntityType, Expr, FieldInit};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::marker::PhantomData;

/// Untyped query: a source table and an optional predicate.
///
/// Used for relationship-table (mlist) deletes and as the source of a
/// set-based insert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Query {
    /// Table or view name.
    pub source: String,
    /// Row predicate; `None` targets every row.
    pub predicate: Option<Expr>,
}

impl Query {
    /// Query over every row of `source`.
    #[must_use]
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            predicate: None,
        }
    }

    /// Adds a predicate, conjoined with any existing one.
    #[must_use]
    pub fn filter(mut self, predicate: Expr) -> Self {
        self.predicate = Some(match self.predicate.take() {
            Some(existing) => Expr::and_all([existing, predicate]),
            None => predicate,
        });
        self
    }
}

/// Query over the main table of entity type `T`.
///
/// # Example
///
/// ```
/// use keel_hook::EntityQuery;
/// use keel_types::{Entity, Expr, PrimaryKey};
///
/// #[derive(Debug)]
/// struct Order;
/// impl Entity for Order {
///     fn id(&self) -> Option<&PrimaryKey> { None }
/// }
///
/// let q = EntityQuery::<Order>::all().filter(Expr::field("archived"));
/// assert_eq!(q.as_query().source, "Order");
/// assert_eq!(q.predicate(), Some(&Expr::field("archived")));
/// ```
pub struct EntityQuery<T> {
    query: Query,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Entity> EntityQuery<T> {
    /// Every row of `T`'s table (named after the type).
    #[must_use]
    pub fn all() -> Self {
        Self::wrap(Query::new(EntityType::of::<T>().name()))
    }

    /// Types an untyped query over `T`'s table.
    #[must_use]
    pub fn wrap(query: Query) -> Self {
        Self {
            query,
            _marker: PhantomData,
        }
    }

    /// Adds a predicate, conjoined with any existing one.
    #[must_use]
    pub fn filter(self, predicate: Expr) -> Self {
        Self::wrap(self.query.filter(predicate))
    }

    /// Row predicate.
    #[must_use]
    pub fn predicate(&self) -> Option<&Expr> {
        self.query.predicate.as_ref()
    }

    /// Untyped view.
    #[must_use]
    pub fn as_query(&self) -> &Query {
        &self.query
    }

    /// Entity type queried.
    #[must_use]
    pub fn entity_type(&self) -> EntityType {
        EntityType::of::<T>()
    }
}

impl<T> Clone for EntityQuery<T> {
    fn clone(&self) -> Self {
        Self {
            query: self.query.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T> fmt::Debug for EntityQuery<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityQuery")
            .field("source", &self.query.source)
            .field("predicate", &self.query.predicate)
            .finish()
    }
}

/// A set-based update: which rows of which type, and the new values.
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateDescriptor {
    entity_type: EntityType,
    query: Query,
    setters: Vec<FieldInit>,
}

impl UpdateDescriptor {
    /// Update of every row of `T`.
    #[must_use]
    pub fn of<T: Entity>() -> Self {
        Self {
            entity_type: EntityType::of::<T>(),
            query: Query::new(EntityType::of::<T>().name()),
            setters: Vec::new(),
        }
    }

    /// Restricts the updated rows.
    #[must_use]
    pub fn filter(mut self, predicate: Expr) -> Self {
        self.query = self.query.filter(predicate);
        self
    }

    /// Assigns `value` to member `name`.
    #[must_use]
    pub fn set(mut self, name: impl Into<String>, value: Expr) -> Self {
        self.setters.push(FieldInit {
            name: name.into(),
            value,
        });
        self
    }

    /// Updated entity type.
    #[must_use]
    pub fn entity_type(&self) -> EntityType {
        self.entity_type
    }

    /// Member assignments in order.
    #[must_use]
    pub fn setters(&self) -> &[FieldInit] {
        &self.setters
    }

    /// Untyped row query.
    #[must_use]
    pub fn query(&self) -> &Query {
        &self.query
    }

    /// Entity-scoped view of the updated rows.
    ///
    /// # Errors
    ///
    /// Returns [`EventError::TypeMismatch`] if the update targets another type.
    pub fn entity_query<T: Entity>(&self) -> Result<EntityQuery<T>, EventError> {
        let expected = EntityType::of::<T>();
        if self.entity_type != expected {
            return Err(EventError::TypeMismatch {
                expected,
                found: self.entity_type,
            });
        }
        Ok(EntityQuery::wrap(self.query.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use keel_types::PrimaryKey;

    #[derive(Debug)]
    struct Order;
    impl Entity for Order {
        fn id(&self) -> Option<&PrimaryKey> {
            None
        }
    }

    #[derive(Debug)]
    struct Invoice;
    impl Entity for Invoice {
        fn id(&self) -> Option<&PrimaryKey> {
            None
        }
    }

    #[test]
    fn filters_conjoin() {
        let q = Query::new("OrderLines")
            .filter(Expr::field("a"))
            .filter(Expr::field("b"));
        assert_eq!(
            q.predicate.map(|p| p.to_string()).as_deref(),
            Some("a && b")
        );
    }

    #[test]
    fn entity_query_named_after_type() {
        let q = EntityQuery::<Order>::all();
        assert_eq!(q.as_query().source, "Order");
        assert!(q.predicate().is_none());
        assert_eq!(q.entity_type(), EntityType::of::<Order>());
    }

    #[test]
    fn update_derives_entity_view() {
        let update = UpdateDescriptor::of::<Order>()
            .filter(Expr::field("archived"))
            .set("state", Expr::literal("closed"));
        let view = update
            .entity_query::<Order>()
            .expect("update targets Order");
        assert_eq!(view.predicate(), Some(&Expr::field("archived")));
        assert_eq!(update.setters().len(), 1);
    }

    #[test]
    fn update_view_type_checked() {
        let update = UpdateDescriptor::of::<Order>();
        let err = update
            .entity_query::<Invoice>()
            .expect_err("update targets Order, not Invoice");
        assert!(matches!(err, EventError::TypeMismatch { .. }));
    }
}
