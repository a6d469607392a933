//! The [`Entity`] trait implemented by every persisted type.

use crate::{EntityType, PrimaryKey};
use std::any::Any;
use std::fmt;

/// Object-safe access to the concrete type behind a `dyn Entity`.
///
/// Blanket-implemented for every `'static + Send + Sync` type; entity
/// authors never implement it by hand.
///
/// Call these methods on `&dyn Entity` / `&mut dyn Entity`, not on a
/// `Box<dyn Entity>` directly: the box itself is `Any` and would answer
/// with its own identity. Deref first (`(*boxed).entity_type()`).
pub trait AsAny: Any + Send + Sync {
    /// Borrows as [`Any`] for `downcast_ref`.
    fn as_any(&self) -> &dyn Any;

    /// Mutably borrows as [`Any`] for `downcast_mut`.
    fn as_any_mut(&mut self) -> &mut dyn Any;

    /// Converts a boxed value into a boxed [`Any`] for `downcast`.
    fn into_any(self: Box<Self>) -> Box<dyn Any>;

    /// Runtime identity of the concrete type.
    fn entity_type(&self) -> EntityType;
}

impl<T: Any + Send + Sync> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any> {
        self
    }

    fn entity_type(&self) -> EntityType {
        EntityType::of::<T>()
    }
}

/// A persisted entity.
///
/// # Example
///
/// ```
/// use keel_types::{Entity, EntityType, PrimaryKey};
///
/// #[derive(Debug)]
/// struct Order {
///     id: Option<PrimaryKey>,
///     archived: bool,
/// }
///
/// impl Entity for Order {
///     fn id(&self) -> Option<&PrimaryKey> {
///         self.id.as_ref()
///     }
/// }
///
/// let order = Order { id: Some(PrimaryKey::Int(1)), archived: false };
/// let erased: &dyn Entity = &order;
/// assert_eq!(erased.entity_type(), EntityType::of::<Order>());
/// assert!(erased.as_any().downcast_ref::<Order>().is_some());
/// ```
pub trait Entity: AsAny + fmt::Debug {
    /// Primary key, or `None` while the entity is new (not yet inserted).
    fn id(&self) -> Option<&PrimaryKey>;

    /// Returns `true` if the entity has not been inserted yet.
    fn is_new(&self) -> bool {
        self.id().is_none()
    }
}

impl dyn Entity {
    /// Returns `true` if the concrete type is `T`.
    #[must_use]
    pub fn is<T: Entity>(&self) -> bool {
        self.as_any().is::<T>()
    }

    /// Downcasts to `&T`.
    #[must_use]
    pub fn downcast_ref<T: Entity>(&self) -> Option<&T> {
        self.as_any().downcast_ref::<T>()
    }

    /// Downcasts to `&mut T`.
    #[must_use]
    pub fn downcast_mut<T: Entity>(&mut self) -> Option<&mut T> {
        self.as_any_mut().downcast_mut::<T>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Order {
        id: Option<PrimaryKey>,
    }

    impl Entity for Order {
        fn id(&self) -> Option<&PrimaryKey> {
            self.id.as_ref()
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
    fn erased_entity_reports_concrete_type() {
        let order = Order { id: None };
        let erased: &dyn Entity = &order;
        assert_eq!(erased.entity_type(), EntityType::of::<Order>());
        assert!(erased.is::<Order>());
        assert!(!erased.is::<Invoice>());
    }

    #[test]
    fn boxed_entity_needs_deref() {
        let boxed: Box<dyn Entity> = Box::new(Invoice);
        assert_eq!((*boxed).entity_type(), EntityType::of::<Invoice>());
    }

    #[test]
    fn downcast_mut_allows_mutation() {
        let mut order = Order { id: None };
        let erased: &mut dyn Entity = &mut order;
        erased
            .downcast_mut::<Order>()
            .expect("concrete type is Order")
            .id = Some(PrimaryKey::Int(9));
        assert_eq!(order.id, Some(PrimaryKey::Int(9)));
    }

    #[test]
    fn is_new_follows_id() {
        assert!(Order { id: None }.is_new());
        assert!(!Order {
            id: Some(PrimaryKey::Int(1))
        }
        .is_new());
    }

    #[test]
    fn into_any_downcast() {
        let boxed: Box<dyn Entity> = Box::new(Order {
            id: Some(PrimaryKey::Int(3)),
        });
        let any = boxed.into_any();
        let order = any.downcast::<Order>().expect("concrete type is Order");
        assert_eq!(order.id, Some(PrimaryKey::Int(3)));
    }
}
