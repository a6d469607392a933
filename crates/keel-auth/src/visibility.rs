//! Visibility check trait.
//!
//! Defines [`VisibilityCheck`], the security collaborator consulted by
//! alternative retrieval. The trait lives here so that the hook layer and
//! concrete authorization evaluators can both reference it without a
//! dependency cycle.
//!
//! ```text
//! VisibilityCheck trait (keel-auth)    <- abstract, no runtime deps
//!          │
//!          ├── AllowAll / DenyAll (keel-auth)
//!          ├── VisibleSet (keel-auth)  <- explicit grants
//!          └── (host) row-level evaluator backed by the storage engine
//! ```

use keel_types::{EntityType, PrimaryKey};
use std::sync::Arc;

/// Answers "may the current caller observe entity `(type, id)`?".
///
/// Implementations may block (e.g. run a query); the calling thread's
/// blocking semantics apply.
///
/// # Example
///
/// ```
/// use keel_auth::VisibilityCheck;
/// use keel_types::{EntityType, PrimaryKey};
///
/// struct EvenIdsOnly;
///
/// impl VisibilityCheck for EvenIdsOnly {
///     fn is_visible(&self, _ty: &EntityType, id: &PrimaryKey) -> bool {
///         id.as_int().is_some_and(|v| v % 2 == 0)
///     }
/// }
///
/// struct Order;
/// let ty = EntityType::of::<Order>();
/// assert!(EvenIdsOnly.is_visible(&ty, &PrimaryKey::Int(4)));
/// assert!(!EvenIdsOnly.is_visible(&ty, &PrimaryKey::Int(5)));
/// ```
pub trait VisibilityCheck: Send + Sync {
    /// Returns `true` if the entity is in the caller's effective visible set.
    fn is_visible(&self, entity_type: &EntityType, id: &PrimaryKey) -> bool;
}

impl<V: VisibilityCheck + ?Sized> VisibilityCheck for &V {
    fn is_visible(&self, entity_type: &EntityType, id: &PrimaryKey) -> bool {
        (**self).is_visible(entity_type, id)
    }
}

impl<V: VisibilityCheck + ?Sized> VisibilityCheck for Arc<V> {
    fn is_visible(&self, entity_type: &EntityType, id: &PrimaryKey) -> bool {
        (**self).is_visible(entity_type, id)
    }
}

impl<V: VisibilityCheck + ?Sized> VisibilityCheck for Box<V> {
    fn is_visible(&self, entity_type: &EntityType, id: &PrimaryKey) -> bool {
        (**self).is_visible(entity_type, id)
    }
}

/// Every entity is visible.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

impl VisibilityCheck for AllowAll {
    fn is_visible(&self, _entity_type: &EntityType, _id: &PrimaryKey) -> bool {
        true
    }
}

/// No entity is visible.
#[derive(Debug, Clone, Copy, Default)]
pub struct DenyAll;

impl VisibilityCheck for DenyAll {
    fn is_visible(&self, _entity_type: &EntityType, _id: &PrimaryKey) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Order;

    fn order() -> EntityType {
        EntityType::of::<Order>()
    }

    #[test]
    fn allow_all_allows() {
        assert!(AllowAll.is_visible(&order(), &PrimaryKey::Int(1)));
    }

    #[test]
    fn deny_all_denies() {
        assert!(!DenyAll.is_visible(&order(), &PrimaryKey::Int(1)));
    }

    #[test]
    fn trait_objects_and_wrappers_forward() {
        let boxed: Box<dyn VisibilityCheck> = Box::new(DenyAll);
        assert!(!boxed.is_visible(&order(), &PrimaryKey::Int(1)));

        let shared: Arc<dyn VisibilityCheck> = Arc::new(AllowAll);
        assert!(shared.is_visible(&order(), &PrimaryKey::Int(1)));

        let by_ref = &AllowAll;
        assert!(by_ref.is_visible(&order(), &PrimaryKey::Int(1)));
    }
}
