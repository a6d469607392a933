//! Explicit grant set.

use crate::VisibilityCheck;
use keel_types::{EntityType, PrimaryKey};
use parking_lot::RwLock;
use std::collections::HashSet;

/// A [`VisibilityCheck`] backed by an explicit set of `(type, id)` grants.
///
/// Grants can be added and revoked while the set is shared between
/// threads; reads take a shared lock.
///
/// # Example
///
/// ```
/// use keel_auth::{VisibilityCheck, VisibleSet};
/// use keel_types::{EntityType, PrimaryKey};
///
/// struct Order;
/// let ty = EntityType::of::<Order>();
///
/// let set = VisibleSet::new();
/// set.grant(ty, PrimaryKey::Int(1));
/// assert!(set.is_visible(&ty, &PrimaryKey::Int(1)));
/// assert!(!set.is_visible(&ty, &PrimaryKey::Int(2)));
/// ```
#[derive(Debug, Default)]
pub struct VisibleSet {
    grants: RwLock<HashSet<(EntityType, PrimaryKey)>>,
}

impl VisibleSet {
    /// Creates an empty set (nothing visible).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes `(entity_type, id)` visible. Returns `false` if it already was.
    pub fn grant(&self, entity_type: EntityType, id: PrimaryKey) -> bool {
        let inserted = self.grants.write().insert((entity_type, id.clone()));
        tracing::debug!(entity_type = %entity_type, id = %id, inserted, "visibility granted");
        inserted
    }

    /// Removes a grant. Returns `true` if it existed.
    pub fn revoke(&self, entity_type: EntityType, id: &PrimaryKey) -> bool {
        let removed = self.grants.write().remove(&(entity_type, id.clone()));
        tracing::debug!(entity_type = %entity_type, id = %id, removed, "visibility revoked");
        removed
    }

    /// Number of grants.
    #[must_use]
    pub fn len(&self) -> usize {
        self.grants.read().len()
    }

    /// Returns `true` if nothing is visible.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.grants.read().is_empty()
    }
}

impl<I> FromIterator<(EntityType, I)> for VisibleSet
where
    I: Into<PrimaryKey>,
{
    fn from_iter<It: IntoIterator<Item = (EntityType, I)>>(iter: It) -> Self {
        let grants = iter.into_iter().map(|(ty, id)| (ty, id.into())).collect();
        Self {
            grants: RwLock::new(grants),
        }
    }
}

impl VisibilityCheck for VisibleSet {
    fn is_visible(&self, entity_type: &EntityType, id: &PrimaryKey) -> bool {
        self.grants.read().contains(&(*entity_type, id.clone()))
    }
}
