//! Cache-controller slot.
//!
//! Each entity type may associate one cache controller. The storage
//! engine consults it before a live lookup; how the cache fills and
//! invalidates itself is the controller's business.

use keel_types::{Entity, PrimaryKey};

/// Cache-management capability for entity type `T`.
pub trait CacheController<T: Entity>: Send + Sync {
    /// Returns `true` if retrieval should be served from this cache.
    fn enabled(&self) -> bool;

    /// Cached copy of the entity with `id`, if present.
    fn try_get(&self, id: &PrimaryKey) -> Option<T>;
}
