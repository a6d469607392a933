//! Visibility primitives for keel.
//!
//! The event pipeline needs exactly one security question answered: when
//! an alternative-retrieval handler produces an entity without opting out
//! of verification, is that `(type, id)` inside the caller's effective
//! visible set? [`VisibilityCheck`] is that contract.
//!
//! # Crate Architecture
//!
//! ```text
//! keel-types  (EntityType, PrimaryKey)
//!     ↑
//! keel-auth  ◄── THIS CRATE
//! (VisibilityCheck, AllowAll, DenyAll, VisibleSet)
//!     ↑
//! keel-hook  (alternative retrieval fallback)
//! ```
//!
//! Concrete row-level evaluators live with the host application; this
//! crate ships the trait plus trivial policies for tests and tools.

pub mod visibility;
pub mod visible_set;

pub use visibility::{AllowAll, DenyAll, VisibilityCheck};
pub use visible_set::VisibleSet;
