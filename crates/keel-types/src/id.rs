//! Identifier types: entity primary keys and runtime entity-type identity.

use serde::{Deserialize, Serialize};
use std::any::TypeId;
use std::fmt;
use std::hash::{Hash, Hasher};
use uuid::Uuid;

/// Primary key of a persisted entity.
///
/// The storage engine decides which representation a table uses; the
/// event pipeline only compares, hashes and prints keys.
///
/// # Example
///
/// ```
/// use keel_types::PrimaryKey;
///
/// let a = PrimaryKey::from(42);
/// let b: PrimaryKey = "ORD-7".into();
///
/// assert_eq!(a.to_string(), "42");
/// assert_eq!(b.to_string(), "ORD-7");
/// assert_ne!(a, b);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PrimaryKey {
    /// Integer identity column.
    Int(i64),
    /// GUID identity column.
    Guid(Uuid),
    /// Natural text key.
    Text(String),
}

impl PrimaryKey {
    /// Creates a random GUID key.
    #[must_use]
    pub fn new_guid() -> Self {
        Self::Guid(Uuid::new_v4())
    }

    /// Returns the integer value, if this is an integer key.
    #[must_use]
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            _ => None,
        }
    }
}

impl From<i64> for PrimaryKey {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<i32> for PrimaryKey {
    fn from(value: i32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<Uuid> for PrimaryKey {
    fn from(value: Uuid) -> Self {
        Self::Guid(value)
    }
}

impl From<&str> for PrimaryKey {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for PrimaryKey {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl fmt::Display for PrimaryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(v) => write!(f, "{v}"),
            Self::Guid(v) => write!(f, "{v}"),
            Self::Text(v) => f.write_str(v),
        }
    }
}

/// Runtime identity of a concrete entity type.
///
/// Equality and hashing use the [`TypeId`] only; the name is carried for
/// diagnostics (error messages, log fields).
///
/// # Example
///
/// ```
/// use keel_types::EntityType;
///
/// struct Order;
/// struct Invoice;
///
/// let order = EntityType::of::<Order>();
/// assert_eq!(order.name(), "Order");
/// assert!(order.is::<Order>());
/// assert_ne!(order, EntityType::of::<Invoice>());
/// ```
#[derive(Debug, Clone, Copy)]
pub struct EntityType {
    type_id: TypeId,
    name: &'static str,
}

impl EntityType {
    /// Returns the identity of `T`.
    #[must_use]
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            name: short_type_name(std::any::type_name::<T>()),
        }
    }

    /// Short (path-less) type name, e.g. `"Order"`.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Underlying [`TypeId`].
    #[must_use]
    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// Returns `true` if this identity belongs to `T`.
    #[must_use]
    pub fn is<T: ?Sized + 'static>(&self) -> bool {
        self.type_id == TypeId::of::<T>()
    }
}

impl PartialEq for EntityType {
    fn eq(&self, other: &Self) -> bool {
        self.type_id == other.type_id
    }
}

impl Eq for EntityType {}

impl Hash for EntityType {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.type_id.hash(state);
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// Strips the module path while keeping generic arguments readable.
fn short_type_name(full: &'static str) -> &'static str {
    let head = full.split('<').next().unwrap_or(full);
    match head.rfind("::") {
        Some(pos) => &full[pos + 2..],
        None => full,
    }
}
