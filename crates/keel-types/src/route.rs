//! Property routes: a member path rooted at an entity type.

use crate::EntityType;
use std::fmt;
use thiserror::Error;

/// Errors from parsing a [`PropertyRoute`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RouteError {
    /// The path string was empty.
    #[error("property route for {root} has an empty path")]
    EmptyPath {
        /// Root entity type.
        root: EntityType,
    },

    /// A segment between dots was empty (`"a..b"`, `".a"`).
    #[error("property route '{path}' for {root} has an empty segment")]
    EmptySegment {
        /// Root entity type.
        root: EntityType,
        /// Offending path.
        path: String,
    },
}

/// A member path rooted at an entity type, e.g. `(Order).Customer.Name`.
///
/// Used as the key of computed query bindings: the storage engine asks the
/// registry for the binding of a route while translating a query.
///
/// # Example
///
/// ```
/// use keel_types::PropertyRoute;
///
/// struct Order;
///
/// let route = PropertyRoute::parse::<Order>("Customer.Name").unwrap();
/// assert_eq!(route.to_string(), "(Order).Customer.Name");
/// assert_eq!(route.segments(), ["Customer", "Name"]);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PropertyRoute {
    root: EntityType,
    segments: Vec<String>,
}

impl PropertyRoute {
    /// Route to a single member of `T`.
    #[must_use]
    pub fn member<T: ?Sized + 'static>(name: impl Into<String>) -> Self {
        Self {
            root: EntityType::of::<T>(),
            segments: vec![name.into()],
        }
    }

    /// Parses a dotted member path rooted at `T`.
    ///
    /// # Errors
    ///
    /// Returns [`RouteError`] for an empty path or an empty segment.
    pub fn parse<T: ?Sized + 'static>(path: &str) -> Result<Self, RouteError> {
        let root = EntityType::of::<T>();
        if path.is_empty() {
            return Err(RouteError::EmptyPath { root });
        }

        let segments: Vec<String> = path.split('.').map(str::to_string).collect();
        if segments.iter().any(String::is_empty) {
            return Err(RouteError::EmptySegment {
                root,
                path: path.to_string(),
            });
        }

        Ok(Self { root, segments })
    }

    /// Extends the route by one member.
    #[must_use]
    pub fn then(mut self, member: impl Into<String>) -> Self {
        self.segments.push(member.into());
        self
    }

    /// Root entity type.
    #[must_use]
    pub fn root(&self) -> EntityType {
        self.root
    }

    /// Member segments from the root.
    #[must_use]
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Dotted path without the root, e.g. `"Customer.Name"`.
    #[must_use]
    pub fn path(&self) -> String {
        self.segments.join(".")
    }
}

impl fmt::Display for PropertyRoute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({})", self.root)?;
        for segment in &self.segments {
            write!(f, ".{segment}")?;
        }
        Ok(())
    }
}
