//! Core types for keel.
//!
//! This crate provides the foundation vocabulary shared by the entity
//! event pipeline and the storage engine that drives it.
//!
//! # Crate Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    Foundation Layer                          │
//! ├─────────────────────────────────────────────────────────────┤
//! │  keel-types   : Entity, EntityType, PrimaryKey, Expr  ◄── HERE │
//! │  keel-auth    : VisibilityCheck                             │
//! └─────────────────────────────────────────────────────────────┘
//!                               ↓
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Hook Layer                              │
//! ├─────────────────────────────────────────────────────────────┤
//! │  keel-hook    : EntityEvents<T>, Guard, Dispatcher          │
//! └─────────────────────────────────────────────────────────────┘
//!                               ↓
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    Runtime Layer                             │
//! ├─────────────────────────────────────────────────────────────┤
//! │  keel-runtime : Schema, config, logging                     │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```
//! use keel_types::{Entity, EntityType, Expr, PrimaryKey, PropertyRoute};
//!
//! #[derive(Debug)]
//! struct Order {
//!     id: Option<PrimaryKey>,
//! }
//!
//! impl Entity for Order {
//!     fn id(&self) -> Option<&PrimaryKey> {
//!         self.id.as_ref()
//!     }
//! }
//!
//! let ty = EntityType::of::<Order>();
//! let route = PropertyRoute::member::<Order>("Total");
//! assert_eq!(route.root(), ty);
//!
//! let not_archived = !Expr::field("archived");
//! assert_eq!(not_archived.to_string(), "!archived");
//! ```

mod entity;
mod error;
mod expr;
mod id;
mod route;

pub use entity::{AsAny, Entity};
pub use error::{assert_error_code, assert_error_codes, ErrorCode};
pub use expr::{Expr, FieldInit};
pub use id::{EntityType, PrimaryKey};
pub use route::{PropertyRoute, RouteError};

impl ErrorCode for RouteError {
    fn code(&self) -> &'static str {
        match self {
            Self::EmptyPath { .. } => "KEEL_ROUTE_EMPTY_PATH",
            Self::EmptySegment { .. } => "KEEL_ROUTE_EMPTY_SEGMENT",
        }
    }

    fn is_recoverable(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Order;

    #[test]
    fn route_error_codes() {
        let errors = [
            PropertyRoute::parse::<Order>("").expect_err("empty path"),
            PropertyRoute::parse::<Order>("a..b").expect_err("empty segment"),
        ];
        assert_error_codes(&errors, "KEEL_ROUTE_");
        assert!(errors.iter().all(|e| !e.is_recoverable()));
    }
}
