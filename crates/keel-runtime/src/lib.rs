//! Runtime services for keel.
//!
//! This crate assembles per-type event registries into a frozen
//! [`Schema`] and carries the ambient services around it: layered
//! configuration ([`config`]) and `tracing` initialisation ([`logging`]).
//!
//! # Crate Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    Foundation Layer                          │
//! ├─────────────────────────────────────────────────────────────┤
//! │  keel-types : Entity, EntityType, PrimaryKey, Expr          │
//! │  keel-auth  : VisibilityCheck                               │
//! └─────────────────────────────────────────────────────────────┘
//!                               ↓
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Hook Layer                              │
//! ├─────────────────────────────────────────────────────────────┤
//! │  keel-hook : EntityEvents<T>, Guard, filters, Dispatcher    │
//! └─────────────────────────────────────────────────────────────┘
//!                               ↓
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    Runtime Layer                 ◄── HERE   │
//! ├─────────────────────────────────────────────────────────────┤
//! │  keel-runtime : SchemaBuilder, Schema, config, logging      │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Lifecycle
//!
//! 1. Load [`KeelConfig`](config::KeelConfig) with
//!    [`ConfigLoader`](config::ConfigLoader) and call
//!    [`init_tracing`](logging::init_tracing).
//! 2. Register handlers through [`SchemaBuilder::events`].
//! 3. [`SchemaBuilder::build`] freezes the schema; share it with `Arc`.
//! 4. The storage engine calls [`Schema::dispatcher`] for each operation.

pub mod config;
pub mod logging;
mod schema;

pub use schema::{Schema, SchemaBuilder};
