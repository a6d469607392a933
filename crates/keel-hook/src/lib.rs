//! Entity lifecycle hooks for keel.
//!
//! This crate provides the per-entity-type event pipeline the storage
//! engine drives around every save, retrieve and bulk operation.
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
//! │                      Hook Layer                  ◄── HERE   │
//! ├─────────────────────────────────────────────────────────────┤
//! │  keel-hook : EntityEvents<T>, Guard, filters, Dispatcher    │
//! └─────────────────────────────────────────────────────────────┘
//!                               ↓
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    Runtime Layer                             │
//! ├─────────────────────────────────────────────────────────────┤
//! │  keel-runtime : SchemaBuilder, Schema, config, logging      │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Core Concepts
//!
//! ## Stages
//!
//! [`Stage`] enumerates the eleven lifecycle points. Notify stages
//! (`PreSaving`, `Saving`, `Saved`, `Retrieved`) run handlers in
//! registration order. Bulk-operation stages (`PreUnsafe*`,
//! `PreBulkInsert`) run them in reverse.
//!
//! ## Registry
//!
//! [`EntityEvents<T>`] holds the handlers of one entity type plus its
//! optional alternative-retrieve handler, cache controller and computed
//! bindings. Registration takes `&mut self`; invocation takes `&self`.
//!
//! ## Guards
//!
//! Guarded stages (`PreUnsafeDelete`, `PreUnsafeMListDelete`,
//! `PreUnsafeUpdate`) collect a [`Guard`] from each handler and combine
//! them. The caller holds the combined guard until the bulk operation
//! finishes; releasing it runs every constituent release even when some
//! fail.
//!
//! ## Filters
//!
//! `FilterQuery` handlers each return a [`FilterQueryResult`]: a
//! translatable [`Expr`](keel_types::Expr) plus an in-memory predicate.
//! [`CombinedFilter`] conjoins them.
//!
//! ## Dispatch
//!
//! [`Dispatcher`] routes `dyn Entity` values and [`EntityType`]-keyed
//! calls to the right registry through a [`SchemaLookup`].
//!
//! # Example
//!
//! ```
//! use keel_hook::{EntityEvents, EntityQuery, Guard};
//! use keel_types::{Entity, PrimaryKey};
//! use std::sync::{Arc, Mutex};
//!
//! #[derive(Debug)]
//! struct Order;
//! impl Entity for Order {
//!     fn id(&self) -> Option<&PrimaryKey> { None }
//! }
//!
//! let log = Arc::new(Mutex::new(Vec::new()));
//! let mut events = EntityEvents::<Order>::new();
//! for name in ["audit", "lock"] {
//!     let log = Arc::clone(&log);
//!     events.on_pre_unsafe_delete(move |_| {
//!         let log = Arc::clone(&log);
//!         Ok(Some(Guard::from_fn(move || log.lock().unwrap().push(name))))
//!     });
//! }
//!
//! let guard = events.pre_unsafe_delete(&EntityQuery::all()).unwrap();
//! // ... bulk delete runs here ...
//! guard.release().unwrap();
//! assert_eq!(log.lock().unwrap().len(), 2);
//! ```
//!
//! [`EntityType`]: keel_types::EntityType

mod args;
mod binding;
mod cache;
mod dispatch;
mod error;
mod filter;
mod guard;
mod handler;
mod query;
mod registry;
mod stage;

#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

pub use args::{AlternativeRetrieveArgs, SavedEventArgs};
pub use binding::{BindingFactory, BindingTable};
pub use cache::CacheController;
pub use dispatch::{Dispatcher, ErasedEvents, SchemaLookup};
pub use error::{EventError, GuardReleaseError, HandlerError};
pub use filter::{CombinedFilter, FilterQueryResult, InMemoryPredicate};
pub use guard::Guard;
pub use handler::{
    AlternativeRetrieveFn, FilterQueryFn, Handler, PreBulkInsertFn, PreSavingFn,
    PreUnsafeDeleteFn, PreUnsafeInsertFn, PreUnsafeMListDeleteFn, PreUnsafeUpdateFn,
    RetrievedFn, SavedFn, SavingFn,
};
pub use query::{EntityQuery, Query, UpdateDescriptor};
pub use registry::EntityEvents;
pub use stage::Stage;
