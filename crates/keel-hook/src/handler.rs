//! Handler signatures, one per stage.
//!
//! Handlers are plain closures. Each is bound to exactly one
//! `(entity type, stage)` pair by the variant of [`Handler`] it is wrapped
//! in; identity is irrelevant, only registration order matters.

use crate::{
    AlternativeRetrieveArgs, EntityQuery, FilterQueryResult, Guard, HandlerError, Query,
    SavedEventArgs, Stage, UpdateDescriptor,
};
use keel_types::{Expr, PrimaryKey};
use std::fmt;

/// `PreSaving`: may mutate the graph and set `graph_modified`.
pub type PreSavingFn<T> = Box<dyn Fn(&mut T, &mut bool) -> Result<(), HandlerError> + Send + Sync>;
/// `Saving`.
pub type SavingFn<T> = Box<dyn Fn(&mut T) -> Result<(), HandlerError> + Send + Sync>;
/// `Saved`.
pub type SavedFn<T> = Box<dyn Fn(&T, &SavedEventArgs) -> Result<(), HandlerError> + Send + Sync>;
/// `Retrieved`.
pub type RetrievedFn<T> = Box<dyn Fn(&mut T) -> Result<(), HandlerError> + Send + Sync>;
/// `FilterQuery`: must be free of side effects.
pub type FilterQueryFn<T> = Box<dyn Fn() -> FilterQueryResult<T> + Send + Sync>;
/// `AlternativeRetrieve`.
pub type AlternativeRetrieveFn<T> =
    Box<dyn Fn(&PrimaryKey, &mut AlternativeRetrieveArgs<T>) -> Result<(), HandlerError> + Send + Sync>;
/// `PreUnsafeDelete`: may return a guard.
pub type PreUnsafeDeleteFn<T> =
    Box<dyn Fn(&EntityQuery<T>) -> Result<Option<Guard>, HandlerError> + Send + Sync>;
/// `PreUnsafeMListDelete`: relationship-table query plus owning-entity query.
pub type PreUnsafeMListDeleteFn<T> =
    Box<dyn Fn(&Query, &EntityQuery<T>) -> Result<Option<Guard>, HandlerError> + Send + Sync>;
/// `PreUnsafeUpdate`: the update plus its entity-scoped view.
pub type PreUnsafeUpdateFn<T> = Box<
    dyn Fn(&UpdateDescriptor, &EntityQuery<T>) -> Result<Option<Guard>, HandlerError> + Send + Sync,
>;
/// `PreUnsafeInsert`: returns a replacement constructor, or `None` to keep it.
pub type PreUnsafeInsertFn<T> = Box<
    dyn Fn(&Query, &Expr, &EntityQuery<T>) -> Result<Option<Expr>, HandlerError> + Send + Sync,
>;
/// `PreBulkInsert`: `true` when the target is a relationship table.
pub type PreBulkInsertFn = Box<dyn Fn(bool) -> Result<(), HandlerError> + Send + Sync>;

/// A handler bound to one stage.
pub enum Handler<T> {
    /// See [`PreSavingFn`].
    PreSaving(PreSavingFn<T>),
    /// See [`SavingFn`].
    Saving(SavingFn<T>),
    /// See [`SavedFn`].
    Saved(SavedFn<T>),
    /// See [`RetrievedFn`].
    Retrieved(RetrievedFn<T>),
    /// See [`FilterQueryFn`].
    FilterQuery(FilterQueryFn<T>),
    /// See [`AlternativeRetrieveFn`].
    AlternativeRetrieve(AlternativeRetrieveFn<T>),
    /// See [`PreUnsafeDeleteFn`].
    PreUnsafeDelete(PreUnsafeDeleteFn<T>),
    /// See [`PreUnsafeMListDeleteFn`].
    PreUnsafeMListDelete(PreUnsafeMListDeleteFn<T>),
    /// See [`PreUnsafeUpdateFn`].
    PreUnsafeUpdate(PreUnsafeUpdateFn<T>),
    /// See [`PreUnsafeInsertFn`].
    PreUnsafeInsert(PreUnsafeInsertFn<T>),
    /// See [`PreBulkInsertFn`].
    PreBulkInsert(PreBulkInsertFn),
}

impl<T> Handler<T> {
    /// The stage this handler is bound to.
    #[must_use]
    pub fn stage(&self) -> Stage {
        match self {
            Self::PreSaving(_) => Stage::PreSaving,
            Self::Saving(_) => Stage::Saving,
            Self::Saved(_) => Stage::Saved,
            Self::Retrieved(_) => Stage::Retrieved,
            Self::FilterQuery(_) => Stage::FilterQuery,
            Self::AlternativeRetrieve(_) => Stage::AlternativeRetrieve,
            Self::PreUnsafeDelete(_) => Stage::PreUnsafeDelete,
            Self::PreUnsafeMListDelete(_) => Stage::PreUnsafeMListDelete,
            Self::PreUnsafeUpdate(_) => Stage::PreUnsafeUpdate,
            Self::PreUnsafeInsert(_) => Stage::PreUnsafeInsert,
            Self::PreBulkInsert(_) => Stage::PreBulkInsert,
        }
    }
}

impl<T> fmt::Debug for Handler<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Handler").field(&self.stage()).finish()
    }
}
