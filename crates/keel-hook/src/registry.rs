//! Per-entity-type event registry.
//!
//! One [`EntityEvents<T>`] exists per configured entity type. It is filled
//! during schema construction (`&mut self`) and only read afterwards
//! (`&self`), so a built schema can be shared across threads without locks.
//!
//! # Invocation order
//!
//! | Stages | Order |
//! |--------|-------|
//! | `PreSaving`, `Saving`, `Saved`, `Retrieved`, `FilterQuery` | registration order |
//! | `PreUnsafe*`, `PreBulkInsert` | reverse registration order |
//!
//! A failing handler stops the stage; its error is returned unchanged.

use crate::handler::{
    AlternativeRetrieveFn, FilterQueryFn, PreBulkInsertFn, PreSavingFn, PreUnsafeDeleteFn,
    PreUnsafeInsertFn, PreUnsafeMListDeleteFn, PreUnsafeUpdateFn, RetrievedFn, SavedFn, SavingFn,
};
use crate::{
    AlternativeRetrieveArgs, BindingFactory, BindingTable, CacheController, EntityQuery, EventError,
    FilterQueryResult, Guard, Handler, HandlerError, Query, SavedEventArgs, Stage,
    UpdateDescriptor,
};
use keel_auth::VisibilityCheck;
use keel_types::{Entity, EntityType, Expr, PrimaryKey, PropertyRoute};
use std::fmt;
use std::sync::Arc;

/// Lifecycle handlers, cache controller and bindings of entity type `T`.
///
/// # Example
///
/// ```
/// use keel_hook::{EntityEvents, FilterQueryResult};
/// use keel_types::{Entity, Expr, PrimaryKey};
///
/// #[derive(Debug)]
/// struct Order { archived: bool }
/// impl Entity for Order {
///     fn id(&self) -> Option<&PrimaryKey> { None }
/// }
///
/// let mut events = EntityEvents::<Order>::new();
/// events.on_filter_query(|| {
///     FilterQueryResult::new(!Expr::field("archived"), |o: &Order| !o.archived)
/// });
///
/// let filters = events.filter_query();
/// assert_eq!(filters.len(), 1);
/// assert!(filters[0].matches(&Order { archived: false }));
/// ```
pub struct EntityEvents<T: Entity> {
    pre_saving: Vec<PreSavingFn<T>>,
    saving: Vec<SavingFn<T>>,
    saved: Vec<SavedFn<T>>,
    retrieved: Vec<RetrievedFn<T>>,
    filter_query: Vec<FilterQueryFn<T>>,
    alternative_retrieve: Option<AlternativeRetrieveFn<T>>,
    pre_unsafe_delete: Vec<PreUnsafeDeleteFn<T>>,
    pre_unsafe_mlist_delete: Vec<PreUnsafeMListDeleteFn<T>>,
    pre_unsafe_update: Vec<PreUnsafeUpdateFn<T>>,
    pre_unsafe_insert: Vec<PreUnsafeInsertFn<T>>,
    pre_bulk_insert: Vec<PreBulkInsertFn>,
    cache_controller: Option<Arc<dyn CacheController<T>>>,
    bindings: BindingTable,
}

impl<T: Entity> EntityEvents<T> {
    /// Creates a registry with no handlers.
    #[must_use]
    pub fn new() -> Self {
        Self {
            pre_saving: Vec::new(),
            saving: Vec::new(),
            saved: Vec::new(),
            retrieved: Vec::new(),
            filter_query: Vec::new(),
            alternative_retrieve: None,
            pre_unsafe_delete: Vec::new(),
            pre_unsafe_mlist_delete: Vec::new(),
            pre_unsafe_update: Vec::new(),
            pre_unsafe_insert: Vec::new(),
            pre_bulk_insert: Vec::new(),
            cache_controller: None,
            bindings: BindingTable::new(),
        }
    }

    /// The entity type this registry serves.
    #[must_use]
    pub fn entity_type(&self) -> EntityType {
        EntityType::of::<T>()
    }

    // === Registration ===

    /// Appends a handler to its stage.
    ///
    /// # Errors
    ///
    /// Returns [`EventError::AlreadyRegistered`] for a second
    /// `AlternativeRetrieve` handler; the first one stays in place.
    pub fn register(&mut self, handler: Handler<T>) -> Result<(), EventError> {
        let stage = handler.stage();
        match handler {
            Handler::PreSaving(f) => self.pre_saving.push(f),
            Handler::Saving(f) => self.saving.push(f),
            Handler::Saved(f) => self.saved.push(f),
            Handler::Retrieved(f) => self.retrieved.push(f),
            Handler::FilterQuery(f) => self.filter_query.push(f),
            Handler::AlternativeRetrieve(f) => {
                if self.alternative_retrieve.is_some() {
                    tracing::warn!(
                        entity_type = %self.entity_type(),
                        "alternative retrieve handler already registered"
                    );
                    return Err(EventError::AlreadyRegistered {
                        entity_type: self.entity_type(),
                        slot: "alternative_retrieve handler",
                    });
                }
                self.alternative_retrieve = Some(f);
            }
            Handler::PreUnsafeDelete(f) => self.pre_unsafe_delete.push(f),
            Handler::PreUnsafeMListDelete(f) => self.pre_unsafe_mlist_delete.push(f),
            Handler::PreUnsafeUpdate(f) => self.pre_unsafe_update.push(f),
            Handler::PreUnsafeInsert(f) => self.pre_unsafe_insert.push(f),
            Handler::PreBulkInsert(f) => self.pre_bulk_insert.push(f),
        }

        tracing::trace!(
            entity_type = %self.entity_type(),
            stage = %stage,
            count = self.handler_count(stage),
            "handler registered"
        );
        Ok(())
    }

    /// Appends a handler that can never be rejected.
    fn append(&mut self, handler: Handler<T>) -> &mut Self {
        debug_assert!(!handler.stage().is_single());
        if let Err(err) = self.register(handler) {
            tracing::error!(error = %err, "multi-handler stage rejected registration");
        }
        self
    }

    /// Adds a `PreSaving` handler.
    pub fn on_pre_saving(
        &mut self,
        f: impl Fn(&mut T, &mut bool) -> Result<(), HandlerError> + Send + Sync + 'static,
    ) -> &mut Self {
        self.append(Handler::PreSaving(Box::new(f)))
    }

    /// Adds a `Saving` handler.
    pub fn on_saving(
        &mut self,
        f: impl Fn(&mut T) -> Result<(), HandlerError> + Send + Sync + 'static,
    ) -> &mut Self {
        self.append(Handler::Saving(Box::new(f)))
    }

    /// Adds a `Saved` handler.
    pub fn on_saved(
        &mut self,
        f: impl Fn(&T, &SavedEventArgs) -> Result<(), HandlerError> + Send + Sync + 'static,
    ) -> &mut Self {
        self.append(Handler::Saved(Box::new(f)))
    }

    /// Adds a `Retrieved` handler.
    pub fn on_retrieved(
        &mut self,
        f: impl Fn(&mut T) -> Result<(), HandlerError> + Send + Sync + 'static,
    ) -> &mut Self {
        self.append(Handler::Retrieved(Box::new(f)))
    }

    /// Adds a `FilterQuery` handler.
    pub fn on_filter_query(
        &mut self,
        f: impl Fn() -> FilterQueryResult<T> + Send + Sync + 'static,
    ) -> &mut Self {
        self.append(Handler::FilterQuery(Box::new(f)))
    }

    /// Sets the `AlternativeRetrieve` handler.
    ///
    /// # Errors
    ///
    /// Returns [`EventError::AlreadyRegistered`] if one is already set.
    pub fn on_alternative_retrieve(
        &mut self,
        f: impl Fn(&PrimaryKey, &mut AlternativeRetrieveArgs<T>) -> Result<(), HandlerError>
            + Send
            + Sync
            + 'static,
    ) -> Result<&mut Self, EventError> {
        self.register(Handler::AlternativeRetrieve(Box::new(f)))?;
        Ok(self)
    }

    /// Adds a `PreUnsafeDelete` handler.
    pub fn on_pre_unsafe_delete(
        &mut self,
        f: impl Fn(&EntityQuery<T>) -> Result<Option<Guard>, HandlerError> + Send + Sync + 'static,
    ) -> &mut Self {
        self.append(Handler::PreUnsafeDelete(Box::new(f)))
    }

    /// Adds a `PreUnsafeMListDelete` handler.
    pub fn on_pre_unsafe_mlist_delete(
        &mut self,
        f: impl Fn(&Query, &EntityQuery<T>) -> Result<Option<Guard>, HandlerError>
            + Send
            + Sync
            + 'static,
    ) -> &mut Self {
        self.append(Handler::PreUnsafeMListDelete(Box::new(f)))
    }

    /// Adds a `PreUnsafeUpdate` handler.
    pub fn on_pre_unsafe_update(
        &mut self,
        f: impl Fn(&UpdateDescriptor, &EntityQuery<T>) -> Result<Option<Guard>, HandlerError>
            + Send
            + Sync
            + 'static,
    ) -> &mut Self {
        self.append(Handler::PreUnsafeUpdate(Box::new(f)))
    }

    /// Adds a `PreUnsafeInsert` handler.
    pub fn on_pre_unsafe_insert(
        &mut self,
        f: impl Fn(&Query, &Expr, &EntityQuery<T>) -> Result<Option<Expr>, HandlerError>
            + Send
            + Sync
            + 'static,
    ) -> &mut Self {
        self.append(Handler::PreUnsafeInsert(Box::new(f)))
    }

    /// Adds a `PreBulkInsert` handler.
    pub fn on_pre_bulk_insert(
        &mut self,
        f: impl Fn(bool) -> Result<(), HandlerError> + Send + Sync + 'static,
    ) -> &mut Self {
        self.append(Handler::PreBulkInsert(Box::new(f)))
    }

    /// Associates the cache controller.
    ///
    /// # Errors
    ///
    /// Returns [`EventError::AlreadyRegistered`] if one is already set.
    pub fn set_cache_controller(
        &mut self,
        controller: Arc<dyn CacheController<T>>,
    ) -> Result<(), EventError> {
        if self.cache_controller.is_some() {
            return Err(EventError::AlreadyRegistered {
                entity_type: self.entity_type(),
                slot: "cache controller",
            });
        }
        self.cache_controller = Some(controller);
        tracing::debug!(entity_type = %self.entity_type(), "cache controller set");
        Ok(())
    }

    /// The associated cache controller.
    #[must_use]
    pub fn cache_controller(&self) -> Option<&Arc<dyn CacheController<T>>> {
        self.cache_controller.as_ref()
    }

    /// Registers a computed binding for a member of `T`.
    ///
    /// # Errors
    ///
    /// - [`EventError::TypeMismatch`] if the route is rooted at another type
    /// - [`EventError::DuplicateBinding`] if the route is already bound
    pub fn register_binding(
        &mut self,
        route: PropertyRoute,
        factory: impl Fn() -> Expr + Send + Sync + 'static,
    ) -> Result<(), EventError> {
        let expected = self.entity_type();
        if route.root() != expected {
            return Err(EventError::TypeMismatch {
                expected,
                found: route.root(),
            });
        }
        tracing::debug!(entity_type = %expected, route = %route, "binding registered");
        self.bindings.insert(route, Arc::new(factory))
    }

    /// Factory bound to `route`.
    #[must_use]
    pub fn binding(&self, route: &PropertyRoute) -> Option<&BindingFactory> {
        self.bindings.get(route)
    }

    /// Expression bound to `route`, built fresh.
    #[must_use]
    pub fn binding_expression(&self, route: &PropertyRoute) -> Option<Expr> {
        self.bindings.expression(route)
    }

    /// All registered bindings.
    #[must_use]
    pub fn additional_bindings(&self) -> &BindingTable {
        &self.bindings
    }

    /// Number of handlers registered for `stage`.
    #[must_use]
    pub fn handler_count(&self, stage: Stage) -> usize {
        match stage {
            Stage::PreSaving => self.pre_saving.len(),
            Stage::Saving => self.saving.len(),
            Stage::Saved => self.saved.len(),
            Stage::Retrieved => self.retrieved.len(),
            Stage::FilterQuery => self.filter_query.len(),
            Stage::AlternativeRetrieve => usize::from(self.alternative_retrieve.is_some()),
            Stage::PreUnsafeDelete => self.pre_unsafe_delete.len(),
            Stage::PreUnsafeMListDelete => self.pre_unsafe_mlist_delete.len(),
            Stage::PreUnsafeUpdate => self.pre_unsafe_update.len(),
            Stage::PreUnsafeInsert => self.pre_unsafe_insert.len(),
            Stage::PreBulkInsert => self.pre_bulk_insert.len(),
        }
    }

    /// Returns `true` if nothing at all is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        Stage::ALL.iter().all(|s| self.handler_count(*s) == 0)
            && self.cache_controller.is_none()
            && self.bindings.is_empty()
    }

    // === Invocation ===

    fn failed(stage: Stage) -> impl Fn(HandlerError) -> EventError {
        move |err| EventError::from(err).traced(EntityType::of::<T>(), stage)
    }

    /// Runs `PreSaving` handlers in registration order.
    ///
    /// Handlers may mutate `entity` and set `graph_modified`; the flag is
    /// shared by all of them.
    pub fn pre_saving(&self, entity: &mut T, graph_modified: &mut bool) -> Result<(), EventError> {
        for handler in &self.pre_saving {
            handler(entity, graph_modified).map_err(Self::failed(Stage::PreSaving))?;
        }
        Ok(())
    }

    /// Runs `Saving` handlers in registration order.
    pub fn saving(&self, entity: &mut T) -> Result<(), EventError> {
        for handler in &self.saving {
            handler(entity).map_err(Self::failed(Stage::Saving))?;
        }
        Ok(())
    }

    /// Runs `Saved` handlers in registration order.
    pub fn saved(&self, entity: &T, args: &SavedEventArgs) -> Result<(), EventError> {
        for handler in &self.saved {
            handler(entity, args).map_err(Self::failed(Stage::Saved))?;
        }
        Ok(())
    }

    /// Runs `Retrieved` handlers in registration order.
    pub fn retrieved(&self, entity: &mut T) -> Result<(), EventError> {
        for handler in &self.retrieved {
            handler(entity).map_err(Self::failed(Stage::Retrieved))?;
        }
        Ok(())
    }

    /// Calls every `FilterQuery` handler once, in registration order.
    ///
    /// Results are never cached; each call reflects the handlers' current
    /// ambient state.
    #[must_use]
    pub fn filter_query(&self) -> Vec<FilterQueryResult<T>> {
        self.filter_query.iter().map(|handler| handler()).collect()
    }

    /// Resolves `id` through the alternative-retrieve handler.
    ///
    /// - no handler: `Ok(None)`, the caller falls back to its own lookup
    /// - handler left the entity unset: [`EventError::NotFound`]
    /// - verification requested and `security` rejects `id`:
    ///   [`EventError::NotFound`]
    /// - otherwise: the handler's entity
    pub fn alternative_retrieve(
        &self,
        id: &PrimaryKey,
        security: &dyn VisibilityCheck,
    ) -> Result<Option<T>, EventError> {
        let Some(handler) = &self.alternative_retrieve else {
            return Ok(None);
        };
        let entity_type = self.entity_type();

        let mut args = AlternativeRetrieveArgs::new();
        handler(id, &mut args).map_err(Self::failed(Stage::AlternativeRetrieve))?;

        let Some(entity) = args.entity else {
            tracing::debug!(%entity_type, %id, "alternative retrieve produced no entity");
            return Err(EventError::not_found(entity_type, id.clone()));
        };

        if !args.avoid_access_verify && !security.is_visible(&entity_type, id) {
            tracing::debug!(%entity_type, %id, "alternative retrieve rejected by visibility check");
            return Err(EventError::not_found(entity_type, id.clone()));
        }

        Ok(Some(entity))
    }

    /// Runs `PreUnsafeDelete` handlers in reverse order and combines their guards.
    pub fn pre_unsafe_delete(&self, query: &EntityQuery<T>) -> Result<Guard, EventError> {
        self.collect_guards(Stage::PreUnsafeDelete, &self.pre_unsafe_delete, |handler| {
            handler(query)
        })
    }

    /// Runs `PreUnsafeMListDelete` handlers in reverse order and combines
    /// their guards.
    pub fn pre_unsafe_mlist_delete(
        &self,
        mlist_query: &Query,
        entity_query: &EntityQuery<T>,
    ) -> Result<Guard, EventError> {
        self.collect_guards(
            Stage::PreUnsafeMListDelete,
            &self.pre_unsafe_mlist_delete,
            |handler| handler(mlist_query, entity_query),
        )
    }

    /// Runs `PreUnsafeUpdate` handlers in reverse order and combines their
    /// guards. The entity-scoped view is derived from `update`.
    ///
    /// # Errors
    ///
    /// Returns [`EventError::TypeMismatch`] if `update` targets another type,
    /// even when no handlers are registered.
    pub fn pre_unsafe_update(&self, update: &UpdateDescriptor) -> Result<Guard, EventError> {
        let entity_query = update.entity_query::<T>()?;
        self.collect_guards(Stage::PreUnsafeUpdate, &self.pre_unsafe_update, |handler| {
            handler(update, &entity_query)
        })
    }

    /// Folds the insert constructor through `PreUnsafeInsert` handlers.
    ///
    /// Handlers run in reverse registration order; each sees the output of
    /// the previous one. A handler returning `None` keeps the current
    /// constructor.
    pub fn pre_unsafe_insert(
        &self,
        source: &Query,
        constructor: Expr,
        entity_query: &EntityQuery<T>,
    ) -> Result<Expr, EventError> {
        let mut current = constructor;
        for handler in self.pre_unsafe_insert.iter().rev() {
            if let Some(rewritten) = handler(source, &current, entity_query)
                .map_err(Self::failed(Stage::PreUnsafeInsert))?
            {
                current = rewritten;
            }
        }
        Ok(current)
    }

    /// Runs `PreBulkInsert` handlers in reverse order.
    pub fn pre_bulk_insert(&self, in_mlist: bool) -> Result<(), EventError> {
        for handler in self.pre_bulk_insert.iter().rev() {
            handler(in_mlist).map_err(Self::failed(Stage::PreBulkInsert))?;
        }
        Ok(())
    }

    /// Invokes guarded handlers in reverse order.
    ///
    /// On handler failure the guards acquired so far are released before
    /// the error is returned.
    fn collect_guards<H>(
        &self,
        stage: Stage,
        handlers: &[H],
        mut invoke: impl FnMut(&H) -> Result<Option<Guard>, HandlerError>,
    ) -> Result<Guard, EventError> {
        let mut acquired = Vec::with_capacity(handlers.len());
        for handler in handlers.iter().rev() {
            match invoke(handler) {
                Ok(Some(guard)) => acquired.push(guard),
                Ok(None) => {}
                Err(err) => {
                    let partial = Guard::combine(acquired);
                    if !partial.is_noop() {
                        tracing::warn!(
                            entity_type = %self.entity_type(),
                            stage = %stage,
                            releases = partial.len(),
                            "releasing guards acquired before handler failure"
                        );
                    }
                    if let Err(release) = partial.release() {
                        tracing::error!(
                            entity_type = %self.entity_type(),
                            stage = %stage,
                            error = %release,
                            "guard release failed after handler failure"
                        );
                    }
                    return Err(Self::failed(stage)(err));
                }
            }
        }
        Ok(Guard::combine(acquired))
    }
}

impl<T: Entity> Default for EntityEvents<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Entity> fmt::Debug for EntityEvents<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("EntityEvents");
        s.field("entity_type", &self.entity_type());
        for stage in Stage::ALL {
            let count = self.handler_count(stage);
            if count > 0 {
                s.field(stage.as_str(), &count);
            }
        }
        s.field("cache_controller", &self.cache_controller.is_some())
            .field("bindings", &self.bindings)
            .finish()
    }
}
