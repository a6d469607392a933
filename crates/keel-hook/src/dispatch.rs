//! Type-erased dispatch.
//!
//! The storage engine works with `dyn Entity` and [`EntityType`] values,
//! not with concrete types. [`ErasedEvents`] is the object-safe face of an
//! [`EntityEvents<T>`]; [`Dispatcher`] finds the right one through a
//! [`SchemaLookup`] and forwards the call.
//!
//! An entity type without a registry is a no-op for every stage unless the
//! dispatcher is strict, in which case it is an
//! [`EventError::UnknownEntityType`].

use crate::{
    EntityEvents, EntityQuery, EventError, Guard, Query, SavedEventArgs, Stage, UpdateDescriptor,
};
use keel_auth::VisibilityCheck;
use keel_types::{Entity, EntityType, Expr, PrimaryKey, PropertyRoute};
use std::any::Any;
use std::collections::HashMap;
use std::fmt;

/// Object-safe view of an [`EntityEvents<T>`].
///
/// Entity arguments are downcast to `T`; a value of another type yields
/// [`EventError::TypeMismatch`].
pub trait ErasedEvents: Send + Sync {
    /// Entity type served.
    fn entity_type(&self) -> EntityType;

    /// Borrows as [`Any`] to recover the typed registry.
    fn as_any(&self) -> &dyn Any;

    /// Mutably borrows as [`Any`] to extend the typed registry.
    fn as_any_mut(&mut self) -> &mut dyn Any;

    /// Number of handlers registered for `stage`.
    fn handler_count(&self, stage: Stage) -> usize;

    /// See [`EntityEvents::pre_saving`].
    fn pre_saving(&self, entity: &mut dyn Entity, graph_modified: &mut bool)
        -> Result<(), EventError>;

    /// See [`EntityEvents::saving`].
    fn saving(&self, entity: &mut dyn Entity) -> Result<(), EventError>;

    /// See [`EntityEvents::saved`].
    fn saved(&self, entity: &dyn Entity, args: &SavedEventArgs) -> Result<(), EventError>;

    /// See [`EntityEvents::retrieved`].
    fn retrieved(&self, entity: &mut dyn Entity) -> Result<(), EventError>;

    /// Translatable predicates of every filter handler, in order.
    fn filter_expressions(&self) -> Vec<Expr>;

    /// Evaluates every filter's in-memory predicate against `entity`.
    fn filter_in_memory(&self, entity: &dyn Entity) -> Result<bool, EventError>;

    /// See [`EntityEvents::alternative_retrieve`].
    fn alternative_retrieve(
        &self,
        id: &PrimaryKey,
        security: &dyn VisibilityCheck,
    ) -> Result<Option<Box<dyn Entity>>, EventError>;

    /// See [`EntityEvents::pre_unsafe_delete`].
    fn pre_unsafe_delete(&self, query: &Query) -> Result<Guard, EventError>;

    /// See [`EntityEvents::pre_unsafe_mlist_delete`].
    fn pre_unsafe_mlist_delete(
        &self,
        mlist_query: &Query,
        entity_query: &Query,
    ) -> Result<Guard, EventError>;

    /// See [`EntityEvents::pre_unsafe_update`].
    fn pre_unsafe_update(&self, update: &UpdateDescriptor) -> Result<Guard, EventError>;

    /// See [`EntityEvents::pre_unsafe_insert`].
    fn pre_unsafe_insert(
        &self,
        source: &Query,
        constructor: Expr,
        entity_query: &Query,
    ) -> Result<Expr, EventError>;

    /// See [`EntityEvents::pre_bulk_insert`].
    fn pre_bulk_insert(&self, in_mlist: bool) -> Result<(), EventError>;

    /// Returns `true` if a cache controller is set and enabled.
    fn cache_enabled(&self) -> bool;

    /// Cached entity with `id`, if the controller has one.
    fn try_get_cached(&self, id: &PrimaryKey) -> Option<Box<dyn Entity>>;

    /// Expression bound to `route`.
    fn additional_binding(&self, route: &PropertyRoute) -> Option<Expr>;

    /// Every bound route.
    fn binding_routes(&self) -> Vec<PropertyRoute>;
}

fn mismatch<T: Entity>(found: EntityType, stage: Stage) -> EventError {
    let expected = EntityType::of::<T>();
    tracing::error!(
        expected = %expected,
        found = %found,
        stage = %stage,
        "entity routed to the wrong registry"
    );
    EventError::TypeMismatch { expected, found }
}

fn downcast_mut<T: Entity>(entity: &mut dyn Entity, stage: Stage) -> Result<&mut T, EventError> {
    let found = (*entity).entity_type();
    entity
        .downcast_mut::<T>()
        .ok_or_else(|| mismatch::<T>(found, stage))
}

fn downcast_ref<T: Entity>(entity: &dyn Entity, stage: Stage) -> Result<&T, EventError> {
    entity
        .downcast_ref::<T>()
        .ok_or_else(|| mismatch::<T>(entity.entity_type(), stage))
}

impl<T: Entity> ErasedEvents for EntityEvents<T> {
    fn entity_type(&self) -> EntityType {
        EntityType::of::<T>()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn handler_count(&self, stage: Stage) -> usize {
        EntityEvents::handler_count(self, stage)
    }

    fn pre_saving(
        &self,
        entity: &mut dyn Entity,
        graph_modified: &mut bool,
    ) -> Result<(), EventError> {
        let entity = downcast_mut::<T>(entity, Stage::PreSaving)?;
        EntityEvents::pre_saving(self, entity, graph_modified)
    }

    fn saving(&self, entity: &mut dyn Entity) -> Result<(), EventError> {
        EntityEvents::saving(self, downcast_mut::<T>(entity, Stage::Saving)?)
    }

    fn saved(&self, entity: &dyn Entity, args: &SavedEventArgs) -> Result<(), EventError> {
        EntityEvents::saved(self, downcast_ref::<T>(entity, Stage::Saved)?, args)
    }

    fn retrieved(&self, entity: &mut dyn Entity) -> Result<(), EventError> {
        EntityEvents::retrieved(self, downcast_mut::<T>(entity, Stage::Retrieved)?)
    }

    fn filter_expressions(&self) -> Vec<Expr> {
        self.filter_query()
            .into_iter()
            .map(|r| r.in_database().clone())
            .collect()
    }

    fn filter_in_memory(&self, entity: &dyn Entity) -> Result<bool, EventError> {
        let entity = downcast_ref::<T>(entity, Stage::FilterQuery)?;
        Ok(self.filter_query().iter().all(|r| r.matches(entity)))
    }

    fn alternative_retrieve(
        &self,
        id: &PrimaryKey,
        security: &dyn VisibilityCheck,
    ) -> Result<Option<Box<dyn Entity>>, EventError> {
        let found = EntityEvents::alternative_retrieve(self, id, security)?;
        Ok(found.map(|e| Box::new(e) as Box<dyn Entity>))
    }

    fn pre_unsafe_delete(&self, query: &Query) -> Result<Guard, EventError> {
        EntityEvents::pre_unsafe_delete(self, &EntityQuery::wrap(query.clone()))
    }

    fn pre_unsafe_mlist_delete(
        &self,
        mlist_query: &Query,
        entity_query: &Query,
    ) -> Result<Guard, EventError> {
        EntityEvents::pre_unsafe_mlist_delete(
            self,
            mlist_query,
            &EntityQuery::wrap(entity_query.clone()),
        )
    }

    fn pre_unsafe_update(&self, update: &UpdateDescriptor) -> Result<Guard, EventError> {
        if update.entity_type() != EntityType::of::<T>() {
            return Err(mismatch::<T>(update.entity_type(), Stage::PreUnsafeUpdate));
        }
        EntityEvents::pre_unsafe_update(self, update)
    }

    fn pre_unsafe_insert(
        &self,
        source: &Query,
        constructor: Expr,
        entity_query: &Query,
    ) -> Result<Expr, EventError> {
        EntityEvents::pre_unsafe_insert(
            self,
            source,
            constructor,
            &EntityQuery::wrap(entity_query.clone()),
        )
    }

    fn pre_bulk_insert(&self, in_mlist: bool) -> Result<(), EventError> {
        EntityEvents::pre_bulk_insert(self, in_mlist)
    }

    fn cache_enabled(&self) -> bool {
        self.cache_controller().is_some_and(|c| c.enabled())
    }

    fn try_get_cached(&self, id: &PrimaryKey) -> Option<Box<dyn Entity>> {
        let controller = self.cache_controller()?;
        if !controller.enabled() {
            return None;
        }
        controller
            .try_get(id)
            .map(|e| Box::new(e) as Box<dyn Entity>)
    }

    fn additional_binding(&self, route: &PropertyRoute) -> Option<Expr> {
        self.binding_expression(route)
    }

    fn binding_routes(&self) -> Vec<PropertyRoute> {
        self.additional_bindings().routes().cloned().collect()
    }
}

/// Resolves the registry for an entity type.
pub trait SchemaLookup: Send + Sync {
    /// Registry for `entity_type`, if one is configured.
    fn lookup(&self, entity_type: &EntityType) -> Option<&dyn ErasedEvents>;
}

impl SchemaLookup for HashMap<EntityType, Box<dyn ErasedEvents>> {
    fn lookup(&self, entity_type: &EntityType) -> Option<&dyn ErasedEvents> {
        self.get(entity_type).map(|events| events.as_ref())
    }
}

/// Routes type-erased lifecycle calls to the right [`EntityEvents<T>`].
///
/// # Example
///
/// ```
/// use keel_hook::{Dispatcher, EntityEvents, ErasedEvents};
/// use keel_types::{Entity, EntityType, PrimaryKey};
/// use std::collections::HashMap;
///
/// #[derive(Debug, Default)]
/// struct Order { retrieved: bool }
/// impl Entity for Order {
///     fn id(&self) -> Option<&PrimaryKey> { None }
/// }
///
/// let mut events = EntityEvents::<Order>::new();
/// events.on_retrieved(|o| { o.retrieved = true; Ok(()) });
///
/// let mut schema: HashMap<EntityType, Box<dyn ErasedEvents>> = HashMap::new();
/// schema.insert(EntityType::of::<Order>(), Box::new(events));
///
/// let mut order = Order::default();
/// Dispatcher::new(&schema).retrieved(&mut order).unwrap();
/// assert!(order.retrieved);
/// ```
#[derive(Clone, Copy)]
pub struct Dispatcher<'a> {
    schema: &'a dyn SchemaLookup,
    strict: bool,
    trace: bool,
}

impl<'a> Dispatcher<'a> {
    /// Lenient dispatcher over `schema`.
    pub fn new(schema: &'a dyn SchemaLookup) -> Self {
        Self {
            schema,
            strict: false,
            trace: false,
        }
    }

    /// Fails unknown entity types instead of treating them as no-ops.
    #[must_use]
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Emits a `trace!` event for every dispatched stage.
    #[must_use]
    pub fn trace(mut self, trace: bool) -> Self {
        self.trace = trace;
        self
    }

    /// Returns `true` if unknown entity types are errors.
    #[must_use]
    pub fn is_strict(&self) -> bool {
        self.strict
    }

    /// Typed registry for `T`.
    #[must_use]
    pub fn events<T: Entity>(&self) -> Option<&'a EntityEvents<T>> {
        self.schema
            .lookup(&EntityType::of::<T>())
            .and_then(|events| events.as_any().downcast_ref::<EntityEvents<T>>())
    }

    fn resolve(
        &self,
        entity_type: EntityType,
        stage: Stage,
    ) -> Result<Option<&'a dyn ErasedEvents>, EventError> {
        self.lookup(entity_type, stage.as_str())
    }

    fn lookup(
        &self,
        entity_type: EntityType,
        operation: &'static str,
    ) -> Result<Option<&'a dyn ErasedEvents>, EventError> {
        match self.schema.lookup(&entity_type) {
            Some(events) if events.entity_type() != entity_type => {
                let found = events.entity_type();
                tracing::error!(
                    expected = %entity_type,
                    found = %found,
                    operation,
                    "schema returned a registry for another entity type"
                );
                Err(EventError::TypeMismatch {
                    expected: entity_type,
                    found,
                })
            }
            Some(events) => {
                if self.trace {
                    tracing::trace!(entity_type = %entity_type, operation, "dispatch");
                }
                Ok(Some(events))
            }
            None if self.strict => Err(EventError::UnknownEntityType { entity_type }),
            None => {
                if self.trace {
                    tracing::trace!(entity_type = %entity_type, operation, "no registry");
                }
                Ok(None)
            }
        }
    }

    /// Dispatches `PreSaving`.
    pub fn pre_saving(
        &self,
        entity: &mut dyn Entity,
        graph_modified: &mut bool,
    ) -> Result<(), EventError> {
        match self.resolve((*entity).entity_type(), Stage::PreSaving)? {
            Some(events) => events.pre_saving(entity, graph_modified),
            None => Ok(()),
        }
    }

    /// Dispatches `Saving`.
    pub fn saving(&self, entity: &mut dyn Entity) -> Result<(), EventError> {
        match self.resolve((*entity).entity_type(), Stage::Saving)? {
            Some(events) => events.saving(entity),
            None => Ok(()),
        }
    }

    /// Dispatches `Saved`.
    pub fn saved(&self, entity: &dyn Entity, args: &SavedEventArgs) -> Result<(), EventError> {
        match self.resolve(entity.entity_type(), Stage::Saved)? {
            Some(events) => events.saved(entity, args),
            None => Ok(()),
        }
    }

    /// Dispatches `Retrieved`.
    pub fn retrieved(&self, entity: &mut dyn Entity) -> Result<(), EventError> {
        match self.resolve((*entity).entity_type(), Stage::Retrieved)? {
            Some(events) => events.retrieved(entity),
            None => Ok(()),
        }
    }

    /// Translatable filter predicates for `entity_type`, in registration order.
    pub fn filter_query(&self, entity_type: EntityType) -> Result<Vec<Expr>, EventError> {
        Ok(self
            .resolve(entity_type, Stage::FilterQuery)?
            .map(|events| events.filter_expressions())
            .unwrap_or_default())
    }

    /// Conjunction of every filter predicate; `true` when none apply.
    pub fn combined_filter(&self, entity_type: EntityType) -> Result<Expr, EventError> {
        self.filter_query(entity_type).map(Expr::and_all)
    }

    /// Applies every in-memory filter to an already-materialised entity.
    pub fn is_visible_in_memory(&self, entity: &dyn Entity) -> Result<bool, EventError> {
        match self.resolve(entity.entity_type(), Stage::FilterQuery)? {
            Some(events) => events.filter_in_memory(entity),
            None => Ok(true),
        }
    }

    /// Dispatches `AlternativeRetrieve`. `Ok(None)` means "use the default lookup".
    pub fn alternative_retrieve(
        &self,
        entity_type: EntityType,
        id: &PrimaryKey,
        security: &dyn VisibilityCheck,
    ) -> Result<Option<Box<dyn Entity>>, EventError> {
        match self.resolve(entity_type, Stage::AlternativeRetrieve)? {
            Some(events) => events.alternative_retrieve(id, security),
            None => Ok(None),
        }
    }

    /// Dispatches `PreUnsafeDelete`.
    pub fn pre_unsafe_delete(
        &self,
        entity_type: EntityType,
        query: &Query,
    ) -> Result<Guard, EventError> {
        match self.resolve(entity_type, Stage::PreUnsafeDelete)? {
            Some(events) => events.pre_unsafe_delete(query),
            None => Ok(Guard::noop()),
        }
    }

    /// Dispatches `PreUnsafeMListDelete` to the owning entity type.
    pub fn pre_unsafe_mlist_delete(
        &self,
        entity_type: EntityType,
        mlist_query: &Query,
        entity_query: &Query,
    ) -> Result<Guard, EventError> {
        match self.resolve(entity_type, Stage::PreUnsafeMListDelete)? {
            Some(events) => events.pre_unsafe_mlist_delete(mlist_query, entity_query),
            None => Ok(Guard::noop()),
        }
    }

    /// Dispatches `PreUnsafeUpdate` to the updated entity type.
    pub fn pre_unsafe_update(&self, update: &UpdateDescriptor) -> Result<Guard, EventError> {
        match self.resolve(update.entity_type(), Stage::PreUnsafeUpdate)? {
            Some(events) => events.pre_unsafe_update(update),
            None => Ok(Guard::noop()),
        }
    }

    /// Dispatches `PreUnsafeInsert`; returns the final constructor.
    pub fn pre_unsafe_insert(
        &self,
        entity_type: EntityType,
        source: &Query,
        constructor: Expr,
        entity_query: &Query,
    ) -> Result<Expr, EventError> {
        match self.resolve(entity_type, Stage::PreUnsafeInsert)? {
            Some(events) => events.pre_unsafe_insert(source, constructor, entity_query),
            None => Ok(constructor),
        }
    }

    /// Dispatches `PreBulkInsert`.
    pub fn pre_bulk_insert(&self, entity_type: EntityType, in_mlist: bool) -> Result<(), EventError> {
        match self.resolve(entity_type, Stage::PreBulkInsert)? {
            Some(events) => events.pre_bulk_insert(in_mlist),
            None => Ok(()),
        }
    }

    /// Returns `true` if `entity_type` has an enabled cache controller.
    pub fn cache_enabled(&self, entity_type: EntityType) -> Result<bool, EventError> {
        Ok(self
            .lookup(entity_type, "cache_enabled")?
            .is_some_and(|events| events.cache_enabled()))
    }

    /// Cached entity, when the type's controller is enabled and has it.
    pub fn try_get_cached(
        &self,
        entity_type: EntityType,
        id: &PrimaryKey,
    ) -> Result<Option<Box<dyn Entity>>, EventError> {
        Ok(self
            .lookup(entity_type, "try_get_cached")?
            .and_then(|events| events.try_get_cached(id)))
    }

    /// Expression bound to `route`, looked up on the route's root type.
    pub fn additional_binding(&self, route: &PropertyRoute) -> Result<Option<Expr>, EventError> {
        Ok(self
            .lookup(route.root(), "additional_binding")?
            .and_then(|events| events.additional_binding(route)))
    }
}

impl fmt::Debug for Dispatcher<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("strict", &self.strict)
            .field("trace", &self.trace)
            .finish_non_exhaustive()
    }
}
