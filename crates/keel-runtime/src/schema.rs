//! Schema assembly.
//!
//! A [`SchemaBuilder`] collects one [`EntityEvents<T>`] per entity type
//! during startup. [`SchemaBuilder::build`] freezes the result into a
//! [`Schema`]: the registries can no longer be extended, and the schema
//! is `Send + Sync` so it can be shared behind an `Arc`.

use crate::config::SchemaConfig;
use keel_hook::{Dispatcher, EntityEvents, ErasedEvents, EventError, SchemaLookup};
use keel_types::{Entity, EntityType};
use std::collections::HashMap;
use std::fmt;
use tracing::{debug, info};

type Registries = HashMap<EntityType, Box<dyn ErasedEvents>>;

/// Configuration-phase builder.
///
/// # Example
///
/// ```
/// use keel_runtime::SchemaBuilder;
/// use keel_types::{Entity, PrimaryKey};
///
/// #[derive(Debug)]
/// struct Order { touched: bool }
/// impl Entity for Order {
///     fn id(&self) -> Option<&PrimaryKey> { None }
/// }
///
/// let mut builder = SchemaBuilder::new();
/// builder.events::<Order>()?.on_saving(|o| {
///     o.touched = true;
///     Ok(())
/// });
/// let schema = builder.build();
///
/// let mut order = Order { touched: false };
/// schema.dispatcher().saving(&mut order)?;
/// assert!(order.touched);
/// # Ok::<(), keel_hook::EventError>(())
/// ```
#[derive(Default)]
pub struct SchemaBuilder {
    registries: Registries,
    config: SchemaConfig,
}

impl SchemaBuilder {
    /// Creates a builder with default dispatch settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a builder with the given dispatch settings.
    #[must_use]
    pub fn with_config(config: SchemaConfig) -> Self {
        Self {
            registries: HashMap::new(),
            config,
        }
    }

    /// Registry for `T`, created on first use.
    ///
    /// # Errors
    ///
    /// Returns [`EventError::TypeMismatch`] if the slot for `T` holds a
    /// registry of another type.
    pub fn events<T: Entity>(&mut self) -> Result<&mut EntityEvents<T>, EventError> {
        let expected = EntityType::of::<T>();
        let slot = self.registries.entry(expected).or_insert_with(|| {
            debug!(entity_type = %expected, "Created entity registry");
            Box::new(EntityEvents::<T>::new())
        });
        let found = slot.entity_type();
        slot.as_any_mut()
            .downcast_mut::<EntityEvents<T>>()
            .ok_or(EventError::TypeMismatch { expected, found })
    }

    /// Returns `true` if a registry for `T` exists.
    #[must_use]
    pub fn contains<T: Entity>(&self) -> bool {
        self.registries.contains_key(&EntityType::of::<T>())
    }

    /// Freezes the builder.
    #[must_use]
    pub fn build(self) -> Schema {
        info!(
            entity_types = self.registries.len(),
            require_registry = self.config.require_registry,
            trace_dispatch = self.config.trace_dispatch,
            "Schema built"
        );
        Schema {
            registries: self.registries,
            config: self.config,
        }
    }
}

impl fmt::Debug for SchemaBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SchemaBuilder")
            .field("entity_types", &self.registries.len())
            .field("config", &self.config)
            .finish()
    }
}

/// Frozen type → registry map.
pub struct Schema {
    registries: Registries,
    config: SchemaConfig,
}

impl Schema {
    /// Starts a new builder.
    #[must_use]
    pub fn builder() -> SchemaBuilder {
        SchemaBuilder::new()
    }

    /// Dispatcher honoring this schema's `require_registry` and
    /// `trace_dispatch` settings.
    #[must_use]
    pub fn dispatcher(&self) -> Dispatcher<'_> {
        Dispatcher::new(self)
            .strict(self.config.require_registry)
            .trace(self.config.trace_dispatch)
    }

    /// Typed registry for `T`.
    #[must_use]
    pub fn typed<T: Entity>(&self) -> Option<&EntityEvents<T>> {
        self.registries
            .get(&EntityType::of::<T>())
            .and_then(|events| events.as_any().downcast_ref::<EntityEvents<T>>())
    }

    /// Configured entity types, sorted by name.
    #[must_use]
    pub fn entity_types(&self) -> Vec<EntityType> {
        let mut types: Vec<_> = self.registries.keys().copied().collect();
        types.sort_by_key(|t| t.name());
        types
    }

    /// Dispatch settings.
    #[must_use]
    pub fn config(&self) -> &SchemaConfig {
        &self.config
    }

    /// Number of configured entity types.
    #[must_use]
    pub fn len(&self) -> usize {
        self.registries.len()
    }

    /// Returns `true` if no entity type is configured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.registries.is_empty()
    }
}

impl SchemaLookup for Schema {
    fn lookup(&self, entity_type: &EntityType) -> Option<&dyn ErasedEvents> {
        self.registries.get(entity_type).map(|events| events.as_ref())
    }
}

impl fmt::Debug for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Schema")
            .field("entity_types", &self.entity_types())
            .field("config", &self.config)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use keel_hook::testing::{CallLog, TestEntity};
    use keel_hook::Stage;
    use keel_types::PrimaryKey;
    use std::sync::Arc;

    #[derive(Debug, Default)]
    struct Invoice;

    impl Entity for Invoice {
        fn id(&self) -> Option<&PrimaryKey> {
            None
        }
    }

    #[test]
    fn events_reuses_registry_per_type() {
        let mut builder = SchemaBuilder::new();
        builder.events::<TestEntity>().unwrap().on_saving(|_| Ok(()));
        builder.events::<TestEntity>().unwrap().on_saving(|_| Ok(()));
        builder.events::<Invoice>().unwrap();

        let schema = builder.build();
        assert_eq!(schema.len(), 2);
        assert_eq!(
            schema.typed::<TestEntity>().unwrap().handler_count(Stage::Saving),
            2
        );
        assert!(schema.typed::<Invoice>().unwrap().is_empty());
    }

    #[test]
    fn entity_types_sorted_by_name() {
        let mut builder = SchemaBuilder::new();
        builder.events::<TestEntity>().unwrap();
        builder.events::<Invoice>().unwrap();

        let names: Vec<_> = builder
            .build()
            .entity_types()
            .iter()
            .map(|t| t.name())
            .collect();
        assert_eq!(names, ["Invoice", "TestEntity"]);
    }

    #[test]
    fn require_registry_makes_dispatch_strict() {
        let config = SchemaConfig {
            require_registry: true,
            ..SchemaConfig::default()
        };
        let schema = SchemaBuilder::with_config(config).build();
        assert!(schema.dispatcher().is_strict());

        let err = schema.dispatcher().saving(&mut Invoice).unwrap_err();
        assert!(matches!(err, EventError::UnknownEntityType { .. }));
    }

    #[test]
    fn lenient_by_default() {
        let schema = SchemaBuilder::new().build();
        assert!(schema.is_empty());
        assert!(!schema.dispatcher().is_strict());
        schema.dispatcher().saving(&mut Invoice).unwrap();
    }

    #[test]
    fn frozen_schema_shared_across_threads() {
        let log = CallLog::new();
        let mut builder = SchemaBuilder::new();
        {
            let log = log.clone();
            builder.events::<TestEntity>().unwrap().on_retrieved(move |e| {
                log.push(e.name.clone());
                Ok(())
            });
        }
        let schema = Arc::new(builder.build());

        let handles: Vec<_> = (0..4)
            .map(|i| {
                let schema = Arc::clone(&schema);
                std::thread::spawn(move || {
                    let mut entity = TestEntity::new(format!("t{i}"));
                    schema.dispatcher().retrieved(&mut entity).unwrap();
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let mut seen = log.entries();
        seen.sort();
        assert_eq!(seen, ["t0", "t1", "t2", "t3"]);
    }
}
