//! Integration tests for the entity event pipeline.
//!
//! Tests the complete flow: SchemaBuilder → Schema → Dispatcher → handlers

use keel_auth::{AllowAll, DenyAll, VisibleSet};
use keel_hook::testing::{CallLog, ReleaseTracker};
use keel_hook::{
    CombinedFilter, EntityQuery, EventError, FilterQueryResult, HandlerError, Query,
    SavedEventArgs, UpdateDescriptor,
};
use keel_runtime::config::{ConfigLoader, SchemaConfig};
use keel_runtime::{Schema, SchemaBuilder};
use keel_types::{Entity, EntityType, Expr, PrimaryKey, PropertyRoute};
use std::sync::Arc;

const CURRENT_TENANT: u32 = 7;

#[derive(Debug, Clone, Default, PartialEq)]
struct Order {
    id: Option<PrimaryKey>,
    archived: bool,
    tenant: u32,
    total: i64,
    audit: Vec<String>,
}

impl Entity for Order {
    fn id(&self) -> Option<&PrimaryKey> {
        self.id.as_ref()
    }
}

#[derive(Debug, Default)]
struct Customer;

impl Entity for Customer {
    fn id(&self) -> Option<&PrimaryKey> {
        None
    }
}

fn order(id: i64, tenant: u32) -> Order {
    Order {
        id: Some(PrimaryKey::from(id)),
        tenant,
        ..Order::default()
    }
}

/// H1 ("not archived") registered before H2 ("tenant == current").
fn order_schema_with_filters() -> Schema {
    let mut builder = SchemaBuilder::new();
    builder
        .events::<Order>()
        .expect("order registry")
        .on_filter_query(|| FilterQueryResult::new(!Expr::field("archived"), |o: &Order| !o.archived))
        .on_filter_query(|| {
            FilterQueryResult::new(
                Expr::field("tenant").equals(Expr::param("current")),
                |o: &Order| o.tenant == CURRENT_TENANT,
            )
        });
    builder.build()
}

/// Filters come back in registration order and conjoin as expected
#[test]
fn filter_results_in_registration_order() {
    let schema = order_schema_with_filters();
    let events = schema.typed::<Order>().expect("typed registry");

    let results = events.filter_query();
    assert_eq!(results.len(), 2);
    assert_eq!(results[0].in_database().to_string(), "!archived");
    assert_eq!(results[1].in_database().to_string(), "tenant == @current");

    let combined = CombinedFilter::conjoin(results);
    assert_eq!(
        combined.in_database().to_string(),
        "!archived && tenant == @current"
    );

    let rows = [
        order(1, CURRENT_TENANT),
        Order {
            archived: true,
            ..order(2, CURRENT_TENANT)
        },
        order(3, 1),
    ];
    let visible: Vec<_> = combined.apply(&rows).iter().map(|o| o.id.clone()).collect();
    assert_eq!(visible, [Some(PrimaryKey::from(1))]);

    let erased = schema
        .dispatcher()
        .combined_filter(EntityType::of::<Order>())
        .expect("erased filters");
    assert_eq!(erased, *combined.in_database());
}

/// A then B registered; B rewrites first, A rewrites B's output
#[test]
fn insert_rewrites_apply_in_reverse_registration_order() {
    let log = CallLog::new();
    let mut builder = SchemaBuilder::new();
    {
        let events = builder.events::<Order>().expect("order registry");
        for (name, default) in [("A", "created_by"), ("B", "tenant")] {
            let log = log.clone();
            events.on_pre_unsafe_insert(move |_, ctor, _| {
                log.push(name);
                Ok(Some(ctor.clone().with_field(default, Expr::param(default))))
            });
        }
    }
    let schema = builder.build();

    let original = Expr::construct().with_field("total", Expr::field("staging.total"));
    let rewritten = schema
        .dispatcher()
        .pre_unsafe_insert(
            EntityType::of::<Order>(),
            &Query::new("staging"),
            original,
            EntityQuery::<Order>::all().as_query(),
        )
        .expect("rewrite");

    assert_eq!(log.entries(), ["B", "A"]);
    assert_eq!(
        rewritten.to_string(),
        "new { total = staging.total, tenant = @tenant, created_by = @created_by }"
    );
}

/// Guarded stages run reversed; the composite releases every guard once
#[test]
fn guarded_delete_releases_every_guard_once() {
    let log = CallLog::new();
    let tracker = ReleaseTracker::new();
    let mut builder = SchemaBuilder::new();
    {
        let events = builder.events::<Order>().expect("order registry");
        for name in ["cache", "audit", "lock"] {
            let log = log.clone();
            let tracker = tracker.clone();
            events.on_pre_unsafe_delete(move |_| {
                log.push(name);
                Ok(Some(if name == "audit" {
                    tracker.failing_guard(name)
                } else {
                    tracker.guard(name)
                }))
            });
        }
    }
    let schema = builder.build();

    let guard = schema
        .dispatcher()
        .pre_unsafe_delete(
            EntityType::of::<Order>(),
            EntityQuery::<Order>::all()
                .filter(Expr::field("archived"))
                .as_query(),
        )
        .expect("guards acquired");
    assert_eq!(log.entries(), ["lock", "audit", "cache"]);
    assert_eq!(guard.len(), 3);

    let err = guard.release().expect_err("one release fails");
    assert_eq!(err.attempted, 3);
    assert_eq!(err.failures.len(), 1);
    assert_eq!(err.failures[0].message(), "release of audit failed");

    let mut released = tracker.released();
    released.sort();
    assert_eq!(released, ["audit", "cache", "lock"]);
}

/// A failing update handler still releases guards taken before it
#[test]
fn failed_update_releases_acquired_guards() {
    let tracker = ReleaseTracker::new();
    let mut builder = SchemaBuilder::new();
    {
        let events = builder.events::<Order>().expect("order registry");
        events.on_pre_unsafe_update(|update, _| {
            if update.setters().iter().any(|s| s.name == "tenant") {
                Err(HandlerError::new("tenant is immutable"))
            } else {
                Ok(None)
            }
        });
        let tracker = tracker.clone();
        events.on_pre_unsafe_update(move |_, _| Ok(Some(tracker.guard("suspend-cache"))));
    }
    let schema = builder.build();

    let update = UpdateDescriptor::of::<Order>().set("tenant", Expr::literal(1));
    let err = schema
        .dispatcher()
        .pre_unsafe_update(&update)
        .expect_err("handler rejects update");

    assert!(matches!(err, EventError::Handler(_)));
    assert_eq!(err.to_string(), "tenant is immutable");
    assert_eq!(tracker.released(), ["suspend-cache"]);
}

/// Alternative retrieval outcomes: unset, denied, trusted, verified
#[test]
fn alternative_retrieve_outcomes() {
    let mut builder = SchemaBuilder::new();
    builder
        .events::<Order>()
        .expect("order registry")
        .on_alternative_retrieve(|id, args| {
            match id.as_int() {
                Some(n) if n % 10 == 0 => {}
                Some(n) if n < 0 => args.set_trusted_entity(order(n, CURRENT_TENANT)),
                Some(n) => args.set_entity(order(n, CURRENT_TENANT)),
                None => return Err(HandlerError::new("orders use integer keys")),
            }
            Ok(())
        })
        .expect("single handler");
    let schema = builder.build();
    let dispatcher = schema.dispatcher();
    let ty = EntityType::of::<Order>();

    for id in [0, 10, 20].map(PrimaryKey::from) {
        let err = dispatcher
            .alternative_retrieve(ty, &id, &AllowAll)
            .expect_err("entity never set");
        assert!(matches!(err, EventError::NotFound { id: ref missing, .. } if *missing == id));
    }

    let err = dispatcher
        .alternative_retrieve(ty, &PrimaryKey::from(5), &DenyAll)
        .expect_err("denied");
    assert!(matches!(err, EventError::NotFound { .. }));

    let trusted = dispatcher
        .alternative_retrieve(ty, &PrimaryKey::from(-1), &DenyAll)
        .expect("verification skipped")
        .expect("entity");
    assert_eq!(trusted.id(), Some(&PrimaryKey::from(-1)));

    let visible: VisibleSet = [(ty, 5)].into_iter().collect();
    let verified = dispatcher
        .alternative_retrieve(ty, &PrimaryKey::from(5), &visible)
        .expect("visible")
        .expect("entity");
    assert_eq!(verified.downcast_ref::<Order>().map(|o| o.tenant), Some(CURRENT_TENANT));

    let err = dispatcher
        .alternative_retrieve(ty, &PrimaryKey::from("abc"), &AllowAll)
        .expect_err("handler error");
    assert!(matches!(err, EventError::Handler(_)));

    assert!(dispatcher
        .alternative_retrieve(EntityType::of::<Customer>(), &PrimaryKey::from(1), &AllowAll)
        .expect("no registry")
        .is_none());
}

/// Types and stages without handlers are no-ops
#[test]
fn empty_stages_are_noops() {
    let mut builder = SchemaBuilder::new();
    builder.events::<Order>().expect("order registry");
    let schema = builder.build();
    let dispatcher = schema.dispatcher();

    let mut entity = order(1, CURRENT_TENANT);
    let snapshot = entity.clone();
    let mut modified = false;
    dispatcher
        .pre_saving(&mut entity, &mut modified)
        .expect("pre_saving");
    dispatcher.saving(&mut entity).expect("saving");
    dispatcher
        .saved(&entity, &SavedEventArgs::default())
        .expect("saved");
    dispatcher.retrieved(&mut entity).expect("retrieved");
    assert!(!modified);
    assert_eq!(entity, snapshot);

    let ty = EntityType::of::<Order>();
    assert!(dispatcher.filter_query(ty).expect("filters").is_empty());
    assert!(dispatcher
        .pre_unsafe_delete(ty, &Query::new("Order"))
        .expect("delete")
        .is_noop());
    let ctor = Expr::construct().with_field("total", Expr::literal(0));
    assert_eq!(
        dispatcher
            .pre_unsafe_insert(ty, &Query::new("staging"), ctor.clone(), &Query::new("Order"))
            .expect("insert"),
        ctor
    );
    dispatcher.pre_bulk_insert(ty, true).expect("bulk insert");
}

/// The save pipeline threads the graph-modified flag and saved args
#[test]
fn save_pipeline_through_dispatcher() {
    let log = CallLog::new();
    let mut builder = SchemaBuilder::new();
    {
        let events = builder.events::<Order>().expect("order registry");
        events
            .on_pre_saving(|o, modified| {
                if o.total < 0 {
                    o.total = 0;
                    *modified = true;
                }
                Ok(())
            })
            .on_saving(|o| {
                o.audit.push("saving".into());
                Ok(())
            });
        let log = log.clone();
        events.on_saved(move |o, args| {
            log.push(format!("saved {} new={}", o.total, args.was_new));
            Ok(())
        });
    }
    let schema = builder.build();
    let dispatcher = schema.dispatcher();

    let mut entity = Order {
        total: -5,
        ..Order::default()
    };
    let mut modified = false;
    dispatcher
        .pre_saving(&mut entity, &mut modified)
        .expect("pre_saving");
    dispatcher.saving(&mut entity).expect("saving");
    dispatcher
        .saved(
            &entity,
            &SavedEventArgs {
                is_root: true,
                was_new: entity.is_new(),
                was_self_modified: modified,
            },
        )
        .expect("saved");

    assert!(modified);
    assert_eq!(entity.audit, ["saving"]);
    assert_eq!(log.entries(), ["saved 0 new=true"]);
}

/// Duplicate binding paths fail; distinct paths stay retrievable
#[test]
fn binding_paths_unique_per_type() {
    let mut builder = SchemaBuilder::new();
    {
        let events = builder.events::<Order>().expect("order registry");
        events
            .register_binding(PropertyRoute::member::<Order>("Label"), || {
                Expr::field("number")
            })
            .expect("label");
        events
            .register_binding(
                PropertyRoute::parse::<Order>("Customer.Name").expect("route"),
                || Expr::field("customer.name"),
            )
            .expect("customer name");

        let err = events
            .register_binding(PropertyRoute::member::<Order>("Label"), || {
                Expr::literal("dup")
            })
            .expect_err("duplicate");
        assert!(err.is_configuration());
    }
    let schema = builder.build();
    let dispatcher = schema.dispatcher();

    assert_eq!(
        dispatcher
            .additional_binding(&PropertyRoute::member::<Order>("Label"))
            .expect("lookup"),
        Some(Expr::field("number"))
    );
    assert_eq!(
        dispatcher
            .additional_binding(&PropertyRoute::member::<Order>("Customer").then("Name"))
            .expect("lookup"),
        Some(Expr::field("customer.name"))
    );
}

/// Strict schemas reject unconfigured types; dispatch mismatches are loud
#[test]
fn strict_schema_from_config() {
    let dir = tempfile::TempDir::new().expect("tempdir");
    std::fs::write(
        dir.path().join("keel.toml"),
        "[schema]\nrequire_registry = true\ntrace_dispatch = true\n",
    )
    .expect("write config");

    let config = ConfigLoader::new()
        .with_base_dir(dir.path())
        .skip_env_vars()
        .load()
        .expect("config loads");
    assert_eq!(
        config.schema,
        SchemaConfig {
            require_registry: true,
            trace_dispatch: true,
        }
    );

    let mut builder = SchemaBuilder::with_config(config.schema);
    builder.events::<Order>().expect("order registry");
    let schema = Arc::new(builder.build());

    let err = schema
        .dispatcher()
        .saving(&mut Customer)
        .expect_err("unconfigured type");
    assert!(matches!(err, EventError::UnknownEntityType { .. }));

    schema
        .dispatcher()
        .saving(&mut order(1, CURRENT_TENANT))
        .expect("configured type");
}
