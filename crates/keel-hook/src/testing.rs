//! Test utilities for the entity event pipeline.
//!
//! Provides [`TestEntity`], a [`CallLog`] recorder for asserting handler
//! order, and [`ReleaseTracker`] for counting guard releases.

use crate::{Guard, HandlerError};
use keel_types::{Entity, PrimaryKey};
use parking_lot::Mutex;
use std::sync::Arc;

/// A small entity with the fields the pipeline tests need.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TestEntity {
    /// Primary key; `None` while new.
    pub id: Option<PrimaryKey>,
    /// Display name.
    pub name: String,
    /// Soft-delete flag.
    pub archived: bool,
    /// Owning tenant.
    pub tenant: u32,
    /// Names of handlers that touched this instance, in order.
    pub touched: Vec<String>,
}

impl TestEntity {
    /// New (unsaved) entity.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Sets the primary key.
    #[must_use]
    pub fn with_id(mut self, id: impl Into<PrimaryKey>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Sets the tenant.
    #[must_use]
    pub fn with_tenant(mut self, tenant: u32) -> Self {
        self.tenant = tenant;
        self
    }

    /// Marks the entity archived.
    #[must_use]
    pub fn archived(mut self) -> Self {
        self.archived = true;
        self
    }
}

impl Entity for TestEntity {
    fn id(&self) -> Option<&PrimaryKey> {
        self.id.as_ref()
    }
}

/// Shared, ordered record of events. Clones share the same log.
#[derive(Debug, Clone, Default)]
pub struct CallLog {
    entries: Arc<Mutex<Vec<String>>>,
}

impl CallLog {
    /// Creates an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an entry.
    pub fn push(&self, entry: impl Into<String>) {
        self.entries.lock().push(entry.into());
    }

    /// Snapshot of all entries.
    #[must_use]
    pub fn entries(&self) -> Vec<String> {
        self.entries.lock().clone()
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Returns `true` if nothing was recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

/// Produces guards that record their label when released.
#[derive(Debug, Clone, Default)]
pub struct ReleaseTracker {
    log: CallLog,
}

impl ReleaseTracker {
    /// Creates a tracker with an empty release log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Guard whose release succeeds.
    pub fn guard(&self, label: &str) -> Guard {
        let log = self.log.clone();
        let label = label.to_string();
        Guard::from_fn(move || log.push(label))
    }

    /// Guard whose release is recorded, then fails.
    pub fn failing_guard(&self, label: &str) -> Guard {
        let log = self.log.clone();
        let label = label.to_string();
        Guard::new(move || {
            let message = format!("release of {label} failed");
            log.push(label);
            Err(HandlerError::new(message))
        })
    }

    /// Released labels in release order.
    #[must_use]
    pub fn released(&self) -> Vec<String> {
        self.log.entries()
    }

    /// Number of releases so far.
    #[must_use]
    pub fn count(&self) -> usize {
        self.log.len()
    }
}
