//! Error types for the entity event pipeline.

use crate::Stage;
use keel_types::{EntityType, ErrorCode, PrimaryKey, PropertyRoute};
use std::error::Error as StdError;
use thiserror::Error;

/// Failure raised inside a registered handler or guard release.
///
/// The pipeline never inspects or suppresses these; they travel to the
/// dispatch caller as [`EventError::Handler`] with their message intact.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct HandlerError {
    message: String,
    #[source]
    source: Option<Box<dyn StdError + Send + Sync>>,
}

impl HandlerError {
    /// Creates an error with a message only.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    /// Creates an error wrapping an underlying cause.
    pub fn with_source(
        message: impl Into<String>,
        source: impl Into<Box<dyn StdError + Send + Sync>>,
    ) -> Self {
        Self {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// The handler-supplied message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// One or more guard releases failed.
///
/// Produced only after every constituent release was attempted.
#[derive(Debug, Error)]
#[error("{} of {attempted} guard releases failed", .failures.len())]
pub struct GuardReleaseError {
    /// Number of releases attempted.
    pub attempted: usize,
    /// Failures in release order.
    pub failures: Vec<HandlerError>,
}

/// Errors surfaced by registries and the dispatcher.
#[derive(Debug, Error)]
pub enum EventError {
    /// A binding for this property route was already registered.
    #[error("binding for {route} is already registered")]
    DuplicateBinding {
        /// The duplicated route.
        route: PropertyRoute,
    },

    /// A single-slot association was filled twice.
    #[error("{entity_type} already has a {slot}")]
    AlreadyRegistered {
        /// Owning entity type.
        entity_type: EntityType,
        /// Slot name (`"alternative_retrieve handler"`, `"cache controller"`).
        slot: &'static str,
    },

    /// A registry for one type received a value of another type.
    #[error("type mismatch: registry for {expected} received {found}")]
    TypeMismatch {
        /// Registry type.
        expected: EntityType,
        /// Type actually supplied.
        found: EntityType,
    },

    /// Unknown stage name.
    #[error("unknown stage: {0}")]
    UnknownStage(String),

    /// No registry is configured for the type (strict dispatch only).
    #[error("no event registry configured for {entity_type}")]
    UnknownEntityType {
        /// Requested type.
        entity_type: EntityType,
    },

    /// Alternative retrieval produced nothing or the caller may not see it.
    #[error("{entity_type} with id {id} not found")]
    NotFound {
        /// Requested type.
        entity_type: EntityType,
        /// Requested id.
        id: PrimaryKey,
    },

    /// A handler failed.
    #[error(transparent)]
    Handler(#[from] HandlerError),

    /// Guard releases failed.
    ///
    /// Produced by `?` on [`Guard::release`](crate::Guard::release) in code
    /// that wraps a bulk operation and returns `EventError`:
    ///
    /// ```
    /// use keel_hook::{EntityEvents, EntityQuery, EventError};
    /// # use keel_types::{Entity, PrimaryKey};
    /// # #[derive(Debug)]
    /// # struct Order;
    /// # impl Entity for Order {
    /// #     fn id(&self) -> Option<&PrimaryKey> { None }
    /// # }
    ///
    /// fn delete_all(events: &EntityEvents<Order>) -> Result<usize, EventError> {
    ///     let guard = events.pre_unsafe_delete(&EntityQuery::all())?;
    ///     let deleted = 0; // bulk delete runs here
    ///     guard.release()?;
    ///     Ok(deleted)
    /// }
    ///
    /// assert_eq!(delete_all(&EntityEvents::new()).unwrap(), 0);
    /// ```
    #[error(transparent)]
    GuardRelease(#[from] GuardReleaseError),
}

impl EventError {
    /// Creates a [`EventError::NotFound`].
    pub fn not_found(entity_type: EntityType, id: PrimaryKey) -> Self {
        Self::NotFound { entity_type, id }
    }

    /// Returns `true` for startup/configuration defects.
    #[must_use]
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::DuplicateBinding { .. }
                | Self::AlreadyRegistered { .. }
                | Self::TypeMismatch { .. }
                | Self::UnknownStage(_)
                | Self::UnknownEntityType { .. }
        )
    }

    /// Records a handler failure with its stage before it propagates.
    pub(crate) fn traced(self, entity_type: EntityType, stage: Stage) -> Self {
        if let Self::Handler(err) = &self {
            tracing::debug!(entity_type = %entity_type, stage = %stage, error = %err, "handler failed");
        }
        self
    }
}

impl ErrorCode for EventError {
    fn code(&self) -> &'static str {
        match self {
            Self::DuplicateBinding { .. } => "KEEL_DUPLICATE_BINDING",
            Self::AlreadyRegistered { .. } => "KEEL_ALREADY_REGISTERED",
            Self::TypeMismatch { .. } => "KEEL_TYPE_MISMATCH",
            Self::UnknownStage(_) => "KEEL_UNKNOWN_STAGE",
            Self::UnknownEntityType { .. } => "KEEL_UNKNOWN_ENTITY_TYPE",
            Self::NotFound { .. } => "KEEL_NOT_FOUND",
            Self::Handler(_) => "KEEL_HANDLER_FAILED",
            Self::GuardRelease(_) => "KEEL_GUARD_RELEASE_FAILED",
        }
    }

    fn is_recoverable(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}
