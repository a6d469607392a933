//! Scoped-resource guards returned by pre-operation handlers.
//!
//! A handler attached to a guarded stage (e.g. `PreUnsafeDelete`) may
//! acquire something that must be undone when the bulk operation ends:
//! suspend a cache, open an audit scope, take a lock. It hands back a
//! [`Guard`]; the registry combines all guards of one dispatch into a
//! single composite that the storage engine releases exactly once on
//! every exit path.
//!
//! # Release policy
//!
//! - Constituents are released in the reverse of the order they were
//!   combined.
//! - A failing release never prevents later releases; every constituent
//!   is attempted.
//! - [`Guard::release`] aggregates failures into a [`GuardReleaseError`]
//!   after all attempts. Dropping an unreleased guard performs the same
//!   exhaustive release and reports failures via `tracing::error!`.
//! - If a release panics, the not-yet-released constituents are still
//!   released while the composite unwinds.

use crate::{GuardReleaseError, HandlerError};
use std::fmt;

type ReleaseFn = Box<dyn FnOnce() -> Result<(), HandlerError> + Send>;

enum Inner {
    Noop,
    Single(ReleaseFn),
    Composite(Vec<Guard>),
}

/// A handle whose release runs exactly once.
///
/// # Example
///
/// ```
/// use keel_hook::Guard;
/// use std::sync::{Arc, Mutex};
///
/// let log = Arc::new(Mutex::new(Vec::new()));
/// let guard_for = |name: &'static str| {
///     let log = Arc::clone(&log);
///     Guard::from_fn(move || log.lock().unwrap().push(name))
/// };
///
/// let composite = Guard::combine([guard_for("first"), guard_for("second")]);
/// composite.release().unwrap();
///
/// assert_eq!(*log.lock().unwrap(), ["second", "first"]);
/// ```
#[must_use = "dropping a guard releases it immediately"]
pub struct Guard {
    inner: Inner,
}

impl Guard {
    /// A guard that releases nothing.
    pub fn noop() -> Self {
        Self { inner: Inner::Noop }
    }

    /// A guard running a fallible release.
    pub fn new(release: impl FnOnce() -> Result<(), HandlerError> + Send + 'static) -> Self {
        Self {
            inner: Inner::Single(Box::new(release)),
        }
    }

    /// A guard running an infallible release.
    pub fn from_fn(release: impl FnOnce() + Send + 'static) -> Self {
        Self::new(move || {
            release();
            Ok(())
        })
    }

    /// Combines guards into one, preserving order.
    ///
    /// No-op inputs are dropped and nested composites are flattened, so the
    /// composite of zero guards is itself a no-op and a single guard is
    /// returned as is.
    pub fn combine(guards: impl IntoIterator<Item = Guard>) -> Self {
        let mut flat = Vec::new();
        for mut guard in guards {
            match std::mem::replace(&mut guard.inner, Inner::Noop) {
                Inner::Noop => {}
                Inner::Composite(children) => flat.extend(children),
                single @ Inner::Single(_) => flat.push(Guard { inner: single }),
            }
        }

        match flat.len() {
            0 => Self::noop(),
            1 => flat.remove(0),
            _ => Self {
                inner: Inner::Composite(flat),
            },
        }
    }

    /// Returns `true` if releasing does nothing.
    #[must_use]
    pub fn is_noop(&self) -> bool {
        matches!(self.inner, Inner::Noop)
    }

    /// Number of individual releases this guard will run.
    #[must_use]
    pub fn len(&self) -> usize {
        match &self.inner {
            Inner::Noop => 0,
            Inner::Single(_) => 1,
            Inner::Composite(children) => children.iter().map(Guard::len).sum(),
        }
    }

    /// Returns `true` if there is nothing to release.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Releases every constituent and reports aggregated failures.
    ///
    /// # Errors
    ///
    /// Returns [`GuardReleaseError`] if at least one release failed. All
    /// releases have been attempted by then.
    pub fn release(mut self) -> Result<(), GuardReleaseError> {
        let mut failures = Vec::new();
        let attempted = self.release_into(&mut failures);
        if failures.is_empty() {
            Ok(())
        } else {
            Err(GuardReleaseError {
                attempted,
                failures,
            })
        }
    }

    fn release_into(&mut self, failures: &mut Vec<HandlerError>) -> usize {
        match std::mem::replace(&mut self.inner, Inner::Noop) {
            Inner::Noop => 0,
            Inner::Single(release) => {
                if let Err(err) = release() {
                    failures.push(err);
                }
                1
            }
            Inner::Composite(mut children) => {
                // Reversed up front so that, if a release panics, the
                // iterator drops the remaining children in release order.
                children.reverse();
                let mut attempted = 0;
                for mut child in children {
                    attempted += child.release_into(failures);
                }
                attempted
            }
        }
    }
}

impl Default for Guard {
    fn default() -> Self {
        Self::noop()
    }
}

impl Drop for Guard {
    fn drop(&mut self) {
        if self.is_noop() {
            return;
        }

        let mut failures = Vec::new();
        let attempted = self.release_into(&mut failures);
        for err in &failures {
            tracing::error!(error = %err, attempted, "guard release failed on drop");
        }
    }
}

impl fmt::Debug for Guard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Guard").field("releases", &self.len()).finish()
    }
}
