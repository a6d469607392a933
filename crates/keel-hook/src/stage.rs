//! Persistence lifecycle stages.
//!
//! Every point of the storage pipeline where registered handlers run.
//! Stages fall into four invocation shapes:
//!
//! - **notify**: every handler, in registration order (bulk insert: reversed)
//! - **guarded**: reversed order, each handler may return a [`Guard`](crate::Guard)
//! - **rewrite**: reversed order, folding a constructor expression
//! - **single**: filter collection and the one alternative-retrieve override

use crate::EventError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// All lifecycle points where handlers can be attached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    // ── Save ─────────────────────────────────────────────────
    /// Before the dirty-graph walk; handlers may modify the graph.
    PreSaving,
    /// Right before an entity is written.
    Saving,
    /// After an entity was written.
    Saved,

    // ── Retrieve ─────────────────────────────────────────────
    /// After an entity was materialised from storage.
    Retrieved,
    /// While building a query: contributes a visibility filter.
    FilterQuery,
    /// Replaces identifier-based lookup (at most one handler).
    AlternativeRetrieve,

    // ── Unsafe bulk operations ───────────────────────────────
    /// Before a set-based delete of main-table rows.
    PreUnsafeDelete,
    /// Before a set-based delete of relationship-table rows.
    #[serde(rename = "pre_unsafe_mlist_delete")]
    PreUnsafeMListDelete,
    /// Before a set-based update.
    PreUnsafeUpdate,
    /// Before a set-based insert; may rewrite the row constructor.
    PreUnsafeInsert,
    /// Before a bulk copy into the main or a relationship table.
    PreBulkInsert,
}

impl Stage {
    /// Every stage, in pipeline order.
    pub const ALL: [Stage; 11] = [
        Self::PreSaving,
        Self::Saving,
        Self::Saved,
        Self::Retrieved,
        Self::FilterQuery,
        Self::AlternativeRetrieve,
        Self::PreUnsafeDelete,
        Self::PreUnsafeMListDelete,
        Self::PreUnsafeUpdate,
        Self::PreUnsafeInsert,
        Self::PreBulkInsert,
    ];

    /// Returns `true` for fire-and-observe stages.
    #[must_use]
    pub fn is_notify(&self) -> bool {
        matches!(
            self,
            Self::PreSaving | Self::Saving | Self::Saved | Self::Retrieved | Self::PreBulkInsert
        )
    }

    /// Returns `true` for stages whose handlers return scoped guards.
    #[must_use]
    pub fn is_guarded(&self) -> bool {
        matches!(
            self,
            Self::PreUnsafeDelete | Self::PreUnsafeMListDelete | Self::PreUnsafeUpdate
        )
    }

    /// Returns `true` if handlers run most-recently-registered first.
    ///
    /// Only the bulk stages reverse, so that a module registered later
    /// wraps the ones registered before it.
    #[must_use]
    pub fn runs_reversed(&self) -> bool {
        self.is_guarded() || matches!(self, Self::PreUnsafeInsert | Self::PreBulkInsert)
    }

    /// Returns `true` if at most one handler may be registered.
    #[must_use]
    pub fn is_single(&self) -> bool {
        matches!(self, Self::AlternativeRetrieve)
    }

    /// Returns the canonical string representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PreSaving => "pre_saving",
            Self::Saving => "saving",
            Self::Saved => "saved",
            Self::Retrieved => "retrieved",
            Self::FilterQuery => "filter_query",
            Self::AlternativeRetrieve => "alternative_retrieve",
            Self::PreUnsafeDelete => "pre_unsafe_delete",
            Self::PreUnsafeMListDelete => "pre_unsafe_mlist_delete",
            Self::PreUnsafeUpdate => "pre_unsafe_update",
            Self::PreUnsafeInsert => "pre_unsafe_insert",
            Self::PreBulkInsert => "pre_bulk_insert",
        }
    }
}

impl FromStr for Stage {
    type Err = EventError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|stage| stage.as_str() == s)
            .ok_or_else(|| EventError::UnknownStage(s.to_string()))
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
