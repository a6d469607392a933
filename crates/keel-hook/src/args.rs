//! Argument carriers passed to handlers.

use serde::{Deserialize, Serialize};

/// Describes a completed save.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavedEventArgs {
    /// The entity was the root of the saved graph (not reached through it).
    pub is_root: bool,
    /// The entity was inserted rather than updated.
    pub was_new: bool,
    /// The entity's own columns changed (not only its relationships).
    pub was_self_modified: bool,
}

/// Mutable carrier for the alternative-retrieve handler.
///
/// The handler fills `entity`; setting `avoid_access_verify` skips the
/// visibility check that otherwise guards the returned entity.
#[derive(Debug)]
pub struct AlternativeRetrieveArgs<T> {
    /// Output slot. Left `None`, retrieval fails with not-found.
    pub entity: Option<T>,
    /// Skip the security fallback. Defaults to `false`.
    pub avoid_access_verify: bool,
}

impl<T> AlternativeRetrieveArgs<T> {
    /// Empty carrier: no entity, verification on.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entity: None,
            avoid_access_verify: false,
        }
    }

    /// Supplies the retrieved entity.
    pub fn set_entity(&mut self, entity: T) {
        self.entity = Some(entity);
    }

    /// Supplies the retrieved entity and opts out of verification.
    pub fn set_trusted_entity(&mut self, entity: T) {
        self.entity = Some(entity);
        self.avoid_access_verify = true;
    }
}

impl<T> Default for AlternativeRetrieveArgs<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retrieve_args_defaults() {
        let args = AlternativeRetrieveArgs::<u32>::new();
        assert!(args.entity.is_none());
        assert!(!args.avoid_access_verify);
    }

    #[test]
    fn trusted_entity_skips_verify() {
        let mut args = AlternativeRetrieveArgs::new();
        args.set_trusted_entity(7_u32);
        assert_eq!(args.entity, Some(7));
        assert!(args.avoid_access_verify);

        let mut plain = AlternativeRetrieveArgs::new();
        plain.set_entity(8_u32);
        assert!(!plain.avoid_access_verify);
    }

    #[test]
    fn saved_args_default_all_false() {
        assert_eq!(
            SavedEventArgs::default(),
            SavedEventArgs {
                is_root: false,
                was_new: false,
                was_self_modified: false
            }
        );
    }
}
