//! Configuration types.
//!
//! All types implement [`Default`] for compile-time fallback values.

use serde::{Deserialize, Serialize};

/// Main configuration structure.
///
/// This is the unified configuration after merging all layers.
///
/// # Example
///
/// ```
/// use keel_runtime::config::KeelConfig;
///
/// let config = KeelConfig::default();
/// assert!(!config.debug);
/// assert!(!config.schema.require_registry);
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct KeelConfig {
    /// Enable debug mode (forces `debug` logging).
    pub debug: bool,

    /// Logging configuration.
    pub logging: LoggingConfig,

    /// Schema and dispatch configuration.
    pub schema: SchemaConfig,
}

impl KeelConfig {
    /// Creates a new config with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Serializes to TOML string.
    ///
    /// # Errors
    ///
    /// Returns error if serialization fails.
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }

    /// Deserializes from TOML string.
    ///
    /// # Errors
    ///
    /// Returns error if deserialization fails.
    pub fn from_toml(toml_str: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(toml_str)
    }

    /// Merges another config layer into this one.
    ///
    /// Fields of `other` that differ from their defaults win.
    pub fn merge(&mut self, other: &Self) {
        if other.debug {
            self.debug = true;
        }
        self.logging.merge(&other.logging);
        self.schema.merge(&other.schema);
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    pub filter: String,

    /// Colored terminal output.
    pub ansi: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "warn".into(),
            ansi: true,
        }
    }
}

impl LoggingConfig {
    fn merge(&mut self, other: &Self) {
        let default = Self::default();

        if other.filter != default.filter {
            self.filter = other.filter.clone();
        }
        if other.ansi != default.ansi {
            self.ansi = other.ansi;
        }
    }
}

/// Schema and dispatch configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SchemaConfig {
    /// Emit a `trace!` event per dispatched stage.
    pub trace_dispatch: bool,

    /// Treat an entity type without a registry as an error.
    pub require_registry: bool,
}

impl SchemaConfig {
    fn merge(&mut self, other: &Self) {
        if other.trace_dispatch {
            self.trace_dispatch = true;
        }
        if other.require_registry {
            self.require_registry = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_values() {
        let config = KeelConfig::default();
        assert!(!config.debug);
        assert_eq!(config.logging.filter, "warn");
        assert!(config.logging.ansi);
        assert!(!config.schema.trace_dispatch);
        assert!(!config.schema.require_registry);
    }

    #[test]
    fn toml_roundtrip() {
        let mut config = KeelConfig::default();
        config.schema.require_registry = true;
        config.logging.filter = "keel_hook=trace".into();

        let toml = config.to_toml().expect("serializes");
        let parsed = KeelConfig::from_toml(&toml).expect("parses");
        assert_eq!(parsed, config);
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let config = KeelConfig::from_toml(
            r#"
[schema]
trace_dispatch = true
"#,
        )
        .expect("parses");

        assert!(config.schema.trace_dispatch);
        assert!(!config.schema.require_registry);
        assert_eq!(config.logging, LoggingConfig::default());
    }

    #[test]
    fn merge_overrides_non_defaults_only() {
        let mut base = KeelConfig::default();
        base.logging.filter = "info".into();
        base.schema.require_registry = true;

        let mut overlay = KeelConfig::default();
        overlay.debug = true;
        overlay.logging.ansi = false;

        base.merge(&overlay);

        assert!(base.debug);
        assert_eq!(base.logging.filter, "info");
        assert!(!base.logging.ansi);
        assert!(base.schema.require_registry);
    }

    #[test]
    fn wrong_value_type_is_parse_error() {
        assert!(KeelConfig::from_toml("debug = \"sometimes\"").is_err());
    }
}
