//! Configuration loader with layered merging.
//!
//! # Load Order
//!
//! 1. Default values (compile-time)
//! 2. Config file (explicit path, or `keel.toml` in the base directory)
//! 3. Environment variables (`KEEL_*`)
//!
//! Each layer overrides the previous.

use super::{ConfigError, KeelConfig, DEFAULT_CONFIG_FILE};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Helper macro for parsing boolean environment variables.
macro_rules! parse_env_bool {
    ($field:expr, $var:literal) => {
        if let Ok(val) = std::env::var($var) {
            $field = parse_bool(&val)
                .ok_or_else(|| ConfigError::invalid_env_var($var, "expected bool"))?;
        }
    };
}

/// Configuration loader with builder pattern.
///
/// # Example
///
/// ```no_run
/// use keel_runtime::config::ConfigLoader;
///
/// let config = ConfigLoader::new()
///     .with_base_dir("/srv/app")
///     .skip_env_vars()
///     .load()?;
/// # Ok::<(), keel_runtime::config::ConfigError>(())
/// ```
#[derive(Debug, Clone, Default)]
pub struct ConfigLoader {
    /// Explicit config file path.
    config_path: Option<PathBuf>,

    /// Directory searched for `keel.toml` when no explicit path is set.
    base_dir: Option<PathBuf>,

    /// Skip environment variable loading.
    skip_env: bool,

    /// Skip config file loading.
    skip_file: bool,
}

impl ConfigLoader {
    /// Creates a new loader with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets an explicit config file path.
    #[must_use]
    pub fn with_config_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.config_path = Some(path.into());
        self
    }

    /// Sets the directory searched for `keel.toml`.
    #[must_use]
    pub fn with_base_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.base_dir = Some(path.into());
        self
    }

    /// Skips environment variable loading.
    ///
    /// Useful for testing with deterministic config.
    #[must_use]
    pub fn skip_env_vars(mut self) -> Self {
        self.skip_env = true;
        self
    }

    /// Skips config file loading.
    #[must_use]
    pub fn skip_config_file(mut self) -> Self {
        self.skip_file = true;
        self
    }

    /// The config file this loader would read.
    #[must_use]
    pub fn config_path(&self) -> PathBuf {
        match (&self.config_path, &self.base_dir) {
            (Some(path), _) => path.clone(),
            (None, Some(dir)) => dir.join(DEFAULT_CONFIG_FILE),
            (None, None) => PathBuf::from(DEFAULT_CONFIG_FILE),
        }
    }

    /// Loads and merges configuration from all sources.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the config file exists but cannot be
    /// read or parsed, or an environment variable is malformed.
    /// A missing config file is silently ignored.
    pub fn load(&self) -> Result<KeelConfig, ConfigError> {
        let mut config = KeelConfig::default();

        if !self.skip_file {
            let path = self.config_path();
            if let Some(file_config) = load_file(&path)? {
                debug!(path = %path.display(), "Loaded config file");
                config.merge(&file_config);
            }
        }

        if !self.skip_env {
            apply_env_vars(&mut config)?;
        }

        Ok(config)
    }
}

/// Loads a config file, returning None if it doesn't exist.
fn load_file(path: &Path) -> Result<Option<KeelConfig>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }

    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::read_file(path, e))?;
    let config = KeelConfig::from_toml(&content).map_err(|e| ConfigError::parse_toml(path, e))?;

    Ok(Some(config))
}

/// Applies environment variable overrides.
fn apply_env_vars(config: &mut KeelConfig) -> Result<(), ConfigError> {
    parse_env_bool!(config.debug, "KEEL_DEBUG");
    parse_env_bool!(config.schema.trace_dispatch, "KEEL_TRACE_DISPATCH");
    parse_env_bool!(config.schema.require_registry, "KEEL_REQUIRE_REGISTRY");

    if let Ok(val) = std::env::var("KEEL_LOG") {
        debug!(filter = %val, "Logging filter from KEEL_LOG");
        config.logging.filter = val;
    }

    Ok(())
}

/// Parses a boolean from string.
///
/// Accepts: "true", "false", "1", "0", "yes", "no", "on", "off" (case-insensitive).
fn parse_bool(s: &str) -> Option<bool> {
    match s.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn create_config_file(dir: &Path, content: &str) -> PathBuf {
        let path = dir.join(DEFAULT_CONFIG_FILE);
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn load_defaults_only() {
        let config = ConfigLoader::new()
            .skip_config_file()
            .skip_env_vars()
            .load()
            .unwrap();

        assert_eq!(config, KeelConfig::default());
    }

    #[test]
    fn load_from_base_dir() {
        let temp = TempDir::new().unwrap();
        create_config_file(
            temp.path(),
            r#"
debug = true

[schema]
require_registry = true
"#,
        );

        let config = ConfigLoader::new()
            .with_base_dir(temp.path())
            .skip_env_vars()
            .load()
            .unwrap();

        assert!(config.debug);
        assert!(config.schema.require_registry);
        assert!(!config.schema.trace_dispatch);
    }

    #[test]
    fn explicit_path_wins_over_base_dir() {
        let base = TempDir::new().unwrap();
        let other = TempDir::new().unwrap();
        create_config_file(base.path(), "[logging]\nfilter = \"base\"\n");
        let explicit = other.path().join("custom.toml");
        std::fs::write(&explicit, "[logging]\nfilter = \"explicit\"\n").unwrap();

        let loader = ConfigLoader::new()
            .with_base_dir(base.path())
            .with_config_file(&explicit)
            .skip_env_vars();
        assert_eq!(loader.config_path(), explicit);

        let config = loader.load().unwrap();
        assert_eq!(config.logging.filter, "explicit");
    }

    #[test]
    fn missing_config_file_ok() {
        let config = ConfigLoader::new()
            .with_config_file("/nonexistent/path/keel.toml")
            .skip_env_vars()
            .load()
            .unwrap();

        assert_eq!(config, KeelConfig::default());
    }

    #[test]
    fn malformed_config_file_fails() {
        let temp = TempDir::new().unwrap();
        let path = create_config_file(temp.path(), "[schema\nrequire_registry = yes");

        let err = ConfigLoader::new()
            .with_config_file(&path)
            .skip_env_vars()
            .load()
            .unwrap_err();

        assert!(matches!(err, ConfigError::ParseToml { path: ref p, .. } if *p == path));
    }

    #[test]
    fn parse_bool_values() {
        assert_eq!(parse_bool("true"), Some(true));
        assert_eq!(parse_bool("TRUE"), Some(true));
        assert_eq!(parse_bool("1"), Some(true));
        assert_eq!(parse_bool("yes"), Some(true));
        assert_eq!(parse_bool("on"), Some(true));

        assert_eq!(parse_bool("false"), Some(false));
        assert_eq!(parse_bool("0"), Some(false));
        assert_eq!(parse_bool("no"), Some(false));
        assert_eq!(parse_bool("off"), Some(false));

        assert_eq!(parse_bool("invalid"), None);
    }

    #[test]
    fn env_var_override() {
        // Only test in this crate that touches KEEL_* variables.
        std::env::set_var("KEEL_TRACE_DISPATCH", "on");
        std::env::set_var("KEEL_LOG", "keel_hook=trace");

        let config = ConfigLoader::new().skip_config_file().load();

        std::env::remove_var("KEEL_TRACE_DISPATCH");
        std::env::remove_var("KEEL_LOG");

        let config = config.unwrap();
        assert!(config.schema.trace_dispatch);
        assert_eq!(config.logging.filter, "keel_hook=trace");
    }
}
