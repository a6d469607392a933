//! Configuration management with layered merging.
//!
//! # Architecture
//!
//! ```text
//! Priority (highest to lowest):
//!
//! ┌─────────────────────────────────────────┐
//! │  1. Environment Variables (KEEL_*)      │  Runtime override
//! ├─────────────────────────────────────────┤
//! │  2. Config File (keel.toml)             │  Deployment settings
//! ├─────────────────────────────────────────┤
//! │  3. Default Values (compile-time)       │  Fallback
//! └─────────────────────────────────────────┘
//! ```
//!
//! # Environment Variables
//!
//! | Variable | Config Field | Type |
//! |----------|--------------|------|
//! | `KEEL_DEBUG` | `debug` | bool |
//! | `KEEL_LOG` | `logging.filter` | String |
//! | `KEEL_TRACE_DISPATCH` | `schema.trace_dispatch` | bool |
//! | `KEEL_REQUIRE_REGISTRY` | `schema.require_registry` | bool |
//!
//! # Example Configuration
//!
//! ```toml
//! # keel.toml
//! debug = false
//!
//! [logging]
//! filter = "warn,keel_hook=debug"
//! ansi = true
//!
//! [schema]
//! trace_dispatch = false
//! require_registry = true
//! ```

mod error;
mod loader;
mod types;

pub use error::ConfigError;
pub use loader::ConfigLoader;
pub use types::{KeelConfig, LoggingConfig, SchemaConfig};

/// Config file name looked up in the base directory.
pub const DEFAULT_CONFIG_FILE: &str = "keel.toml";
