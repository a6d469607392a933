//! Tracing subscriber setup.
//!
//! Filter precedence: debug mode > `RUST_LOG` > `logging.filter`.

use crate::config::KeelConfig;
use tracing_subscriber::EnvFilter;

/// Directive that forces debug output.
const DEBUG_DIRECTIVE: &str = "debug";

/// Builds the filter for `config`.
#[must_use]
pub fn env_filter(config: &KeelConfig) -> EnvFilter {
    if config.debug {
        EnvFilter::new(DEBUG_DIRECTIVE)
    } else {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(&config.logging.filter))
    }
}

/// Installs a global `fmt` subscriber.
///
/// Returns `false` if a global subscriber was already set; the existing
/// one stays in place.
pub fn init_tracing(config: &KeelConfig) -> bool {
    tracing_subscriber::fmt()
        .with_env_filter(env_filter(config))
        .with_ansi(config.logging.ansi)
        .with_target(false)
        .try_init()
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_mode_forces_debug_filter() {
        let config = KeelConfig {
            debug: true,
            ..KeelConfig::default()
        };
        assert_eq!(env_filter(&config).to_string(), DEBUG_DIRECTIVE);
    }

    #[test]
    fn second_init_is_rejected() {
        let config = KeelConfig::default();
        let _ = init_tracing(&config);
        assert!(!init_tracing(&config));
    }
}
