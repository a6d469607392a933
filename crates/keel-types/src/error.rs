//! Unified error interface for keel.
//!
//! Every error enum in the workspace implements [`ErrorCode`] so that
//! the storage engine sitting on top of the event pipeline can map
//! failures (configuration defects, missing entities, handler faults)
//! without matching on crate-specific variants.
//!
//! # Example
//!
//! ```
//! use keel_types::ErrorCode;
//!
//! #[derive(Debug)]
//! enum StoreError {
//!     Missing,
//!     Busy,
//! }
//!
//! impl ErrorCode for StoreError {
//!     fn code(&self) -> &'static str {
//!         match self {
//!             Self::Missing => "STORE_MISSING",
//!             Self::Busy => "STORE_BUSY",
//!         }
//!     }
//!
//!     fn is_recoverable(&self) -> bool {
//!         matches!(self, Self::Busy)
//!     }
//! }
//!
//! assert_eq!(StoreError::Busy.code(), "STORE_BUSY");
//! assert!(!StoreError::Missing.is_recoverable());
//! ```

/// Machine-readable classification of an error.
///
/// # Code Format
///
/// - **UPPER_SNAKE_CASE**, e.g. `"KEEL_NOT_FOUND"`
/// - **Prefixed** with the owning domain (`"KEEL_"`, `"CONFIG_"`)
/// - **Stable**: a code is part of the public contract once published
///
/// # Recoverability
///
/// Configuration defects (duplicate bindings, type mismatches) are never
/// recoverable: retrying without changing the startup code yields the same
/// failure. Lookups that found nothing may succeed later and are reported
/// as recoverable.
pub trait ErrorCode {
    /// Returns a machine-readable error code.
    fn code(&self) -> &'static str;

    /// Returns whether retrying or user action may resolve the error.
    fn is_recoverable(&self) -> bool;
}

/// Asserts that an error code is non-empty, prefixed and UPPER_SNAKE_CASE.
///
/// # Panics
///
/// Panics with a descriptive message if any check fails.
///
/// ```
/// use keel_types::{assert_error_code, ErrorCode};
///
/// struct Timeout;
///
/// impl ErrorCode for Timeout {
///     fn code(&self) -> &'static str { "STORE_TIMEOUT" }
///     fn is_recoverable(&self) -> bool { true }
/// }
///
/// assert_error_code(&Timeout, "STORE_");
/// ```
pub fn assert_error_code<E: ErrorCode>(err: &E, expected_prefix: &str) {
    let code = err.code();

    assert!(!code.is_empty(), "Error code must not be empty");
    assert!(
        code.starts_with(expected_prefix),
        "Error code '{}' must start with prefix '{}'",
        code,
        expected_prefix
    );
    assert!(
        is_upper_snake_case(code),
        "Error code '{}' must be UPPER_SNAKE_CASE",
        code
    );
}

/// Runs [`assert_error_code`] over every supplied error.
pub fn assert_error_codes<E: ErrorCode>(errors: &[E], expected_prefix: &str) {
    for err in errors {
        assert_error_code(err, expected_prefix);
    }
}

fn is_upper_snake_case(s: &str) -> bool {
    if s.is_empty() || s.starts_with('_') || s.ends_with('_') || s.contains("__") {
        return false;
    }

    s.chars()
        .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    enum ProbeError {
        Transient,
        Fatal,
    }

    impl ErrorCode for ProbeError {
        fn code(&self) -> &'static str {
            match self {
                Self::Transient => "PROBE_TRANSIENT",
                Self::Fatal => "PROBE_FATAL",
            }
        }

        fn is_recoverable(&self) -> bool {
            matches!(self, Self::Transient)
        }
    }

    #[test]
    fn codes_and_recoverability() {
        assert_eq!(ProbeError::Transient.code(), "PROBE_TRANSIENT");
        assert!(ProbeError::Transient.is_recoverable());
        assert!(!ProbeError::Fatal.is_recoverable());
    }

    #[test]
    fn assert_all_variants() {
        assert_error_codes(&[ProbeError::Transient, ProbeError::Fatal], "PROBE_");
    }

    #[test]
    #[should_panic(expected = "must start with prefix")]
    fn wrong_prefix_panics() {
        assert_error_code(&ProbeError::Fatal, "OTHER_");
    }

    #[test]
    fn snake_case_detection() {
        assert!(is_upper_snake_case("KEEL_NOT_FOUND"));
        assert!(is_upper_snake_case("E2"));
        assert!(!is_upper_snake_case(""));
        assert!(!is_upper_snake_case("keel"));
        assert!(!is_upper_snake_case("_KEEL"));
        assert!(!is_upper_snake_case("KEEL_"));
        assert!(!is_upper_snake_case("KEEL__X"));
    }
}
