//! Tracing and logging setup shared by every slabtrace host process.

/// Tracing configuration (filters, layers).
pub mod tracing;

pub use self::tracing::{DEFAULT_FILTER, init_for_tests, init_with_default_filter};

/// Initialize process-wide observability (tracing/logging).
///
/// This is safe to call multiple times; subsequent calls become no-ops.
pub fn init() {
    self::tracing::init_with_default_filter(DEFAULT_FILTER);
}
