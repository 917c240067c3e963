//! Tracing/logging setup shared by villadmin binaries.
//!
//! Library crates only emit `tracing` events; installing a subscriber is the
//! job of whichever binary owns the process.

/// Initialize process-wide logging with the default `info` filter.
///
/// This is safe to call multiple times; subsequent calls become no-ops.
pub fn init() {
    tracing::init("info");
}

/// Initialize process-wide logging, falling back to `default_filter` when
/// `RUST_LOG` is unset or unparsable.
pub fn init_with_default(default_filter: &str) {
    tracing::init(default_filter);
}

/// Subscriber configuration (filters, formatting).
pub mod tracing;
