//! Tracing setup for silo.
//!
//! The crate emits structured events through `tracing`: schema changes
//! (create, open, addcol, delcol, copy) at `info`, row mutations and chunk
//! seals at `debug`, and recoverable filesystem fallbacks at `warn`. These
//! helpers install a subscriber for binaries and tests that want to see
//! them; embedding applications with their own subscriber can skip this
//! module entirely.

#[cfg(feature = "logging")]
use tracing_subscriber::{EnvFilter, fmt};

/// Install a formatting subscriber at the `info` level.
///
/// `RUST_LOG` overrides the level when set.
///
/// ```rust
/// silo_core::logging::init();
/// ```
#[cfg(feature = "logging")]
pub fn init() {
    init_with_level("info")
}

/// Install a formatting subscriber at the given level
/// (trace, debug, info, warn, error). `RUST_LOG` wins when set.
///
/// ```rust
/// silo_core::logging::init_with_level("debug");
/// ```
#[cfg(feature = "logging")]
pub fn init_with_level(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_line_number(true)
        .init();
}

/// Subscriber for tests: debug level, output captured per test. Safe to
/// call from every test; repeat installs are ignored.
#[cfg(feature = "logging")]
pub fn init_test() {
    let _ = fmt()
        .with_env_filter(EnvFilter::new("debug"))
        .with_test_writer()
        .try_init();
}

// No-ops when the logging feature is disabled, so callers need no cfg.
#[cfg(not(feature = "logging"))]
pub fn init() {}

#[cfg(not(feature = "logging"))]
pub fn init_with_level(_level: &str) {}

#[cfg(not(feature = "logging"))]
pub fn init_test() {}
