//! Logging and tracing initialization.
//!
//! The auth core only emits `tracing` events; binaries decide how to render
//! them. Call one of these functions once at startup.
//!
//! The level is controlled by the `RUST_LOG` environment variable:
//!
//! ```bash
//! # Include internal rejection reasons (unknown user vs. bad credential)
//! RUST_LOG=latchkey_core=debug latchkey login alice pw1
//!
//! # Production
//! RUST_LOG=warn latchkey login alice pw1
//! ```
//!
//! Secrets (passwords, refresh tokens, signing keys) are never logged.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize logging with `info` as the default level.
///
/// # Panics
///
/// Panics if a global subscriber is already installed.
pub fn init_logging() {
    init_logging_with_level("info");
}

/// Initialize logging with a specific default level.
///
/// `RUST_LOG` still takes precedence when set.
///
/// # Panics
///
/// Panics if a global subscriber is already installed.
pub fn init_logging_with_level(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

/// Initialize JSON-formatted logging for log aggregation.
///
/// # Panics
///
/// Panics if a global subscriber is already installed.
pub fn init_logging_json() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(std::io::stderr),
        )
        .init();
}
