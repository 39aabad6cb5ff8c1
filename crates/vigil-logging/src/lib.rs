//! # vigil-logging
//!
//! Structured logging setup with `tracing` for the Vigil agent.
//!
//! Provides the [`LogLevel`] vocabulary and the subscriber initialisation
//! used at agent startup. Components log through the `tracing` macros;
//! context (connection id, routing key) travels as span/event fields.

#![deny(unsafe_code)]

pub mod types;

pub use types::LogLevel;

/// Initialize the global tracing subscriber with stderr output.
///
/// Call once at application startup. Subsequent calls are no-ops. The
/// `RUST_LOG` env filter takes priority over the configured level; `json`
/// switches to machine-readable line output.
///
/// # Arguments
///
/// * `level` - Minimum log level to display.
/// * `json` - Emit JSON-formatted lines instead of compact human output.
pub fn init_subscriber(level: LogLevel, json: bool) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.to_string()));

    if json {
        let subscriber = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .with_writer(std::io::stderr)
            .json();
        // try_init is a no-op if a subscriber is already set
        let _ = subscriber.try_init();
    } else {
        let subscriber = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .with_writer(std::io::stderr)
            .compact();
        let _ = subscriber.try_init();
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
