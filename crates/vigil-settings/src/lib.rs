//! # vigil-settings
//!
//! Configuration management with layered sources for the Vigil agent.
//!
//! Settings are loaded from three layers (in priority order):
//! 1. **Compiled defaults** — [`VigilSettings::default()`]
//! 2. **User file** — `~/.vigil/settings.json` (deep-merged over defaults)
//! 3. **Environment variables** — `VIGIL_*` overrides (highest priority)
//!
//! The core consumes two things from here: the watched session-token key
//! names and the expected protocol version byte. The rest (dispatch pool
//! sizing, logging) tunes the ambient machinery around the core.

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{deep_merge, load_settings, load_settings_from_path, settings_path};
pub use types::{LoggingSettings, ProtocolSettings, RouterSettings, VigilSettings};

use std::sync::OnceLock;

/// Global settings singleton.
///
/// Initialized on first access via [`get_settings`]. The settings are loaded
/// from `~/.vigil/settings.json` with env var overrides, or fall back to
/// compiled defaults if loading fails.
static SETTINGS: OnceLock<VigilSettings> = OnceLock::new();

/// Get the global settings instance.
///
/// On first call, loads settings from `~/.vigil/settings.json` with env var
/// overrides. On subsequent calls, returns the cached value. If loading
/// fails, returns compiled defaults.
pub fn get_settings() -> &'static VigilSettings {
    SETTINGS.get_or_init(|| load_settings().unwrap_or_default())
}

/// Initialize the global settings with a specific value.
///
/// # Errors
///
/// Returns the provided settings back if the global was already initialized.
pub fn init_settings(settings: VigilSettings) -> std::result::Result<(), VigilSettings> {
    SETTINGS.set(settings)
}
