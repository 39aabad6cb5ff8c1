//! Settings type definitions.
//!
//! All types use `#[serde(rename_all = "camelCase")]` and implement
//! [`Default`] with production default values. Types marked with
//! `#[serde(default)]` allow partial JSON — missing fields get their
//! default value during deserialization.

use serde::{Deserialize, Serialize};
use vigil_logging::LogLevel;

/// Root settings type for the Vigil agent.
///
/// Loaded from `~/.vigil/settings.json` with defaults applied for missing
/// fields. Environment variables can override specific values.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct VigilSettings {
    /// Settings schema version.
    pub version: String,
    /// Application name.
    pub name: String,
    /// Wire-protocol settings.
    pub protocol: ProtocolSettings,
    /// Response-routing settings.
    pub router: RouterSettings,
    /// Logging configuration.
    pub logging: LoggingSettings,
}

impl Default for VigilSettings {
    fn default() -> Self {
        Self {
            version: "0.1.0".to_string(),
            name: "vigil".to_string(),
            protocol: ProtocolSettings::default(),
            router: RouterSettings::default(),
            logging: LoggingSettings::default(),
        }
    }
}

/// Wire-protocol settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProtocolSettings {
    /// Protocol version byte the agent expects on every frame.
    pub version: u8,
    /// Maximum accepted declared payload length, in bytes.
    pub max_frame_len: u64,
}

impl Default for ProtocolSettings {
    fn default() -> Self {
        Self {
            version: 1,
            max_frame_len: 128 * 1024 * 1024,
        }
    }
}

/// Response-routing settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RouterSettings {
    /// Attribute names captured as session tokens (case-sensitive).
    pub session_token_keys: Vec<String>,
    /// Concurrent handler invocations in the dispatch pool.
    pub dispatch_workers: usize,
    /// Pending work items the dispatch queue holds before dropping.
    pub dispatch_queue_depth: usize,
}

impl Default for RouterSettings {
    fn default() -> Self {
        Self {
            session_token_keys: vec!["host".to_string(), "request".to_string()],
            dispatch_workers: 4,
            dispatch_queue_depth: 256,
        }
    }
}

/// Logging configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    /// Minimum level to emit (`trace`/`debug`/`info`/`warn`/`error`).
    pub level: LogLevel,
    /// Emit JSON-formatted lines instead of human-readable output.
    pub json: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            json: false,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let settings = VigilSettings::default();
        assert_eq!(settings.protocol.version, 1);
        assert_eq!(settings.router.dispatch_workers, 4);
        assert!(settings.router.dispatch_queue_depth > 0);
        assert_eq!(settings.logging.level, LogLevel::Info);
    }

    #[test]
    fn logging_level_deserializes_from_string() {
        let settings: VigilSettings =
            serde_json::from_str(r#"{"logging": {"level": "warn"}}"#).unwrap();
        assert_eq!(settings.logging.level, LogLevel::Warn);
        let json = serde_json::to_value(&settings).unwrap();
        assert_eq!(json["logging"]["level"], "warn");
    }

    #[test]
    fn partial_json_fills_defaults() {
        let settings: VigilSettings =
            serde_json::from_str(r#"{"protocol": {"version": 2}}"#).unwrap();
        assert_eq!(settings.protocol.version, 2);
        // Untouched sections keep their defaults.
        assert_eq!(
            settings.protocol.max_frame_len,
            ProtocolSettings::default().max_frame_len
        );
        assert_eq!(settings.router.dispatch_workers, 4);
    }

    #[test]
    fn field_names_are_camel_case() {
        let json = serde_json::to_value(VigilSettings::default()).unwrap();
        assert!(json["router"].get("sessionTokenKeys").is_some());
        assert!(json["router"].get("dispatchQueueDepth").is_some());
        assert!(json["protocol"].get("maxFrameLen").is_some());
    }

    #[test]
    fn serde_round_trip() {
        let settings = VigilSettings::default();
        let json = serde_json::to_string(&settings).unwrap();
        let back: VigilSettings = serde_json::from_str(&json).unwrap();
        assert_eq!(back.router.session_token_keys, settings.router.session_token_keys);
        assert_eq!(back.protocol.version, settings.protocol.version);
    }
}
