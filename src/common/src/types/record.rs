use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;

/// Coarse classification driving delivery urgency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Error,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Error => "error",
            Severity::Critical => "critical",
        }
    }

    /// Classifies a message by keyword. The first matching rule wins, so a
    /// message mentioning both "network" and "not found" is a warning.
    pub fn classify(message: &str) -> Self {
        let message = message.to_lowercase();

        if message.contains("network") || message.contains("timeout") {
            Severity::Warning
        } else if message.contains("unauthorized") || message.contains("permission") {
            Severity::Error
        } else if message.contains("not found") {
            Severity::Info
        } else {
            Severity::Critical
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Grouping key for equivalent errors: `<kind>-<message>` with every
/// character outside `[A-Za-z0-9_-]` replaced by `_`.
pub fn fingerprint(kind: &str, message: &str) -> String {
    format!("{kind}-{message}")
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Formats a timestamp the way browsers serialise dates
/// (`2024-05-01T12:00:00.000Z`).
pub fn iso_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// A normalised, immutable error event. Serialises to the wire shape
/// accepted by remote sinks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorRecord {
    pub message: String,
    #[serde(rename = "stack")]
    pub stack_trace: String,
    pub timestamp: String,
    #[serde(rename = "url")]
    pub source_url: String,
    #[serde(rename = "userAgent")]
    pub client_info: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    pub session_id: String,
    pub build_version: String,
    #[serde(rename = "errorType")]
    pub error_kind: String,
    pub severity: Severity,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<Map<String, Value>>,
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
    pub fingerprint: String,
}
