//! Telemetry events recorded for rare-event monitoring.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Rare compound outcome attached to a reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Overlay {
    /// All six lines of 乾 changing.
    #[serde(rename = "用九")]
    UseNine,
    /// All six lines of 坤 changing.
    #[serde(rename = "用六")]
    UseSix,
    /// Any other tag written by a newer producer; counted as neither.
    #[serde(other, rename = "other")]
    Unrecognized,
}

impl Overlay {
    /// Parse the CLI/user spelling: the glyphs or `use-nine` / `use-six`.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim() {
            "用九" | "use-nine" | "use_nine" | "yong-jiu" => Some(Self::UseNine),
            "用六" | "use-six" | "use_six" | "yong-liu" => Some(Self::UseSix),
            _ => None,
        }
    }
}

/// One append-only telemetry record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryEvent {
    /// ISO 8601 UTC timestamp.
    pub timestamp: String,
    /// Rare overlay seen, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub overlay: Option<Overlay>,
    /// Producer-specific fields, preserved verbatim.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl TelemetryEvent {
    /// Event stamped with the current UTC time.
    #[must_use]
    pub fn now(overlay: Option<Overlay>) -> Self {
        Self {
            timestamp: chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
            overlay,
            extra: Map::new(),
        }
    }

    /// Attach an extra field.
    #[must_use]
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }
}
