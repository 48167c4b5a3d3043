//! Settings types with compiled defaults.

use serde::{Deserialize, Serialize};

/// Root settings object.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RelaySettings {
    pub server: ServerSettings,
    pub recorder: RecorderSettings,
    pub rules: RulesSettings,
    pub logging: LoggingSettings,
}

/// Listener settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerSettings {
    /// Bind address.
    pub host: String,
    /// Listen port (`0` picks a free port).
    pub port: u16,
    /// WebSocket ping interval in seconds.
    pub heartbeat_interval_secs: u64,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5001,
            heartbeat_interval_secs: 30,
        }
    }
}

/// Where session traces and transcripts go.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RecorderSettings {
    /// Record sessions at all.
    pub enabled: bool,
    /// Directory for `<session>.jsonl` traces.
    pub trace_dir: String,
    /// Directory for `<session>.rpt` transcripts.
    pub report_dir: String,
}

impl Default for RecorderSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            trace_dir: "trace".to_string(),
            report_dir: "rpt".to_string(),
        }
    }
}

/// One reference phrase and the question it identifies.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CatalogEntrySettings {
    pub phrase: String,
    pub id: String,
}

/// Response rule tuning.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RulesSettings {
    /// Minimum similarity (0–100) for a fuzzy match.
    pub match_threshold: f64,
    /// Base URL for question cards; the card for `q1` is `<base>/q1.png`.
    pub card_base_url: String,
    /// Replacement reference catalog, in tie-break order. `None` keeps the
    /// built-in catalog.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub catalog: Option<Vec<CatalogEntrySettings>>,
}

impl Default for RulesSettings {
    fn default() -> Self {
        Self {
            match_threshold: 70.0,
            card_base_url: "https://cards.relay.invalid/questions".to_string(),
            catalog: None,
        }
    }
}

/// Log output settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    /// Default level; `RUST_LOG` wins when set.
    pub level: String,
    /// JSON lines instead of text.
    pub json: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let s = RelaySettings::default();
        assert_eq!(s.server.port, 5001);
        assert_eq!(s.server.host, "0.0.0.0");
        assert!(s.recorder.enabled);
        assert_eq!(s.recorder.trace_dir, "trace");
        assert_eq!(s.recorder.report_dir, "rpt");
        assert!((s.rules.match_threshold - 70.0).abs() < f64::EPSILON);
        assert!(s.rules.catalog.is_none());
        assert_eq!(s.logging.level, "info");
    }

    #[test]
    fn camel_case_wire_names() {
        let json = serde_json::to_value(RelaySettings::default()).unwrap();
        assert!(json["server"]["heartbeatIntervalSecs"].is_number());
        assert!(json["recorder"]["traceDir"].is_string());
        assert!(json["rules"]["matchThreshold"].is_number());
        assert!(json["rules"].get("catalog").is_none());
    }

    #[test]
    fn partial_json_fills_defaults() {
        let s: RelaySettings =
            serde_json::from_str(r#"{"rules":{"catalog":[{"phrase":"hello","id":"q9"}]}}"#).unwrap();
        assert_eq!(s.server.port, 5001);
        let catalog = s.rules.catalog.unwrap();
        assert_eq!(catalog[0].id, "q9");
    }
}
