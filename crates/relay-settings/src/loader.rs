//! Where settings come from and how the layers combine.
//!
//! A user file only needs the keys it changes. It is overlaid onto the
//! serialized defaults before deserializing, so nested sections keep their
//! untouched fields. `RELAY_*` variables are applied last, then the result
//! is validated.

use std::io;
use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::debug;

use crate::errors::{Result, SettingsError};
use crate::types::RelaySettings;

/// `$HOME/.relay/settings.json`, or under the temp dir when `HOME` is unset.
pub fn settings_path() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(std::env::temp_dir)
        .join(".relay")
        .join("settings.json")
}

pub fn load_settings() -> Result<RelaySettings> {
    load_settings_from_path(&settings_path())
}

/// Defaults, overlaid with `path` when it exists, then env overrides.
pub fn load_settings_from_path(path: &Path) -> Result<RelaySettings> {
    let mut merged = serde_json::to_value(RelaySettings::default())?;
    if let Some(user) = read_user_file(path)? {
        merged = deep_merge(merged, user);
    }

    let mut settings: RelaySettings = serde_json::from_value(merged)?;
    apply_env_overrides(&mut settings);
    validate(&settings)?;
    Ok(settings)
}

fn read_user_file(path: &Path) -> Result<Option<Value>> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            debug!(?path, "no settings file, using defaults");
            return Ok(None);
        }
        Err(source) => {
            return Err(SettingsError::Read {
                path: path.to_path_buf(),
                source,
            })
        }
    };
    debug!(?path, "applying settings file");
    serde_json::from_str(&content)
        .map(Some)
        .map_err(|source| SettingsError::Malformed {
            path: path.to_path_buf(),
            source,
        })
}

/// Overlay `source` onto `target`. Objects combine key by key; a `null` in
/// `source` keeps the target value; anything else replaces it wholesale.
pub fn deep_merge(mut target: Value, source: Value) -> Value {
    overlay(&mut target, source);
    target
}

fn overlay(target: &mut Value, source: Value) {
    match (target, source) {
        (Value::Object(into), Value::Object(from)) => {
            for (key, value) in from {
                if value.is_null() {
                    continue;
                }
                match into.get_mut(&key) {
                    Some(slot) => overlay(slot, value),
                    None => {
                        into.insert(key, value);
                    }
                }
            }
        }
        (slot, value) => *slot = value,
    }
}

fn validate(settings: &RelaySettings) -> Result<()> {
    let threshold = settings.rules.match_threshold;
    if !(0.0..=100.0).contains(&threshold) {
        return Err(SettingsError::Rejected {
            field: "rules.matchThreshold",
            reason: format!("must be within 0..=100, got {threshold}"),
        });
    }
    if let Some(catalog) = &settings.rules.catalog {
        if catalog.iter().any(|e| e.id.is_empty()) {
            return Err(SettingsError::Rejected {
                field: "rules.catalog",
                reason: "every entry needs a non-empty id".into(),
            });
        }
    }
    Ok(())
}

/// Apply `RELAY_*` variables. A value that does not parse is logged and
/// the file or default value stays.
pub fn apply_env_overrides(settings: &mut RelaySettings) {
    if let Some(v) = read_env_string("RELAY_HOST") {
        settings.server.host = v;
    }
    if let Some(v) = read_env_parsed("RELAY_PORT", parse_u16) {
        settings.server.port = v;
    }
    if let Some(v) = read_env_string("RELAY_TRACE_DIR") {
        settings.recorder.trace_dir = v;
    }
    if let Some(v) = read_env_string("RELAY_REPORT_DIR") {
        settings.recorder.report_dir = v;
    }
    if let Some(v) = read_env_parsed("RELAY_RECORDING", parse_bool) {
        settings.recorder.enabled = v;
    }
    if let Some(v) = read_env_parsed("RELAY_MATCH_THRESHOLD", parse_threshold) {
        settings.rules.match_threshold = v;
    }
    if let Some(v) = read_env_string("RELAY_CARD_BASE_URL") {
        settings.rules.card_base_url = v;
    }
    if let Some(v) = read_env_string("RELAY_LOG_LEVEL") {
        settings.logging.level = v;
    }
    if let Some(v) = read_env_parsed("RELAY_LOG_JSON", parse_bool) {
        settings.logging.json = v;
    }
}

// ── value parsers ───────────────────────────────────────────────────────────

/// Accepts (case-insensitive): `true`/`1`/`yes`/`on` or `false`/`0`/`no`/`off`.
pub fn parse_bool(val: &str) -> Option<bool> {
    match val.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

pub fn parse_u16(val: &str) -> Option<u16> {
    val.parse().ok()
}

/// A similarity threshold in `0..=100`.
pub fn parse_threshold(val: &str) -> Option<f64> {
    let n: f64 = val.parse().ok()?;
    (0.0..=100.0).contains(&n).then_some(n)
}

// ── env access ──────────────────────────────────────────────────────────────

fn read_env_string(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

fn read_env_parsed<T>(name: &str, parse: fn(&str) -> Option<T>) -> Option<T> {
    let val = std::env::var(name).ok()?;
    let result = parse(&val);
    if result.is_none() {
        tracing::warn!(key = name, value = %val, "invalid env var, ignoring");
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    // ── deep_merge ──────────────────────────────────────────────────

    #[test]
    fn merge_nested_override() {
        let target = serde_json::json!({"server": {"port": 5001, "host": "0.0.0.0"}});
        let source = serde_json::json!({"server": {"port": 9090}});
        let merged = deep_merge(target, source);
        assert_eq!(merged["server"]["port"], 9090);
        assert_eq!(merged["server"]["host"], "0.0.0.0");
    }

    #[test]
    fn merge_array_replace() {
        let target = serde_json::json!({"catalog": [1, 2, 3]});
        let source = serde_json::json!({"catalog": [4]});
        assert_eq!(deep_merge(target, source)["catalog"], serde_json::json!([4]));
    }

    #[test]
    fn merge_adds_new_keys_and_replaces_scalars_with_objects() {
        let target = serde_json::json!({"a": 1, "b": "x"});
        let source = serde_json::json!({"b": {"nested": true}, "c": [1]});
        assert_eq!(
            deep_merge(target, source),
            serde_json::json!({"a": 1, "b": {"nested": true}, "c": [1]})
        );
    }

    #[test]
    fn merge_null_preserves_target() {
        let target = serde_json::json!({"a": 1});
        let source = serde_json::json!({"a": null});
        assert_eq!(deep_merge(target, source)["a"], 1);
    }

    // ── parsing ─────────────────────────────────────────────────────

    #[test]
    fn bool_parsing() {
        assert_eq!(parse_bool("YES"), Some(true));
        assert_eq!(parse_bool("off"), Some(false));
        assert_eq!(parse_bool("maybe"), None);
    }

    #[test]
    fn threshold_parsing_enforces_range() {
        assert_eq!(parse_threshold("85"), Some(85.0));
        assert_eq!(parse_threshold("0"), Some(0.0));
        assert_eq!(parse_threshold("100.5"), None);
        assert_eq!(parse_threshold("-1"), None);
        assert_eq!(parse_threshold("high"), None);
    }

    #[test]
    fn port_parsing() {
        assert_eq!(parse_u16("5001"), Some(5001));
        assert_eq!(parse_u16("70000"), None);
    }

    // ── load_settings_from_path ─────────────────────────────────────

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings = load_settings_from_path(&dir.path().join("nope.json")).unwrap();
        assert_eq!(settings.recorder, RelaySettings::default().recorder);
        assert_eq!(settings.rules.catalog, None);
    }

    #[test]
    fn file_values_merge_over_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"recorder":{{"traceDir":"/var/relay/trace"}},"rules":{{"matchThreshold":80}}}}"#
        )
        .unwrap();
        let settings = load_settings_from_path(file.path()).unwrap();
        assert_eq!(settings.recorder.trace_dir, "/var/relay/trace");
        assert_eq!(settings.recorder.report_dir, "rpt");
        assert!((settings.rules.match_threshold - 80.0).abs() < f64::EPSILON);
    }

    #[test]
    fn invalid_json_is_an_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{{not json").unwrap();
        let err = load_settings_from_path(file.path()).unwrap_err();
        assert!(matches!(err, SettingsError::Malformed { .. }));
        assert!(err.to_string().contains(&file.path().display().to_string()));
    }

    #[test]
    fn out_of_range_threshold_is_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"rules":{{"matchThreshold":150}}}}"#).unwrap();
        let err = load_settings_from_path(file.path()).unwrap_err();
        assert!(matches!(err, SettingsError::Rejected { field: "rules.matchThreshold", .. }));
    }

    #[test]
    fn catalog_entry_without_id_is_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"rules":{{"catalog":[{{"phrase":"hi","id":""}}]}}}}"#).unwrap();
        let err = load_settings_from_path(file.path()).unwrap_err();
        assert!(matches!(err, SettingsError::Rejected { field: "rules.catalog", .. }));
    }

    #[test]
    fn wrongly_typed_value_is_a_shape_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"server":{{"port":"5001"}}}}"#).unwrap();
        let err = load_settings_from_path(file.path()).unwrap_err();
        assert!(matches!(err, SettingsError::Shape(_)));
    }

    #[test]
    fn unreadable_path_is_a_read_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_settings_from_path(dir.path()).unwrap_err();
        match err {
            SettingsError::Read { path, .. } => assert_eq!(path, dir.path()),
            other => panic!("unexpected error: {other}"),
        }
    }
}
