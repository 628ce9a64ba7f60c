//! Settings loading with deep merge and environment variable overrides.
//!
//! Loading flow:
//! 1. Start with compiled [`ClasslinkSettings::default()`]
//! 2. If the settings file exists, deep-merge its values over the defaults
//! 3. Apply `CLASSLINK_*` environment overrides
//! 4. Validate
//!
//! Deep merge rules:
//! - Objects are merged recursively (source overrides target per-key)
//! - Arrays and primitives are replaced entirely by source
//! - Null values in source are skipped (preserving target)

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::debug;

use crate::errors::Result;
use crate::types::{ClasslinkSettings, MIN_CONNECT_TIMEOUT_MS};

/// Resolve the path to the settings file (`~/.classlink/settings.json`).
pub fn settings_path() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home).join(".classlink").join("settings.json")
}

/// Load settings from the default path with env var overrides.
pub fn load_settings() -> Result<ClasslinkSettings> {
    load_settings_from_path(&settings_path())
}

/// Load settings from a specific path with env var overrides.
///
/// A missing file yields defaults; invalid JSON is an error.
pub fn load_settings_from_path(path: &Path) -> Result<ClasslinkSettings> {
    let defaults = serde_json::to_value(ClasslinkSettings::default())?;

    let merged = if path.exists() {
        debug!(?path, "loading settings from file");
        let content = std::fs::read_to_string(path)?;
        let user: Value = serde_json::from_str(&content)?;
        deep_merge(defaults, user)
    } else {
        debug!(?path, "settings file not found, using defaults");
        defaults
    };

    let mut settings: ClasslinkSettings = serde_json::from_value(merged)?;
    apply_env_overrides(&mut settings);
    settings.validate()?;
    Ok(settings)
}

/// Recursive deep merge of two JSON values.
pub fn deep_merge(target: Value, source: Value) -> Value {
    match (target, source) {
        (Value::Object(mut target_map), Value::Object(source_map)) => {
            for (key, source_val) in source_map {
                if source_val.is_null() {
                    continue;
                }
                let merged = match target_map.remove(&key) {
                    Some(target_val) => deep_merge(target_val, source_val),
                    None => source_val,
                };
                let _ = target_map.insert(key, merged);
            }
            Value::Object(target_map)
        }
        (_, source) => source,
    }
}

/// Apply process environment overrides.
pub fn apply_env_overrides(settings: &mut ClasslinkSettings) {
    apply_overrides_with(settings, |name| std::env::var(name).ok());
}

/// Apply overrides read through `lookup`.
///
/// Invalid values are ignored with a warning and the file/default value is
/// kept.
pub fn apply_overrides_with<F>(settings: &mut ClasslinkSettings, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    let env = EnvReader { lookup };
    let transport = &mut settings.transport;

    if let Some(v) = env.u64_in("CLASSLINK_HEARTBEAT_INTERVAL_MS", 1_000, 600_000) {
        transport.heartbeat_interval_ms = v;
    }
    if let Some(v) = env.u64_in("CLASSLINK_MAX_RECONNECT_ATTEMPTS", 0, 1_000) {
        // range-checked above
        #[allow(clippy::cast_possible_truncation)]
        let v = v as u32;
        transport.max_reconnect_attempts = v;
    }
    if let Some(v) = env.u64_in("CLASSLINK_RECONNECT_CEILING_MS", 1, 3_600_000) {
        transport.reconnect_ceiling_ms = v;
    }
    if let Some(v) = env.u64_in("CLASSLINK_CONNECT_TIMEOUT_MS", MIN_CONNECT_TIMEOUT_MS, 600_000) {
        transport.connect_timeout_ms = v;
    }
    if let Some(v) = env.bool("CLASSLINK_AUTO_CONNECT") {
        transport.auto_connect = v;
    }
    if let Some(v) = env.string("CLASSLINK_ORIGIN") {
        transport.origin = v;
    }
    if let Some(v) = env.string("CLASSLINK_LOG_LEVEL") {
        settings.logging.level = v;
    }
}

// ── Pure parsing functions ──────────────────────────────────────────────────

/// Parse a string as a boolean.
///
/// Accepts (case-insensitive): `true`/`1`/`yes`/`on` or `false`/`0`/`no`/`off`.
pub fn parse_bool(val: &str) -> Option<bool> {
    match val.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Parse a string as a `u64` within an inclusive range.
pub fn parse_u64_range(val: &str, min: u64, max: u64) -> Option<u64> {
    let n: u64 = val.trim().parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

struct EnvReader<F> {
    lookup: F,
}

impl<F: Fn(&str) -> Option<String>> EnvReader<F> {
    fn string(&self, name: &str) -> Option<String> {
        (self.lookup)(name).filter(|v| !v.is_empty())
    }

    fn bool(&self, name: &str) -> Option<bool> {
        let val = (self.lookup)(name)?;
        let result = parse_bool(&val);
        if result.is_none() {
            tracing::warn!(key = name, value = %val, "invalid boolean env var, ignoring");
        }
        result
    }

    fn u64_in(&self, name: &str, min: u64, max: u64) -> Option<u64> {
        let val = (self.lookup)(name)?;
        let result = parse_u64_range(&val, min, max);
        if result.is_none() {
            tracing::warn!(key = name, value = %val, "invalid integer env var, ignoring");
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::errors::SettingsError;
    use crate::types::TransportSettings;
    use assert_matches::assert_matches;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    // ── deep_merge ──────────────────────────────────────────────────

    #[test]
    fn merge_nested_override() {
        let target = serde_json::json!({"transport": {"autoConnect": true, "origin": "a"}});
        let source = serde_json::json!({"transport": {"origin": "b"}});
        let merged = deep_merge(target, source);
        assert_eq!(merged["transport"]["origin"], "b");
        assert_eq!(merged["transport"]["autoConnect"], true);
    }

    #[test]
    fn merge_array_replaces() {
        let target = serde_json::json!({"d": [1, 2, 3]});
        let source = serde_json::json!({"d": [9]});
        assert_eq!(deep_merge(target, source)["d"], serde_json::json!([9]));
    }

    #[test]
    fn merge_null_preserves_target() {
        let target = serde_json::json!({"a": 1});
        let source = serde_json::json!({"a": null});
        assert_eq!(deep_merge(target, source)["a"], 1);
    }

    #[test]
    fn merge_adds_new_keys() {
        let merged = deep_merge(serde_json::json!({"a": 1}), serde_json::json!({"b": 2}));
        assert_eq!(merged["a"], 1);
        assert_eq!(merged["b"], 2);
    }

    // ── load_settings_from_path ─────────────────────────────────────

    #[test]
    fn missing_file_returns_defaults() {
        let settings = load_settings_from_path(Path::new("/nonexistent/settings.json")).unwrap();
        assert_eq!(settings.transport.max_reconnect_attempts, 6);
    }

    #[test]
    fn partial_file_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(
            &path,
            r#"{"transport": {"heartbeatIntervalMs": 5000, "reconnectDelaysMs": [1000, 3000]}}"#,
        )
        .unwrap();

        let settings = load_settings_from_path(&path).unwrap();
        assert_eq!(settings.transport.heartbeat_interval_ms, 5_000);
        assert_eq!(settings.transport.reconnect_delays_ms, vec![1_000, 3_000]);
        assert_eq!(settings.transport.reconnect_ceiling_ms, 60_000);
    }

    #[test]
    fn invalid_json_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "not json").unwrap();
        assert_matches!(load_settings_from_path(&path), Err(SettingsError::Json(_)));
    }

    #[test]
    fn invalid_table_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{"transport": {"reconnectDelaysMs": []}}"#).unwrap();
        assert_matches!(
            load_settings_from_path(&path),
            Err(SettingsError::InvalidValue(_))
        );
    }

    #[test]
    fn zero_connect_timeout_in_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{"transport": {"connectTimeoutMs": 0}}"#).unwrap();
        let err = load_settings_from_path(&path).unwrap_err();
        assert!(err.to_string().contains("connectTimeoutMs"));
    }

    #[test]
    fn ceiling_below_table_in_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{"transport": {"reconnectCeilingMs": 0}}"#).unwrap();
        assert_matches!(
            load_settings_from_path(&path),
            Err(SettingsError::InvalidValue(_))
        );

        std::fs::write(
            &path,
            r#"{"transport": {"reconnectDelaysMs": [100, 200], "reconnectCeilingMs": 500}}"#,
        )
        .unwrap();
        let settings = load_settings_from_path(&path).unwrap();
        assert_eq!(settings.transport.reconnect_ceiling_ms, 500);
    }

    // ── overrides ───────────────────────────────────────────────────

    #[test]
    fn overrides_apply() {
        let mut settings = ClasslinkSettings::default();
        apply_overrides_with(
            &mut settings,
            lookup_from(&[
                ("CLASSLINK_HEARTBEAT_INTERVAL_MS", "30000"),
                ("CLASSLINK_MAX_RECONNECT_ATTEMPTS", "2"),
                ("CLASSLINK_AUTO_CONNECT", "off"),
                ("CLASSLINK_ORIGIN", "https://school.example"),
                ("CLASSLINK_LOG_LEVEL", "debug"),
            ]),
        );
        assert_eq!(settings.transport.heartbeat_interval_ms, 30_000);
        assert_eq!(settings.transport.max_reconnect_attempts, 2);
        assert!(!settings.transport.auto_connect);
        assert_eq!(settings.transport.origin, "https://school.example");
        assert_eq!(settings.logging.level, "debug");
    }

    #[test]
    fn invalid_overrides_are_ignored() {
        let mut settings = ClasslinkSettings::default();
        apply_overrides_with(
            &mut settings,
            lookup_from(&[
                ("CLASSLINK_HEARTBEAT_INTERVAL_MS", "10"),
                ("CLASSLINK_CONNECT_TIMEOUT_MS", "soon"),
                ("CLASSLINK_AUTO_CONNECT", "maybe"),
                ("CLASSLINK_ORIGIN", ""),
            ]),
        );
        assert_eq!(settings.transport, TransportSettings::default());
    }

    // ── parsing ─────────────────────────────────────────────────────

    #[test]
    fn parse_bool_variants() {
        assert_eq!(parse_bool("YES"), Some(true));
        assert_eq!(parse_bool("0"), Some(false));
        assert_eq!(parse_bool("nah"), None);
    }

    #[test]
    fn parse_u64_bounds() {
        assert_eq!(parse_u64_range("1000", 1000, 2000), Some(1000));
        assert_eq!(parse_u64_range("2001", 1000, 2000), None);
        assert_eq!(parse_u64_range("-1", 0, 10), None);
    }
}
