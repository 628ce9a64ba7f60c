//! Live-session transport settings.

use serde::{Deserialize, Serialize};

use crate::errors::SettingsError;

/// Default heartbeat interval in milliseconds.
pub const DEFAULT_HEARTBEAT_INTERVAL_MS: u64 = 15_000;
/// Default reconnect attempt ceiling.
pub const DEFAULT_MAX_RECONNECT_ATTEMPTS: u32 = 6;
/// Default backoff table in milliseconds, indexed by zero-based attempt.
pub const DEFAULT_RECONNECT_DELAYS_MS: [u64; 5] = [2_000, 5_000, 10_000, 20_000, 40_000];
/// Default delay once the table is exhausted.
pub const DEFAULT_RECONNECT_CEILING_MS: u64 = 60_000;
/// Default per-attempt connect bound.
pub const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 10_000;
/// Shortest accepted per-attempt connect bound.
pub const MIN_CONNECT_TIMEOUT_MS: u64 = 100;
/// Default origin the endpoint is derived from when no base is given.
pub const DEFAULT_ORIGIN: &str = "http://127.0.0.1:8000";

/// Transport tuning knobs.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TransportSettings {
    /// Interval between heartbeat pings while open.
    pub heartbeat_interval_ms: u64,
    /// Unexpected closures tolerated before the session gives up.
    pub max_reconnect_attempts: u32,
    /// Ascending backoff table.
    pub reconnect_delays_ms: Vec<u64>,
    /// Delay used once the attempt index runs past the table.
    pub reconnect_ceiling_ms: u64,
    /// Bound on a single connection attempt.
    pub connect_timeout_ms: u64,
    /// Connect on construction and disconnect on drop.
    pub auto_connect: bool,
    /// Origin (scheme + host) standing in for the hosting page.
    pub origin: String,
}

impl Default for TransportSettings {
    fn default() -> Self {
        Self {
            heartbeat_interval_ms: DEFAULT_HEARTBEAT_INTERVAL_MS,
            max_reconnect_attempts: DEFAULT_MAX_RECONNECT_ATTEMPTS,
            reconnect_delays_ms: DEFAULT_RECONNECT_DELAYS_MS.to_vec(),
            reconnect_ceiling_ms: DEFAULT_RECONNECT_CEILING_MS,
            connect_timeout_ms: DEFAULT_CONNECT_TIMEOUT_MS,
            auto_connect: true,
            origin: DEFAULT_ORIGIN.to_string(),
        }
    }
}

impl TransportSettings {
    /// Reject tables that are empty or not ascending, a ceiling below the
    /// table, zero intervals, and connect bounds too short to ever succeed.
    pub fn validate(&self) -> crate::Result<()> {
        if self.heartbeat_interval_ms == 0 {
            return Err(SettingsError::InvalidValue(
                "heartbeatIntervalMs must be positive".into(),
            ));
        }
        if self.reconnect_delays_ms.is_empty() {
            return Err(SettingsError::InvalidValue(
                "reconnectDelaysMs must not be empty".into(),
            ));
        }
        if self.reconnect_delays_ms.windows(2).any(|w| w[0] > w[1]) {
            return Err(SettingsError::InvalidValue(
                "reconnectDelaysMs must be ascending".into(),
            ));
        }
        if let Some(&last) = self.reconnect_delays_ms.last() {
            if self.reconnect_ceiling_ms < last {
                return Err(SettingsError::InvalidValue(format!(
                    "reconnectCeilingMs ({}) must not be below the last table entry ({last})",
                    self.reconnect_ceiling_ms
                )));
            }
        }
        if self.connect_timeout_ms < MIN_CONNECT_TIMEOUT_MS {
            return Err(SettingsError::InvalidValue(format!(
                "connectTimeoutMs must be at least {MIN_CONNECT_TIMEOUT_MS}"
            )));
        }
        if self.origin.trim().is_empty() {
            return Err(SettingsError::InvalidValue("origin must not be empty".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn default_table() {
        let s = TransportSettings::default();
        assert_eq!(s.reconnect_delays_ms, vec![2_000, 5_000, 10_000, 20_000, 40_000]);
        assert_eq!(s.reconnect_ceiling_ms, 60_000);
        assert!(s.auto_connect);
    }

    #[test]
    fn rejects_empty_table() {
        let s = TransportSettings {
            reconnect_delays_ms: vec![],
            ..TransportSettings::default()
        };
        assert_matches!(s.validate(), Err(SettingsError::InvalidValue(_)));
    }

    #[test]
    fn rejects_descending_table() {
        let s = TransportSettings {
            reconnect_delays_ms: vec![5_000, 2_000],
            ..TransportSettings::default()
        };
        let err = s.validate().unwrap_err();
        assert!(err.to_string().contains("ascending"));
    }

    #[test]
    fn rejects_zero_heartbeat() {
        let s = TransportSettings {
            heartbeat_interval_ms: 0,
            ..TransportSettings::default()
        };
        assert!(s.validate().is_err());
    }

    #[test]
    fn rejects_ceiling_below_table() {
        let s = TransportSettings {
            reconnect_ceiling_ms: 30_000,
            ..TransportSettings::default()
        };
        let err = s.validate().unwrap_err();
        assert!(err.to_string().contains("reconnectCeilingMs"));

        let at_last_entry = TransportSettings {
            reconnect_ceiling_ms: 40_000,
            ..TransportSettings::default()
        };
        assert!(at_last_entry.validate().is_ok());
    }

    #[test]
    fn rejects_short_connect_timeout() {
        for connect_timeout_ms in [0, MIN_CONNECT_TIMEOUT_MS - 1] {
            let s = TransportSettings {
                connect_timeout_ms,
                ..TransportSettings::default()
            };
            assert_matches!(s.validate(), Err(SettingsError::InvalidValue(_)));
        }
    }

    #[test]
    fn deserialize_partial() {
        let s: TransportSettings =
            serde_json::from_str(r#"{"maxReconnectAttempts": 2, "autoConnect": false}"#).unwrap();
        assert_eq!(s.max_reconnect_attempts, 2);
        assert!(!s.auto_connect);
        assert_eq!(s.heartbeat_interval_ms, 15_000);
    }
}
