//! Runtime transport configuration.

use std::time::Duration;

use classlink_settings::TransportSettings;

use crate::backoff::ReconnectPolicy;

/// Duration-typed configuration consumed by [`crate::LiveSession`].
#[derive(Clone, Debug)]
pub struct TransportConfig {
    /// Interval between heartbeat pings while open. Values below
    /// [`crate::timer::MIN_PERIOD`] are raised to it.
    pub heartbeat_interval: Duration,
    /// Backoff table, ceiling, and attempt bound.
    pub reconnect: ReconnectPolicy,
    /// Bound on a single connection attempt.
    pub connect_timeout: Duration,
    /// Connect on construction.
    pub auto_connect: bool,
    /// Origin the endpoint derives from when the target has no base.
    pub origin: String,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self::from_settings(&TransportSettings::default())
    }
}

impl TransportConfig {
    /// Convert loaded settings.
    pub fn from_settings(settings: &TransportSettings) -> Self {
        Self {
            heartbeat_interval: Duration::from_millis(settings.heartbeat_interval_ms),
            reconnect: ReconnectPolicy::new(
                settings
                    .reconnect_delays_ms
                    .iter()
                    .map(|&ms| Duration::from_millis(ms))
                    .collect(),
                Duration::from_millis(settings.reconnect_ceiling_ms),
                settings.max_reconnect_attempts,
            ),
            connect_timeout: Duration::from_millis(settings.connect_timeout_ms),
            auto_connect: settings.auto_connect,
            origin: settings.origin.clone(),
        }
    }
}
