//! Settings type definitions.
//!
//! Field names serialize as camelCase. Every struct carries
//! `#[serde(default)]`, so partial JSON fills missing fields from
//! [`Default`].

mod transport;

pub use transport::*;

use serde::{Deserialize, Serialize};

/// Root settings type.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ClasslinkSettings {
    /// Live-session transport tuning.
    pub transport: TransportSettings,
    /// Logging configuration.
    pub logging: LoggingSettings,
}

impl ClasslinkSettings {
    /// Check constraints serde cannot express.
    pub fn validate(&self) -> crate::Result<()> {
        self.transport.validate()
    }
}

/// Logging configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    /// Default `EnvFilter` directive when `RUST_LOG` is unset.
    pub level: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}
