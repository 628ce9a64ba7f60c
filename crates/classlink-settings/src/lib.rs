//! # classlink-settings
//!
//! Configuration for the live-session client, loaded from three layers
//! (in priority order):
//! 1. **Compiled defaults**: [`ClasslinkSettings::default()`]
//! 2. **User file**: `~/.classlink/settings.json` (deep-merged over defaults)
//! 3. **Environment variables**: `CLASSLINK_*` overrides (highest priority)
//!
//! ```no_run
//! use classlink_settings::load_settings;
//!
//! let settings = load_settings().unwrap_or_default();
//! println!("heartbeat every {}ms", settings.transport.heartbeat_interval_ms);
//! ```

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{
    apply_env_overrides, apply_overrides_with, deep_merge, load_settings,
    load_settings_from_path, settings_path,
};
pub use types::*;
