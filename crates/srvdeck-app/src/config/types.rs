//! Configuration types for Server Deck
//!
//! Defines `Settings` (the contents of `.srvdeck/config.toml`) and its
//! per-section sub-types.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use srvdeck_gateway::GatewayConfig;

/// Application settings (.srvdeck/config.toml)
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct Settings {
    #[serde(default)]
    pub gateway: GatewaySettings,

    #[serde(default)]
    pub poller: PollerSettings,

    #[serde(default)]
    pub upload: UploadSettings,

    #[serde(default)]
    pub behavior: BehaviorSettings,
}

impl Settings {
    /// Connection settings for the HTTP gateway
    pub fn gateway_config(&self) -> GatewayConfig {
        GatewayConfig {
            base_url: self.gateway.base_url.clone(),
            request_timeout: Duration::from_secs(self.gateway.request_timeout_secs),
            upload_timeout: Duration::from_secs(self.gateway.upload_timeout_secs),
            chunk_size: self.upload.chunk_size_bytes,
        }
    }
}

/// Management server connection
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct GatewaySettings {
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Host name shown for every listed server
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Limit on a whole transfer including the streamed body. The default
    /// lets a 5 GB archive through at roughly 370 KB/s.
    #[serde(default = "default_upload_timeout_secs")]
    pub upload_timeout_secs: u64,
}

impl Default for GatewaySettings {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            host: default_host(),
            request_timeout_secs: default_request_timeout_secs(),
            upload_timeout_secs: default_upload_timeout_secs(),
        }
    }
}

fn default_base_url() -> String {
    "http://localhost:8081".to_string()
}

fn default_host() -> String {
    "localhost".to_string()
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_upload_timeout_secs() -> u64 {
    14_400
}

/// Start readiness polling
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct PollerSettings {
    /// Delay between status queries while a server is running but not ready
    #[serde(default = "default_poll_interval_ms")]
    pub interval_ms: u64,

    /// Overall budget for a start, measured from the first status query
    #[serde(default = "default_start_timeout_secs")]
    pub start_timeout_secs: u64,
}

impl PollerSettings {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn budget(&self) -> Duration {
        Duration::from_secs(self.start_timeout_secs)
    }
}

impl Default for PollerSettings {
    fn default() -> Self {
        Self {
            interval_ms: default_poll_interval_ms(),
            start_timeout_secs: default_start_timeout_secs(),
        }
    }
}

fn default_poll_interval_ms() -> u64 {
    5000
}

fn default_start_timeout_secs() -> u64 {
    600
}

/// Archive upload and extraction monitoring
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct UploadSettings {
    #[serde(default = "default_max_archive_bytes")]
    pub max_archive_bytes: u64,

    #[serde(default = "default_chunk_size_bytes")]
    pub chunk_size_bytes: usize,

    #[serde(default = "default_extraction_poll_interval_ms")]
    pub extraction_poll_interval_ms: u64,

    #[serde(default = "default_extraction_timeout_secs")]
    pub extraction_timeout_secs: u64,

    /// Delay before a completed archive session closes itself
    #[serde(default = "default_auto_dismiss_ms")]
    pub auto_dismiss_ms: u64,
}

impl UploadSettings {
    pub fn extraction_interval(&self) -> Duration {
        Duration::from_millis(self.extraction_poll_interval_ms)
    }

    pub fn extraction_budget(&self) -> Duration {
        Duration::from_secs(self.extraction_timeout_secs)
    }

    pub fn auto_dismiss(&self) -> Duration {
        Duration::from_millis(self.auto_dismiss_ms)
    }
}

impl Default for UploadSettings {
    fn default() -> Self {
        Self {
            max_archive_bytes: default_max_archive_bytes(),
            chunk_size_bytes: default_chunk_size_bytes(),
            extraction_poll_interval_ms: default_extraction_poll_interval_ms(),
            extraction_timeout_secs: default_extraction_timeout_secs(),
            auto_dismiss_ms: default_auto_dismiss_ms(),
        }
    }
}

/// 5 GiB
fn default_max_archive_bytes() -> u64 {
    5 * 1024 * 1024 * 1024
}

fn default_chunk_size_bytes() -> usize {
    srvdeck_gateway::DEFAULT_CHUNK_SIZE
}

fn default_extraction_poll_interval_ms() -> u64 {
    2000
}

fn default_extraction_timeout_secs() -> u64 {
    1800
}

fn default_auto_dismiss_ms() -> u64 {
    1000
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct BehaviorSettings {
    /// How long transient success messages stay visible
    #[serde(default = "default_message_clear_ms")]
    pub message_clear_ms: u64,
}

impl BehaviorSettings {
    pub fn message_clear(&self) -> Duration {
        Duration::from_millis(self.message_clear_ms)
    }
}

impl Default for BehaviorSettings {
    fn default() -> Self {
        Self {
            message_clear_ms: default_message_clear_ms(),
        }
    }
}

fn default_message_clear_ms() -> u64 {
    3000
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.gateway.base_url, "http://localhost:8081");
        assert_eq!(settings.poller.interval_ms, 5000);
        assert_eq!(settings.upload.max_archive_bytes, 5_368_709_120);
        assert_eq!(settings.upload.auto_dismiss_ms, 1000);
        assert_eq!(settings.behavior.message_clear_ms, 3000);
    }

    #[test]
    fn test_partial_section_keeps_other_defaults() {
        let settings: Settings = toml::from_str("[poller]\ninterval_ms = 250\n").unwrap();
        assert_eq!(settings.poller.interval_ms, 250);
        assert_eq!(settings.poller.start_timeout_secs, 600);
        assert_eq!(settings.gateway, GatewaySettings::default());
    }

    #[test]
    fn test_gateway_config_conversion() {
        let mut settings = Settings::default();
        settings.gateway.request_timeout_secs = 5;
        settings.upload.chunk_size_bytes = 4096;

        let config = settings.gateway_config();
        assert_eq!(config.request_timeout, Duration::from_secs(5));
        assert_eq!(config.upload_timeout, Duration::from_secs(14_400));
        assert_eq!(config.chunk_size, 4096);
    }

    #[test]
    fn test_upload_timeout_fits_largest_archive_on_slow_link() {
        let settings = Settings::default();
        let half_mib_per_sec = 512 * 1024;
        let needed_secs = settings.upload.max_archive_bytes / half_mib_per_sec;
        assert!(needed_secs <= settings.gateway.upload_timeout_secs);
    }
}
