//! Settings parser for .srvdeck/config.toml

use std::path::{Path, PathBuf};

use super::types::Settings;
use srvdeck_core::prelude::*;

const CONFIG_FILENAME: &str = "config.toml";
const SRVDECK_DIR: &str = ".srvdeck";

const DEFAULT_CONFIG: &str = r#"# Server Deck Configuration

[gateway]
base_url = "http://localhost:8081"
host = "localhost"           # Host shown for every listed server
request_timeout_secs = 30
upload_timeout_secs = 14400  # Whole transfer, body included; 5 GB at ~370 KB/s

[poller]
interval_ms = 5000           # Delay between status checks while starting
start_timeout_secs = 600     # Give up on a start after this long

[upload]
max_archive_bytes = 5368709120   # 5 GB
chunk_size_bytes = 1048576
extraction_poll_interval_ms = 2000
extraction_timeout_secs = 1800
auto_dismiss_ms = 1000       # Close a completed archive upload after this delay

[behavior]
message_clear_ms = 3000      # Transient success messages
"#;

/// Path of the config file under `base_dir`
pub fn config_path(base_dir: &Path) -> PathBuf {
    base_dir.join(SRVDECK_DIR).join(CONFIG_FILENAME)
}

/// Load settings from `.srvdeck/config.toml`
///
/// Returns default settings if the file doesn't exist or can't be parsed.
pub fn load_settings(base_dir: &Path) -> Settings {
    let config_path = config_path(base_dir);

    if !config_path.exists() {
        debug!("No config file at {:?}, using defaults", config_path);
        return Settings::default();
    }

    match std::fs::read_to_string(&config_path) {
        Ok(content) => match toml::from_str(&content) {
            Ok(settings) => {
                debug!("Loaded settings from {:?}", config_path);
                settings
            }
            Err(e) => {
                warn!("Failed to parse {:?}: {}", config_path, e);
                Settings::default()
            }
        },
        Err(e) => {
            warn!("Failed to read {:?}: {}", config_path, e);
            Settings::default()
        }
    }
}

/// Create `.srvdeck/config.toml` with commented defaults.
///
/// An existing file is left untouched. Returns the config file path.
pub fn init_config_dir(base_dir: &Path) -> Result<PathBuf> {
    let dir = base_dir.join(SRVDECK_DIR);

    if !dir.exists() {
        std::fs::create_dir_all(&dir)
            .map_err(|e| Error::config(format!("Failed to create .srvdeck dir: {}", e)))?;
    }

    let config_path = dir.join(CONFIG_FILENAME);
    if !config_path.exists() {
        std::fs::write(&config_path, DEFAULT_CONFIG)
            .map_err(|e| Error::config(format!("Failed to write config.toml: {}", e)))?;
        info!("Created {:?}", config_path);
    }

    Ok(config_path)
}

/// Check that `base_url` is an absolute http(s) URL.
pub fn validate_base_url(base_url: &str) -> Result<()> {
    let url = url::Url::parse(base_url)
        .map_err(|e| Error::config(format!("Invalid base_url '{}': {}", base_url, e)))?;
    match url.scheme() {
        "http" | "https" => Ok(()),
        other => Err(Error::config(format!(
            "Unsupported scheme '{}' in base_url",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;
    use tokio_test::{assert_err, assert_ok};

    #[test]
    fn test_load_settings_defaults() {
        let temp = tempdir().unwrap();
        let settings = load_settings(temp.path());
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn test_load_settings_custom() {
        let temp = tempdir().unwrap();
        let dir = temp.path().join(".srvdeck");
        std::fs::create_dir_all(&dir).unwrap();

        let config = r#"
[gateway]
base_url = "http://deck.internal:9000"
host = "deck.internal"

[upload]
max_archive_bytes = 1024
"#;
        std::fs::write(dir.join("config.toml"), config).unwrap();

        let settings = load_settings(temp.path());
        assert_eq!(settings.gateway.base_url, "http://deck.internal:9000");
        assert_eq!(settings.gateway.host, "deck.internal");
        assert_eq!(settings.upload.max_archive_bytes, 1024);
        assert_eq!(settings.poller.interval_ms, 5000);
    }

    #[test]
    fn test_load_settings_invalid_toml() {
        let temp = tempdir().unwrap();
        let dir = temp.path().join(".srvdeck");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("config.toml"), "[gateway\nbase_url = ").unwrap();

        let settings = load_settings(temp.path());
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn test_init_config_dir_writes_parsable_defaults() {
        let temp = tempdir().unwrap();
        let path = init_config_dir(temp.path()).unwrap();
        assert!(path.exists());

        let parsed: Settings = toml::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(parsed, Settings::default());
    }

    #[test]
    fn test_init_config_dir_keeps_existing_file() {
        let temp = tempdir().unwrap();
        let dir = temp.path().join(".srvdeck");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("config.toml"), "[poller]\ninterval_ms = 1\n").unwrap();

        init_config_dir(temp.path()).unwrap();
        assert_eq!(load_settings(temp.path()).poller.interval_ms, 1);
    }

    #[test]
    fn test_validate_base_url() {
        assert_ok!(validate_base_url("http://localhost:8081"));
        assert_ok!(validate_base_url("https://deck.example.com"));
        assert_err!(validate_base_url("ftp://deck"));
        assert_err!(validate_base_url("localhost:8081"));
    }
}
