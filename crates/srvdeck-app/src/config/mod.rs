//! Configuration file parsing for Server Deck
//!
//! Supports:
//! - `.srvdeck/config.toml` - Gateway, poller, upload and behavior settings

pub mod settings;
pub mod types;

pub use settings::{config_path, init_config_dir, load_settings, validate_base_url};
pub use types::*;
