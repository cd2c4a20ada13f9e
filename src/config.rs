use std::env;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::auth::nonce::DEFAULT_NONCE_LENGTH;
use crate::storage;

pub const DEFAULT_CONFIG_PATH: &str = "config/chat_feed.json";
pub const DEFAULT_DATABASE_PATH: &str = "data/chat.db";
pub const DEFAULT_COLLECTION: &str = "messages";

/// Environment variables that override file settings (a `.env` file works too).
pub const ENV_DATABASE_PATH: &str = "CHAT_FEED_DATABASE";
pub const ENV_DISPLAY_NAME: &str = "CHAT_FEED_NAME";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub database_path: String,
    pub collection: String,
    pub display_name: String,
    /// Stable user id; derived from the display name when absent.
    pub uid: Option<String>,
    pub nonce_length: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_path: DEFAULT_DATABASE_PATH.to_string(),
            collection: DEFAULT_COLLECTION.to_string(),
            display_name: "anonymous".to_string(),
            uid: None,
            nonce_length: DEFAULT_NONCE_LENGTH,
        }
    }
}

impl AppConfig {
    pub fn uid(&self) -> String {
        self.uid
            .clone()
            .unwrap_or_else(|| format!("local:{}", self.display_name))
    }

    pub fn apply_env_overrides(&mut self) {
        if let Ok(path) = env::var(ENV_DATABASE_PATH) {
            log::debug!("{ENV_DATABASE_PATH} overrides database path");
            self.database_path = path;
        }
        if let Ok(name) = env::var(ENV_DISPLAY_NAME) {
            self.display_name = name;
        }
    }
}

/// Reads `path`; a missing or unreadable file yields the defaults.
pub fn load_config<P: AsRef<Path>>(path: P) -> AppConfig {
    let path = path.as_ref();
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(err) => {
            log::info!("No config at {} ({err}); using defaults", path.display());
            return AppConfig::default();
        }
    };
    serde_json::from_str(&content).unwrap_or_else(|err| {
        log::warn!("Ignoring invalid config {}: {err}", path.display());
        AppConfig::default()
    })
}

pub fn save_config<P: AsRef<Path>>(path: P, config: &AppConfig) -> std::io::Result<()> {
    storage::ensure_parent_dir(&path)?;
    fs::write(path, serde_json::to_string_pretty(config)?)
}
