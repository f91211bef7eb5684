use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};

pub const DATA_DIR_VAR: &str = "LUNA_DATA_DIR";
pub const SAVE_DEBOUNCE_VAR: &str = "LUNA_SAVE_DEBOUNCE_MS";
pub const LOG_LEVEL_VAR: &str = "LOG_LEVEL";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub data_dir: PathBuf,
    pub save_debounce: Duration,
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            save_debounce: Duration::from_millis(500),
            log_level: "info".to_string(),
        }
    }
}

impl Config {
    /// Reads the process environment. Call `dotenvy::dotenv()` first to pick
    /// up a `.env` file.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(dir) = lookup(DATA_DIR_VAR).filter(|v| !v.trim().is_empty()) {
            config.data_dir = PathBuf::from(dir);
        }
        if let Some(ms) = lookup(SAVE_DEBOUNCE_VAR) {
            let ms: u64 = ms
                .trim()
                .parse()
                .with_context(|| format!("{SAVE_DEBOUNCE_VAR} must be a whole number of milliseconds, got {ms:?}"))?;
            config.save_debounce = Duration::from_millis(ms);
        }
        if let Some(level) = lookup(LOG_LEVEL_VAR).filter(|v| !v.trim().is_empty()) {
            config.log_level = level.trim().to_ascii_lowercase();
        }

        Ok(config)
    }
}
