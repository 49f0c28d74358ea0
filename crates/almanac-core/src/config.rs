use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use config::Config;
use serde::Deserialize;

use crate::constants::DEFAULT_SAVE_DELAY_MS;
use crate::error::{CoreError, CoreResult};

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub store: StoreSettings,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StoreSettings {
    /// Root directory under which each source gets its own cache directory.
    pub cache_dir: String,
    /// Milliseconds without mutation before a dirty store is written back.
    pub save_delay_ms: u64,
}

impl StoreSettings {
    /// ## Summary
    /// Returns the debounce window as a `Duration`.
    #[must_use]
    pub const fn save_delay(&self) -> Duration {
        Duration::from_millis(self.save_delay_ms)
    }

    /// ## Summary
    /// Returns the cache root as a path.
    #[must_use]
    pub fn cache_root(&self) -> PathBuf {
        PathBuf::from(&self.cache_dir)
    }

    /// ## Summary
    /// Checks the values that cannot be expressed in the deserialized types.
    ///
    /// ## Errors
    /// Returns `CoreError::InvalidSetting` if the cache directory is empty.
    pub fn validate(&self) -> CoreResult<()> {
        if self.cache_dir.trim().is_empty() {
            return Err(CoreError::InvalidSetting {
                key: "store.cache_dir",
                reason: "must not be empty",
            });
        }
        Ok(())
    }
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            cache_dir: "cache".to_string(),
            save_delay_ms: DEFAULT_SAVE_DELAY_MS,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
}

impl Settings {
    /// ## Summary
    /// Loads configuration from `.env` file and environment variables into a `Settings`.
    /// Environment variables take precedence over `almanac.toml` values.
    ///
    /// ## Errors
    /// Returns an error if building the configuration or deserializing it fails.
    pub fn load() -> Result<Self> {
        let settings = Config::builder()
            .set_default("store.cache_dir", "cache")?
            .set_default("store.save_delay_ms", DEFAULT_SAVE_DELAY_MS)?
            .set_default("logging.level", "info")?
            // TOML file
            .add_source(config::File::with_name("almanac.toml").required(false))
            // Env file
            .add_source(
                config::Environment::with_prefix("ALMANAC")
                    .separator("__")
                    .ignore_empty(true)
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize::<Settings>()?;

        settings.store.validate()?;
        tracing::debug!(settings = ?settings, "Configuration loaded");

        Ok(settings)
    }
}

/// ## Summary
/// Loads configuration from environment variables and `.env` file.
///
/// ## Errors
/// Returns an error if loading or deserializing the configuration fails.
pub fn load_config() -> Result<Settings> {
    dotenvy::dotenv().ok();

    Settings::load()
}
