use ::config::{Config, ConfigError, Environment, File, Map};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

pub const DEFAULT_CONFIG_FILE: &str = "console.toml";
pub const ENV_PREFIX: &str = "CONSOLE";

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("Failed to load settings: {0}")]
    Load(#[from] ConfigError),
    #[error("Invalid settings: {}", .0.join(", "))]
    Invalid(Vec<String>),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsoleConfig {
    pub base_url: String,
    pub request_timeout_secs: u64,
    pub notification_duration_ms: u64,
    pub max_notifications: usize,
    pub confirm_destructive: bool,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8000".to_string(),
            request_timeout_secs: 30,
            notification_duration_ms: 4000,
            max_notifications: 200,
            confirm_destructive: true,
        }
    }
}

impl ConsoleConfig {
    /// Defaults, then the settings file, then `CONSOLE_*` variables.
    ///
    /// An explicit `path` must exist; without one `console.toml` is read if
    /// present.
    pub fn load(path: Option<&Path>) -> Result<Self, SettingsError> {
        Self::load_with_env(path, None)
    }

    /// Same as [`ConsoleConfig::load`] with the environment replaced by `env`.
    pub fn load_with_env(
        path: Option<&Path>,
        env: Option<Map<String, String>>,
    ) -> Result<Self, SettingsError> {
        let defaults = Self::default();
        let (file, required) = match path {
            Some(path) => (path, true),
            None => (Path::new(DEFAULT_CONFIG_FILE), false),
        };
        debug!("Loading settings from {} (required: {})", file.display(), required);

        let settings = Config::builder()
            .set_default("base_url", defaults.base_url)?
            .set_default("request_timeout_secs", defaults.request_timeout_secs as i64)?
            .set_default("notification_duration_ms", defaults.notification_duration_ms as i64)?
            .set_default("max_notifications", defaults.max_notifications as i64)?
            .set_default("confirm_destructive", defaults.confirm_destructive)?
            .add_source(File::from(file).required(required))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .try_parsing(true)
                    .source(env),
            )
            .build()?;

        let config: Self = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        let mut errors = Vec::new();

        let base_url = self.base_url.trim();
        if base_url.is_empty() {
            errors.push("base_url must not be empty".to_string());
        } else if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            errors.push(format!("base_url must be an http(s) URL, got '{}'", base_url));
        }
        if self.request_timeout_secs == 0 {
            errors.push("request_timeout_secs must be > 0".to_string());
        }
        if self.max_notifications == 0 {
            errors.push("max_notifications must be > 0".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(SettingsError::Invalid(errors))
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Zero keeps notifications until dismissed.
    pub fn notification_duration(&self) -> Duration {
        Duration::from_millis(self.notification_duration_ms)
    }
}
