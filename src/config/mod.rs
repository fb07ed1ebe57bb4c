//! Runtime configuration.
//!
//! Values come from defaults, then environment variables (optionally loaded
//! from a `.env` file), then CLI overrides applied through the `with_*`
//! builders.

pub mod tools;

pub use tools::{ToolInfo, ToolKind, TOOLS};

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur during configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// An environment variable has an invalid value.
    #[error("Invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    /// Configuration validation failed.
    #[error("Configuration validation failed: {0}")]
    ValidationFailed(String),

    /// IO error while preparing configured directories.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration shared by the dispatcher and every tool.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Interface the listeners bind to.
    pub host: String,
    /// Root for uploads and the metadata database.
    pub data_dir: PathBuf,
    /// SQLite connection URL. Derived from `data_dir` when unset.
    pub database_url: Option<String>,
    /// How long stored transfer files stay downloadable.
    pub retention: Duration,
    /// Interval of the background expiry sweep.
    pub sweep_interval: Duration,
    /// Emit HSTS alongside the other security headers.
    pub secure_cookies: bool,
    /// Allowed CORS origins. Empty means any origin.
    pub cors_origins: Vec<String>,

    /// OpenAI-compatible endpoint for the proofreading reviewer.
    pub llm_api_base: Option<String>,
    /// Bearer token for the LLM endpoint.
    pub llm_api_key: Option<String>,
    /// Model requested from the LLM endpoint.
    pub llm_model: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            data_dir: PathBuf::from("./data"),
            database_url: None,
            retention: Duration::from_secs(7 * 24 * 60 * 60),
            sweep_interval: Duration::from_secs(3600),
            secure_cookies: false,
            cors_origins: Vec::new(),

            llm_api_base: None,
            llm_api_key: None,
            llm_model: "google/gemini-flash-1.5".to_string(),
        }
    }
}

impl AppConfig {
    /// Creates a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `EFFICEPART_HOST`: Bind address (default: 0.0.0.0)
    /// - `EFFICEPART_DATA_DIR`: Upload and database root (default: ./data)
    /// - `EFFICEPART_DATABASE_URL`: SQLite URL (default: `<data_dir>/efficepart.db`)
    /// - `EFFICEPART_RETENTION_DAYS`: File retention in days (default: 7)
    /// - `EFFICEPART_SWEEP_INTERVAL_SECS`: Expiry sweep interval (default: 3600)
    /// - `EFFICEPART_SECURE_COOKIES`: Enable HSTS (default: false)
    /// - `EFFICEPART_CORS_ORIGINS`: Comma-separated allowed origins
    /// - `LITELLM_API_BASE`, `LITELLM_API_KEY`, `LITELLM_DEFAULT_MODEL`: LLM reviewer
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Ok(val) = std::env::var("EFFICEPART_HOST") {
            config.host = val;
        }

        if let Ok(val) = std::env::var("EFFICEPART_DATA_DIR") {
            config.data_dir = PathBuf::from(val);
        }

        if let Ok(val) = std::env::var("EFFICEPART_DATABASE_URL") {
            if !val.trim().is_empty() {
                config.database_url = Some(val);
            }
        }

        if let Ok(val) = std::env::var("EFFICEPART_RETENTION_DAYS") {
            let days: u64 = parse_env_value(&val, "EFFICEPART_RETENTION_DAYS")?;
            config.retention = retention_from_days(days, "EFFICEPART_RETENTION_DAYS")?;
        }

        if let Ok(val) = std::env::var("EFFICEPART_SWEEP_INTERVAL_SECS") {
            let secs: u64 = parse_env_value(&val, "EFFICEPART_SWEEP_INTERVAL_SECS")?;
            config.sweep_interval = Duration::from_secs(secs);
        }

        if let Ok(val) = std::env::var("EFFICEPART_SECURE_COOKIES") {
            config.secure_cookies = parse_env_bool(&val, "EFFICEPART_SECURE_COOKIES")?;
        }

        if let Ok(val) = std::env::var("EFFICEPART_CORS_ORIGINS") {
            config.cors_origins = val
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }

        config.llm_api_base = std::env::var("LITELLM_API_BASE")
            .ok()
            .filter(|v| !v.is_empty());
        config.llm_api_key = std::env::var("LITELLM_API_KEY")
            .ok()
            .filter(|v| !v.is_empty());
        if let Ok(val) = std::env::var("LITELLM_DEFAULT_MODEL") {
            config.llm_model = val;
        }

        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.retention.is_zero() {
            return Err(ConfigError::ValidationFailed(
                "retention must be greater than 0".to_string(),
            ));
        }

        if self.retention > Duration::from_secs(MAX_RETENTION_DAYS * SECS_PER_DAY) {
            return Err(ConfigError::ValidationFailed(format!(
                "retention must be at most {} days",
                MAX_RETENTION_DAYS
            )));
        }

        if self.sweep_interval.is_zero() {
            return Err(ConfigError::ValidationFailed(
                "sweep_interval must be greater than 0".to_string(),
            ));
        }

        if self.data_dir.as_os_str().is_empty() {
            return Err(ConfigError::ValidationFailed(
                "data_dir cannot be empty".to_string(),
            ));
        }

        if self.llm_model.is_empty() {
            return Err(ConfigError::ValidationFailed(
                "llm_model cannot be empty".to_string(),
            ));
        }

        Ok(())
    }

    /// Effective SQLite URL.
    pub fn database_url(&self) -> String {
        self.database_url.clone().unwrap_or_else(|| {
            format!(
                "sqlite://{}?mode=rwc",
                self.data_dir.join("efficepart.db").display()
            )
        })
    }

    /// Directory holding uploads of the given tool.
    pub fn tool_dir(&self, tool: ToolKind) -> PathBuf {
        self.data_dir.join("uploads").join(tool.info().name)
    }

    /// Whether the proofreading LLM reviewer can be constructed.
    pub fn llm_enabled(&self) -> bool {
        self.llm_api_base.is_some()
    }

    /// Builder method to set the bind host.
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    /// Builder method to set the data directory.
    pub fn with_data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.data_dir = dir.into();
        self
    }

    /// Builder method to set the database URL.
    pub fn with_database_url(mut self, url: impl Into<String>) -> Self {
        self.database_url = Some(url.into());
        self
    }

    /// Builder method to set file retention.
    pub fn with_retention(mut self, retention: Duration) -> Self {
        self.retention = retention;
        self
    }

    /// Builder method to set the sweep interval.
    pub fn with_sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = interval;
        self
    }

    /// Builder method to toggle HSTS.
    pub fn with_secure_cookies(mut self, enabled: bool) -> Self {
        self.secure_cookies = enabled;
        self
    }

    /// Builder method to set the LLM endpoint.
    pub fn with_llm(mut self, api_base: impl Into<String>, api_key: Option<String>) -> Self {
        self.llm_api_base = Some(api_base.into());
        self.llm_api_key = api_key;
        self
    }
}

/// Longest accepted retention period.
pub const MAX_RETENTION_DAYS: u64 = 36_500;

const SECS_PER_DAY: u64 = 24 * 60 * 60;

/// Converts a day count into a retention period, rejecting absurd values.
fn retention_from_days(days: u64, key: &str) -> Result<Duration, ConfigError> {
    if days > MAX_RETENTION_DAYS {
        return Err(ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("{} days exceeds the {} day maximum", days, MAX_RETENTION_DAYS),
        });
    }
    Ok(Duration::from_secs(days * SECS_PER_DAY))
}

/// Parse an environment variable value into a type.
fn parse_env_value<T: std::str::FromStr>(value: &str, key: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        message: format!("could not parse '{}'", value),
    })
}

/// Parse an environment variable as a boolean.
fn parse_env_bool(value: &str, key: &str) -> Result<bool, ConfigError> {
    match value.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("expected boolean value, got '{}'", value),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.retention, Duration::from_secs(604_800));
        assert!(!config.secure_cookies);
        assert!(!config.llm_enabled());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_database_url_derived_from_data_dir() {
        let config = AppConfig::new().with_data_dir("/srv/efficepart");
        assert_eq!(
            config.database_url(),
            "sqlite:///srv/efficepart/efficepart.db?mode=rwc"
        );

        let config = config.with_database_url("sqlite::memory:");
        assert_eq!(config.database_url(), "sqlite::memory:");
    }

    #[test]
    fn test_tool_dir() {
        let config = AppConfig::new().with_data_dir("/tmp/x");
        assert_eq!(
            config.tool_dir(ToolKind::Gigafile),
            PathBuf::from("/tmp/x/uploads/gigafile")
        );
    }

    #[test]
    fn test_retention_days_are_bounded() {
        assert_eq!(
            retention_from_days(7, "EFFICEPART_RETENTION_DAYS").unwrap(),
            Duration::from_secs(604_800)
        );
        assert!(retention_from_days(MAX_RETENTION_DAYS, "EFFICEPART_RETENTION_DAYS").is_ok());

        let err = retention_from_days(u64::MAX, "EFFICEPART_RETENTION_DAYS").unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidValue { ref key, .. } if key == "EFFICEPART_RETENTION_DAYS"
        ));

        let config = AppConfig::default().with_retention(Duration::from_secs(u64::MAX));
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_zero_retention() {
        let config = AppConfig::default().with_retention(Duration::ZERO);
        let result = config.validate();
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("retention"));
    }

    #[test]
    fn test_validation_zero_sweep_interval() {
        let config = AppConfig::default().with_sweep_interval(Duration::ZERO);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_parse_env_bool() {
        assert!(parse_env_bool("yes", "K").unwrap());
        assert!(!parse_env_bool("OFF", "K").unwrap());
        assert!(parse_env_bool("maybe", "K").is_err());
    }

    #[test]
    fn test_parse_env_value() {
        let days: u64 = parse_env_value(" 14 ", "K").unwrap();
        assert_eq!(days, 14);
        let err = parse_env_value::<u64>("abc", "EFFICEPART_RETENTION_DAYS").unwrap_err();
        assert!(err.to_string().contains("EFFICEPART_RETENTION_DAYS"));
    }
}
