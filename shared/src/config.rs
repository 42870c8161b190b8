//! Client configuration
//!
//! Loads configuration from:
//! 1. Default values
//! 2. Configuration file (config/client.toml, optional)
//! 3. Environment variables (`AJALI__SECTION__KEY`, override)

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;
use url::Url;

use crate::capabilities::MAX_TIMEOUT;
use crate::{AppError, ErrorKind};

pub const ENV_PREFIX: &str = "AJALI";
pub const DEFAULT_CONFIG_FILE: &str = "config/client";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

impl From<ConfigError> for AppError {
    fn from(e: ConfigError) -> Self {
        AppError::new(ErrorKind::Configuration, "The app is misconfigured")
            .with_internal(e.to_string())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ClientConfig {
    pub api: ApiConfig,
    pub geolocation: GeolocationConfig,
    pub uploads: UploadConfig,
    #[serde(default)]
    pub session: SessionConfig,
    pub logging: LoggingConfig,
}

/// Backend API configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    /// Base URL every endpoint path is appended to
    /// (e.g., "https://ajali.example.com/api")
    pub base_url: String,
    pub request_timeout_secs: u64,
}

impl ApiConfig {
    pub fn base_url(&self) -> Result<Url, ConfigError> {
        let url = Url::parse(self.base_url.trim())
            .map_err(|e| ConfigError::Invalid(format!("api.base_url: {e}")))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ConfigError::Invalid(format!(
                "api.base_url: scheme '{}' is not http or https",
                url.scheme()
            )));
        }
        if url.cannot_be_a_base() {
            return Err(ConfigError::Invalid(
                "api.base_url: cannot be used as a base URL".to_string(),
            ));
        }
        if !url.username().is_empty() || url.password().is_some() {
            return Err(ConfigError::Invalid(
                "api.base_url: credentials in URL are not allowed".to_string(),
            ));
        }
        if url.query().is_some() || url.fragment().is_some() {
            return Err(ConfigError::Invalid(
                "api.base_url: query and fragment are not allowed".to_string(),
            ));
        }
        Ok(url)
    }

    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct GeolocationConfig {
    /// Upper bound on waiting for a position fix
    pub timeout_secs: u64,
}

impl GeolocationConfig {
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct UploadConfig {
    pub max_bytes: usize,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SessionConfig {
    /// Where the file-backed token store keeps the session.
    /// `None` keeps the session in memory only.
    #[serde(default)]
    pub token_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Filter directive used when `RUST_LOG` is not set
    pub level: String,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api: ApiConfig {
                base_url: crate::DEFAULT_API_BASE_URL.to_string(),
                request_timeout_secs: crate::DEFAULT_REQUEST_TIMEOUT.as_secs(),
            },
            geolocation: GeolocationConfig {
                timeout_secs: crate::DEFAULT_GEOLOCATION_TIMEOUT.as_secs(),
            },
            uploads: UploadConfig {
                max_bytes: crate::DEFAULT_MAX_UPLOAD_BYTES,
            },
            session: SessionConfig::default(),
            logging: LoggingConfig {
                level: "info".to_string(),
                format: LogFormat::Pretty,
            },
        }
    }
}

impl ClientConfig {
    /// Defaults, then `config/client.*` if present, then `AJALI__*` variables.
    pub fn load() -> Result<Self, ConfigError> {
        use config::{Environment, File};

        let config = Self::defaults()?
            .add_source(File::with_name(DEFAULT_CONFIG_FILE).required(false))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        Self::finish(config)
    }

    /// Defaults overlaid with a TOML document.
    pub fn from_toml_str(toml: &str) -> Result<Self, ConfigError> {
        use config::{File, FileFormat};

        let config = Self::defaults()?
            .add_source(File::from_str(toml, FileFormat::Toml))
            .build()?;

        Self::finish(config)
    }

    fn defaults() -> Result<config::ConfigBuilder<config::builder::DefaultState>, ConfigError> {
        let defaults = Self::default();
        Ok(config::Config::builder()
            .set_default("api.base_url", defaults.api.base_url)?
            .set_default("api.request_timeout_secs", secs(defaults.api.request_timeout_secs))?
            .set_default(
                "geolocation.timeout_secs",
                secs(defaults.geolocation.timeout_secs),
            )?
            .set_default(
                "uploads.max_bytes",
                i64::try_from(defaults.uploads.max_bytes).unwrap_or(i64::MAX),
            )?
            .set_default("logging.level", defaults.logging.level)?
            .set_default("logging.format", "pretty")?)
    }

    fn finish(config: config::Config) -> Result<Self, ConfigError> {
        let client: Self = config.try_deserialize()?;
        client.validate()?;
        Ok(client)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.api.base_url()?;
        if self.api.request_timeout_secs == 0 || self.api.request_timeout() > MAX_TIMEOUT {
            return Err(ConfigError::Invalid(format!(
                "api.request_timeout_secs must be between 1 and {}",
                MAX_TIMEOUT.as_secs()
            )));
        }
        if self.geolocation.timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "geolocation.timeout_secs must be greater than zero".to_string(),
            ));
        }
        if self.uploads.max_bytes == 0 {
            return Err(ConfigError::Invalid(
                "uploads.max_bytes must be greater than zero".to_string(),
            ));
        }
        if self.logging.level.trim().is_empty() {
            return Err(ConfigError::Invalid("logging.level cannot be empty".to_string()));
        }
        Ok(())
    }
}

fn secs(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}
