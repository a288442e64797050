//! Storage configuration loaded from the environment

use std::env;
use thiserror::Error;

const DEFAULT_ACQUIRE_TIMEOUT: u64 = 30;

/// Connection settings for the single storage connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseConfig {
    pub database_url: String,
    pub acquire_timeout_seconds: u64,
}

impl DatabaseConfig {
    /// Build a configuration for the given URL with default timeouts
    pub fn new(database_url: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
            acquire_timeout_seconds: DEFAULT_ACQUIRE_TIMEOUT,
        }
    }

    /// Load configuration from `DATABASE_URL` and `DATABASE_ACQUIRE_TIMEOUT`
    pub fn from_env() -> Result<Self, ConfigError> {
        let database_url = get_env_required("DATABASE_URL")?;
        let timeout = get_env_or_default("DATABASE_ACQUIRE_TIMEOUT", &DEFAULT_ACQUIRE_TIMEOUT.to_string());
        let acquire_timeout_seconds = timeout.parse::<u64>().map_err(|_| ConfigError::InvalidValue {
            field: "DATABASE_ACQUIRE_TIMEOUT".to_string(),
            value: timeout.clone(),
            expected: "a whole number of seconds".to_string(),
        })?;

        let config = Self {
            database_url,
            acquire_timeout_seconds,
        };
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.database_url.trim().is_empty() {
            return Err(ConfigError::ValidationFailed {
                field: "database_url".to_string(),
                reason: "Database URL cannot be empty".to_string(),
            });
        }

        if self.acquire_timeout_seconds == 0 {
            return Err(ConfigError::ValidationFailed {
                field: "acquire_timeout_seconds".to_string(),
                reason: "Acquire timeout must be greater than zero".to_string(),
            });
        }

        Ok(())
    }

    /// URL with any password stripped, safe to log
    pub fn redacted_url(&self) -> String {
        match (self.database_url.find("://"), self.database_url.rfind('@')) {
            (Some(scheme_end), Some(at)) if at > scheme_end => {
                format!("{}://***{}", &self.database_url[..scheme_end], &self.database_url[at..])
            }
            _ => self.database_url.clone(),
        }
    }
}

fn get_env_required(key: &str) -> Result<String, ConfigError> {
    env::var(key).map_err(|_| ConfigError::MissingEnvVar {
        var: key.to_string(),
    })
}

fn get_env_or_default(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing required environment variable: {var}")]
    MissingEnvVar { var: String },

    #[error("Invalid value for {field}: '{value}', expected {expected}")]
    InvalidValue { field: String, value: String, expected: String },

    #[error("Validation failed for {field}: {reason}")]
    ValidationFailed { field: String, reason: String },
}
