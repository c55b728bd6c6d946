//! Engine configuration
//!
//! Defaults, optional YAML file, then `HOMEFLOW_*` environment variables,
//! in that order of precedence (last wins). Invalid environment values are
//! logged and ignored.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use tracing::warn;

use crate::application::adapters::MAX_PAGE_SIZE;
use crate::types::OperationKind;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The config file could not be read
    #[error("Failed to read config file {path}: {source}")]
    Io {
        /// File that was read
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// The config file is not valid YAML for this schema
    #[error("Invalid configuration: {0}")]
    Parse(#[from] serde_yaml::Error),

    /// A value is outside its allowed range
    #[error("Invalid value for {field}: {reason}")]
    Invalid {
        /// Offending field
        field: &'static str,
        /// What is wrong with it
        reason: String,
    },
}

/// Bounded wait per operation kind, in milliseconds
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationTimeouts {
    /// Verification code dispatch
    #[serde(default = "default_send_code_ms")]
    pub send_code_ms: u64,

    /// Verification code check
    #[serde(default = "default_verify_code_ms")]
    pub verify_code_ms: u64,

    /// Intent creation plus confirmation
    #[serde(default = "default_payment_ms")]
    pub payment_ms: u64,

    /// Assignment and assignment lookup
    #[serde(default = "default_assignment_ms")]
    pub assignment_ms: u64,

    /// Directory page fetch
    #[serde(default = "default_directory_ms")]
    pub directory_ms: u64,
}

fn default_send_code_ms() -> u64 {
    10_000
}

fn default_verify_code_ms() -> u64 {
    10_000
}

fn default_payment_ms() -> u64 {
    30_000
}

fn default_assignment_ms() -> u64 {
    10_000
}

fn default_directory_ms() -> u64 {
    5_000
}

impl Default for OperationTimeouts {
    fn default() -> Self {
        Self {
            send_code_ms: default_send_code_ms(),
            verify_code_ms: default_verify_code_ms(),
            payment_ms: default_payment_ms(),
            assignment_ms: default_assignment_ms(),
            directory_ms: default_directory_ms(),
        }
    }
}

impl OperationTimeouts {
    /// Same timeout for every kind
    pub fn uniform(ms: u64) -> Self {
        Self {
            send_code_ms: ms,
            verify_code_ms: ms,
            payment_ms: ms,
            assignment_ms: ms,
            directory_ms: ms,
        }
    }

    /// Bounded wait for a kind
    pub fn for_kind(&self, kind: OperationKind) -> Duration {
        let ms = match kind {
            OperationKind::SendCode => self.send_code_ms,
            OperationKind::VerifyCode => self.verify_code_ms,
            OperationKind::Payment => self.payment_ms,
            OperationKind::AssignAgent | OperationKind::LookupAssignment => self.assignment_ms,
            OperationKind::FetchDirectory => self.directory_ms,
        };
        Duration::from_millis(ms)
    }
}

/// Log output settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset
    #[serde(default = "default_log_filter")]
    pub filter: String,

    /// JSON instead of pretty output
    #[serde(default)]
    pub json: bool,

    /// Daily-rolling log file, in addition to stdout
    #[serde(default)]
    pub file: Option<PathBuf>,
}

fn default_log_filter() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: default_log_filter(),
            json: false,
            file: None,
        }
    }
}

/// Engine configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Per-kind timeouts
    #[serde(default)]
    pub timeouts: OperationTimeouts,

    /// Page size used when a caller does not pick one
    #[serde(default = "default_directory_page_size")]
    pub directory_page_size: u32,

    /// Log output
    #[serde(default)]
    pub logging: LoggingConfig,
}

fn default_directory_page_size() -> u32 {
    20
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            timeouts: OperationTimeouts::default(),
            directory_page_size: default_directory_page_size(),
            logging: LoggingConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Load from `HOMEFLOW_CONFIG_FILE` (if set) and the environment
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_with(|key| std::env::var(key).ok())
    }

    /// Load using `lookup` in place of the process environment
    pub fn load_with<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = match lookup("HOMEFLOW_CONFIG_FILE") {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };

        let timeout_vars: [(&str, &mut u64); 5] = [
            ("HOMEFLOW_SEND_CODE_TIMEOUT_MS", &mut config.timeouts.send_code_ms),
            ("HOMEFLOW_VERIFY_CODE_TIMEOUT_MS", &mut config.timeouts.verify_code_ms),
            ("HOMEFLOW_PAYMENT_TIMEOUT_MS", &mut config.timeouts.payment_ms),
            ("HOMEFLOW_ASSIGNMENT_TIMEOUT_MS", &mut config.timeouts.assignment_ms),
            ("HOMEFLOW_DIRECTORY_TIMEOUT_MS", &mut config.timeouts.directory_ms),
        ];
        for (key, slot) in timeout_vars {
            if let Some(value) = lookup(key) {
                match value.parse::<u64>() {
                    Ok(ms) if ms > 0 => *slot = ms,
                    _ => warn!("Invalid {} value: {}", key, value),
                }
            }
        }

        if let Some(value) = lookup("HOMEFLOW_DIRECTORY_PAGE_SIZE") {
            match value.parse::<u32>() {
                Ok(size) if (1..=MAX_PAGE_SIZE).contains(&size) => config.directory_page_size = size,
                _ => warn!("Invalid HOMEFLOW_DIRECTORY_PAGE_SIZE value: {}", value),
            }
        }

        if let Some(filter) = lookup("HOMEFLOW_LOG") {
            config.logging.filter = filter;
        }

        if let Some(value) = lookup("HOMEFLOW_LOG_JSON") {
            match value.to_lowercase().as_str() {
                "true" | "1" => config.logging.json = true,
                "false" | "0" => config.logging.json = false,
                _ => warn!("Invalid HOMEFLOW_LOG_JSON value: {}", value),
            }
        }

        if let Some(file) = lookup("HOMEFLOW_LOG_FILE") {
            config.logging.file = if file.is_empty() { None } else { Some(PathBuf::from(file)) };
        }

        config.validate()?;
        Ok(config)
    }

    /// Read a YAML config file
    pub fn from_file(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let contents = std::fs::read_to_string(&path).map_err(|source| ConfigError::Io {
            path: path.clone(),
            source,
        })?;
        Self::from_yaml_str(&contents)
    }

    /// Parse YAML; missing fields take their defaults
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Check ranges that serde cannot express
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=MAX_PAGE_SIZE).contains(&self.directory_page_size) {
            return Err(ConfigError::Invalid {
                field: "directory_page_size",
                reason: format!("must be between 1 and {}", MAX_PAGE_SIZE),
            });
        }

        for kind in OperationKind::ALL {
            if self.timeouts.for_kind(kind).is_zero() {
                return Err(ConfigError::Invalid {
                    field: "timeouts",
                    reason: format!("{} timeout must be positive", kind),
                });
            }
        }

        Ok(())
    }
}
