//! TOML configuration file loading
//!
//! ```toml
//! [log]
//! level = "info"
//! format = "ext"
//!
//! [at_exit]
//! timeout_ms = 5000
//! parallel = true
//!
//! [at_alarm]
//! timeout_ms = 1000
//! ```
//!
//! Without `--config-file` the default location
//! `<config dir>/Finalizer/finalizer.toml` is used when it exists.

use super::args::Args;
use crate::core::error_handling::ContextualError;
use crate::finalizer::api::FinalizerConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{message}")]
    NotFound { path: PathBuf, message: String },

    #[error("{message}")]
    Read {
        message: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{message}")]
    Parse { message: String },

    #[error("{message}")]
    Invalid { message: String },
}

impl ContextualError for ConfigError {
    fn is_user_actionable(&self) -> bool {
        !matches!(self, ConfigError::Read { .. })
    }

    fn user_message(&self) -> Option<&str> {
        match self {
            ConfigError::NotFound { message, .. }
            | ConfigError::Parse { message }
            | ConfigError::Invalid { message } => Some(message),
            ConfigError::Read { .. } => None,
        }
    }
}

/// `[log]` table
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LogSettings {
    pub level: Option<String>,
    pub format: Option<String>,
    pub file: Option<String>,
    pub color: Option<bool>,
}

/// Complete application configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    pub log: LogSettings,
    pub at_exit: FinalizerConfig,
    pub at_alarm: FinalizerConfig,
}

impl AppConfig {
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("Finalizer").join("finalizer.toml"))
    }

    /// Load the explicit file (which must exist) or the default file if present
    pub async fn load(config_file: Option<&Path>) -> Result<Self, ConfigError> {
        let path = match config_file {
            Some(path) if !path.exists() => {
                return Err(ConfigError::NotFound {
                    path: path.to_path_buf(),
                    message: format!(
                        "The specified configuration file does not exist: {}",
                        path.display()
                    ),
                });
            }
            Some(path) => path.to_path_buf(),
            None => match Self::default_path() {
                Some(path) if path.exists() => path,
                _ => return Ok(Self::default()),
            },
        };

        let contents = tokio::fs::read_to_string(&path)
            .await
            .map_err(|source| ConfigError::Read {
                message: format!("Error reading configuration file {}", path.display()),
                source,
            })?;
        let config = Self::from_toml_str(&contents).map_err(|e| match e {
            ConfigError::Parse { message } => ConfigError::Parse {
                message: format!("{}: {}", path.display(), message),
            },
            other => other,
        })?;
        log::debug!("configuration loaded from {}", path.display());
        Ok(config)
    }

    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(contents).map_err(|e| ConfigError::Parse {
            message: format!("Error parsing configuration: {}", e),
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for (table, settings) in [("at_exit", &self.at_exit), ("at_alarm", &self.at_alarm)] {
            settings.validate().map_err(|e| ConfigError::Invalid {
                message: format!("[{}] {}", table, e),
            })?;
        }
        Ok(())
    }

    /// Apply command-line overrides
    pub fn apply_args(&mut self, args: &Args) {
        if let Some(timeout_ms) = args.timeout_ms {
            self.at_exit.timeout_ms = timeout_ms;
        }
        if args.parallel {
            self.at_exit.parallel = true;
        }
        if let Some(timeout_ms) = args.alarm_timeout_ms {
            self.at_alarm.timeout_ms = timeout_ms;
        }
        if args.alarm_parallel {
            self.at_alarm.parallel = true;
        }
        if args.log_level.is_some() {
            self.log.level = args.log_level.clone();
        }
        if args.log_format.is_some() {
            self.log.format = args.log_format.clone();
        }
        if args.log_file.is_some() {
            self.log.file = args.log_file.clone();
        }
        self.log.color = args.color_choice(self.log.color);
    }
}
