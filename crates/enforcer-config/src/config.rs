//! Configuration types.

use crate::ConfigError;
use enforcer_core::EnforcerOptions;
use enforcer_telemetry::logging::{create_env_filter, LogConfig};
use serde::Deserialize;
use std::path::PathBuf;

/// Complete Enforcer configuration.
///
/// ```toml
/// [enforcer]
/// fallthrough = false
/// mockHeader = "x-mock"
/// automaticMock = true
///
/// [logging]
/// level = "enforcer=debug,info"
/// json_format = false
///
/// [controllers]
/// directory = "./controllers"
/// ```
///
/// Option names in the `[enforcer]` section are camelCase.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EnforcerConfig {
    /// Mediation options.
    pub enforcer: EnforcerOptions,
    /// Logging setup.
    pub logging: LogConfig,
    /// Controller loading.
    pub controllers: ControllersConfig,
}

/// Where controllers are loaded from.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ControllersConfig {
    /// Directory holding one controller file per controller name.
    pub directory: Option<PathBuf>,
}

impl EnforcerConfig {
    /// Development preset: human-readable debug logging, fallthrough off so
    /// unknown routes surface as 404.
    #[must_use]
    pub fn development() -> Self {
        Self {
            enforcer: EnforcerOptions {
                fallthrough: false,
                ..EnforcerOptions::default()
            },
            logging: LogConfig::development(),
            controllers: ControllersConfig::default(),
        }
    }

    /// Production preset: JSON logging and default options.
    #[must_use]
    pub fn production() -> Self {
        Self {
            enforcer: EnforcerOptions::default(),
            logging: LogConfig::production(),
            controllers: ControllersConfig::default(),
        }
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] for invalid options, an invalid log filter or
    /// a controller directory that does not exist.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.enforcer
            .validate()
            .map_err(|e| ConfigError::validation_error(e.to_string()))?;

        create_env_filter(&self.logging.level)
            .map_err(|e| ConfigError::invalid_value("logging.level", e.to_string()))?;

        if let Some(directory) = &self.controllers.directory {
            if !directory.is_dir() {
                return Err(ConfigError::invalid_value(
                    "controllers.directory",
                    format!("{} is not a directory", directory.display()),
                ));
            }
        }

        Ok(())
    }
}
