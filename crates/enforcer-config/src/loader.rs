//! Layered configuration loading.
//!
//! Sources apply in order, later ones overriding earlier ones:
//!
//! 1. Defaults (or a preset)
//! 2. A configuration file (TOML or JSON, chosen by extension)
//! 3. Inline strings
//! 4. Environment variables (`ENFORCER__SECTION__KEY`)

use crate::{ConfigError, EnforcerConfig};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Default prefix for environment overrides.
pub const DEFAULT_ENV_PREFIX: &str = "ENFORCER";

/// Supported configuration file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    /// TOML.
    Toml,
    /// JSON.
    Json,
}

impl ConfigFormat {
    /// Picks the format from a file extension. Unknown extensions read as TOML.
    #[must_use]
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => Self::Json,
            _ => Self::Toml,
        }
    }
}

/// Builder for layered configuration.
///
/// ```
/// use enforcer_config::ConfigLoader;
///
/// let config = ConfigLoader::new()
///     .with_string("[enforcer]\nfallthrough = false\n", enforcer_config::ConfigFormat::Toml)
///     .unwrap()
///     .with_env_vars(vec![("ENFORCER__ENFORCER__MOCK_HEADER".to_string(), "x-fake".to_string())])
///     .load()
///     .unwrap();
///
/// assert!(!config.enforcer.fallthrough);
/// assert_eq!(config.enforcer.mock_header, "x-fake");
/// ```
#[derive(Debug)]
pub struct ConfigLoader {
    config: EnforcerConfig,
    env_prefix: Option<String>,
    env_vars: Option<Vec<(String, String)>>,
    file_loaded: bool,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    /// Creates a loader starting from defaults, reading overrides from the
    /// process environment under [`DEFAULT_ENV_PREFIX`].
    #[must_use]
    pub fn new() -> Self {
        Self {
            config: EnforcerConfig::default(),
            env_prefix: Some(DEFAULT_ENV_PREFIX.to_string()),
            env_vars: None,
            file_loaded: false,
        }
    }

    /// Starts from the development preset.
    #[must_use]
    pub fn with_development(mut self) -> Self {
        self.config = EnforcerConfig::development();
        self
    }

    /// Starts from the production preset.
    #[must_use]
    pub fn with_production(mut self) -> Self {
        self.config = EnforcerConfig::production();
        self
    }

    /// Loads a configuration file, replacing everything loaded so far.
    ///
    /// # Errors
    ///
    /// Returns an error if the file is missing, unreadable or malformed.
    pub fn with_file(mut self, path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigError::file_not_found(path));
        }
        let content =
            std::fs::read_to_string(path).map_err(|e| ConfigError::read_error(path, e))?;
        self.config = parse(&content, ConfigFormat::from_path(path))?;
        self.file_loaded = true;
        debug!(path = %path.display(), "loaded configuration file");
        Ok(self)
    }

    /// Loads a configuration file when it exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn with_optional_file(self, path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        if path.as_ref().exists() {
            self.with_file(path)
        } else {
            Ok(self)
        }
    }

    /// Loads configuration from a string.
    ///
    /// # Errors
    ///
    /// Returns an error if the content is malformed.
    pub fn with_string(mut self, content: &str, format: ConfigFormat) -> Result<Self, ConfigError> {
        self.config = parse(content, format)?;
        Ok(self)
    }

    /// Loads `.env` from the working directory or its parents into the
    /// process environment. A missing file is ignored.
    #[must_use]
    pub fn with_dotenv(self) -> Self {
        if let Err(e) = dotenvy::dotenv() {
            if !e.not_found() {
                warn!(error = %e, "ignoring unreadable .env file");
            }
        }
        self
    }

    /// Loads a specific `.env` file into the process environment.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn with_dotenv_file(self, path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        dotenvy::from_path(path).map_err(|e| ConfigError::DotenvError {
            path: PathBuf::from(path),
            message: e.to_string(),
        })?;
        Ok(self)
    }

    /// Sets the environment variable prefix.
    #[must_use]
    pub fn with_env_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.env_prefix = Some(prefix.into());
        self
    }

    /// Disables environment overrides.
    #[must_use]
    pub fn without_env(mut self) -> Self {
        self.env_prefix = None;
        self
    }

    /// Reads overrides from the given pairs instead of the process
    /// environment.
    #[must_use]
    pub fn with_env_vars(mut self, vars: Vec<(String, String)>) -> Self {
        self.env_vars = Some(vars);
        self
    }

    /// Returns `true` if a configuration file was loaded.
    #[must_use]
    pub fn file_loaded(&self) -> bool {
        self.file_loaded
    }

    /// Applies environment overrides and validates the result.
    ///
    /// # Errors
    ///
    /// Returns an error for unparsable overrides or an invalid result.
    pub fn load(self) -> Result<EnforcerConfig, ConfigError> {
        let config = self.load_unvalidated()?;
        config.validate()?;
        Ok(config)
    }

    /// Applies environment overrides without validating.
    ///
    /// # Errors
    ///
    /// Returns an error for unparsable overrides.
    pub fn load_unvalidated(mut self) -> Result<EnforcerConfig, ConfigError> {
        if let Some(prefix) = self.env_prefix.take() {
            let vars = self
                .env_vars
                .take()
                .unwrap_or_else(|| std::env::vars().collect());
            apply_env_overrides(&mut self.config, &prefix, vars)?;
        }
        Ok(self.config)
    }
}

fn parse(content: &str, format: ConfigFormat) -> Result<EnforcerConfig, ConfigError> {
    match format {
        ConfigFormat::Toml => Ok(toml::from_str(content)?),
        ConfigFormat::Json => Ok(serde_json::from_str(content)?),
    }
}

fn apply_env_overrides(
    config: &mut EnforcerConfig,
    prefix: &str,
    vars: Vec<(String, String)>,
) -> Result<(), ConfigError> {
    let marker = format!("{prefix}__");
    for (key, value) in vars {
        let Some(rest) = key.strip_prefix(&marker) else {
            continue;
        };
        let parts: Vec<&str> = rest.split("__").collect();
        apply_env_var(config, &key, &parts, &value)?;
        debug!(var = %key, "applied environment override");
    }
    Ok(())
}

fn apply_env_var(
    config: &mut EnforcerConfig,
    var: &str,
    parts: &[&str],
    value: &str,
) -> Result<(), ConfigError> {
    let options = &mut config.enforcer;
    let logging = &mut config.logging;

    match parts {
        ["ENFORCER", "FALLTHROUGH"] => options.fallthrough = parse_bool(var, value)?,
        ["ENFORCER", "MOCK_HEADER"] => options.mock_header = value.to_string(),
        ["ENFORCER", "MOCK_QUERY"] => options.mock_query = value.to_string(),
        ["ENFORCER", "AUTOMATIC_MOCK"] => options.automatic_mock = parse_bool(var, value)?,
        ["ENFORCER", "REQ_MOCK_STATUS_CODE_PROPERTY"] => {
            options.req_mock_status_code_property = value.to_string();
        }
        ["ENFORCER", "REQ_OPEN_API_PROPERTY"] => options.req_open_api_property = value.to_string(),
        ["ENFORCER", "REQ_OPERATION_PROPERTY"] => {
            options.req_operation_property = value.to_string();
        }
        ["ENFORCER", "X_CONTROLLER"] => options.x_controller = value.to_string(),
        ["ENFORCER", "X_OPERATION"] => options.x_operation = value.to_string(),
        ["ENFORCER", "MARKER_RESET"] => options.marker_reset = parse_bool(var, value)?,

        ["LOGGING", "ENABLED"] => logging.enabled = parse_bool(var, value)?,
        ["LOGGING", "LEVEL"] => logging.level = value.to_string(),
        ["LOGGING", "JSON_FORMAT"] => logging.json_format = parse_bool(var, value)?,
        ["LOGGING", "SPAN_EVENTS"] => logging.span_events = parse_bool(var, value)?,
        ["LOGGING", "FILE_LINE_INFO"] => logging.file_line_info = parse_bool(var, value)?,
        ["LOGGING", "INCLUDE_TARGET"] => logging.include_target = parse_bool(var, value)?,

        ["CONTROLLERS", "DIRECTORY"] => {
            config.controllers.directory = Some(PathBuf::from(value));
        }

        [section @ ("ENFORCER" | "LOGGING" | "CONTROLLERS"), field] => {
            return Err(ConfigError::unknown_field(*field, *section));
        }
        _ => {
            return Err(ConfigError::env_parse_error(
                var,
                "expected PREFIX__SECTION__KEY with section ENFORCER, LOGGING or CONTROLLERS",
            ));
        }
    }
    Ok(())
}

fn parse_bool(var: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        other => Err(ConfigError::env_parse_error(
            var,
            format!("expected a boolean, got {other:?}"),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[test]
    fn test_defaults_without_env() {
        let config = ConfigLoader::new().with_env_vars(Vec::new()).load().unwrap();
        assert_eq!(config, EnforcerConfig::default());
    }

    #[test]
    fn test_env_overrides() {
        let config = ConfigLoader::new()
            .with_env_vars(vars(&[
                ("ENFORCER__ENFORCER__FALLTHROUGH", "no"),
                ("ENFORCER__ENFORCER__X_CONTROLLER", "x-handler"),
                ("ENFORCER__LOGGING__JSON_FORMAT", "0"),
                ("ENFORCER__LOGGING__LEVEL", "debug"),
                ("UNRELATED", "value"),
            ]))
            .load()
            .unwrap();
        assert!(!config.enforcer.fallthrough);
        assert_eq!(config.enforcer.x_controller, "x-handler");
        assert!(!config.logging.json_format);
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_custom_prefix() {
        let config = ConfigLoader::new()
            .with_env_prefix("PEOPLE_API")
            .with_env_vars(vars(&[
                ("PEOPLE_API__ENFORCER__AUTOMATIC_MOCK", "true"),
                ("ENFORCER__ENFORCER__AUTOMATIC_MOCK", "false"),
            ]))
            .load()
            .unwrap();
        assert!(config.enforcer.automatic_mock);
    }

    #[test]
    fn test_bad_boolean() {
        let err = ConfigLoader::new()
            .with_env_vars(vars(&[("ENFORCER__ENFORCER__FALLTHROUGH", "maybe")]))
            .load()
            .unwrap_err();
        assert!(matches!(err, ConfigError::EnvParseError { .. }));
    }

    #[test]
    fn test_unknown_field() {
        let err = ConfigLoader::new()
            .with_env_vars(vars(&[("ENFORCER__LOGGING__COLOR", "red")]))
            .load()
            .unwrap_err();
        assert!(matches!(err, ConfigError::UnknownField { .. }));
    }

    #[test]
    fn test_without_env_skips_overrides() {
        let config = ConfigLoader::new()
            .without_env()
            .with_env_vars(vars(&[("ENFORCER__ENFORCER__FALLTHROUGH", "false")]))
            .load()
            .unwrap();
        assert!(config.enforcer.fallthrough);
    }

    #[test]
    fn test_json_string() {
        let config = ConfigLoader::new()
            .with_string(r#"{ "enforcer": { "mockQuery": "fake" } }"#, ConfigFormat::Json)
            .unwrap()
            .with_env_vars(Vec::new())
            .load()
            .unwrap();
        assert_eq!(config.enforcer.mock_query, "fake");
        assert!(config.enforcer.fallthrough);
    }

    #[test]
    fn test_validation_runs_after_env() {
        let err = ConfigLoader::new()
            .with_env_vars(vars(&[("ENFORCER__ENFORCER__MOCK_HEADER", "")]))
            .load()
            .unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }

    #[test]
    fn test_format_from_path() {
        assert_eq!(ConfigFormat::from_path(Path::new("a.JSON")), ConfigFormat::Json);
        assert_eq!(ConfigFormat::from_path(Path::new("a.toml")), ConfigFormat::Toml);
        assert_eq!(ConfigFormat::from_path(Path::new("enforcer")), ConfigFormat::Toml);
    }
}
