//! Configuration management for the `WeatherAI` application
//!
//! Handles loading configuration from files, environment variables,
//! and provides validation for all configuration settings.

use crate::WeatherAiError;
use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// Root configuration structure for the `WeatherAI` application
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WeatherAiConfig {
    /// Weather provider configuration
    #[serde(default)]
    pub providers: ProvidersConfig,
    /// IP geolocation configuration
    #[serde(default)]
    pub geolocation: GeolocationConfig,
    /// Reasoning layer (Gemini) configuration
    #[serde(default)]
    pub reasoning: ReasoningConfig,
    /// Conversation history configuration
    #[serde(default)]
    pub history: HistoryConfig,
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
    /// HTTP server configuration
    #[serde(default)]
    pub server: ServerConfig,
}

/// Weather provider settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvidersConfig {
    /// OpenWeatherMap API key, used for current conditions
    pub openweather_key: Option<String>,
    #[serde(default = "default_openweather_base_url")]
    pub openweather_base_url: String,
    /// WeatherAPI.com key, used for forecasts and history
    pub weatherapi_key: Option<String>,
    #[serde(default = "default_weatherapi_base_url")]
    pub weatherapi_base_url: String,
    /// Request timeout in seconds
    #[serde(default = "default_provider_timeout")]
    pub timeout_seconds: u64,
}

/// IP geolocation settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeolocationConfig {
    #[serde(default = "default_geolocation_base_url")]
    pub base_url: String,
    #[serde(default = "default_geolocation_timeout")]
    pub timeout_seconds: u64,
}

/// Reasoning layer settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReasoningConfig {
    /// Gemini API key
    pub api_key: Option<String>,
    #[serde(default = "default_reasoning_model")]
    pub model: String,
    #[serde(default = "default_reasoning_endpoint")]
    pub endpoint: String,
    /// Sampling temperature
    #[serde(default = "default_reasoning_temperature")]
    pub temperature: f32,
    /// Upper bound for one full reasoning run, tool calls included
    #[serde(default = "default_reasoning_timeout")]
    pub timeout_seconds: u64,
    /// Maximum model turns per query
    #[serde(default = "default_reasoning_max_steps")]
    pub max_steps: u32,
}

/// Conversation history settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryConfig {
    /// Directory of the history database
    #[serde(default = "default_history_path")]
    pub path: String,
    /// Number of past exchanges prepended to each query
    #[serde(default = "default_context_size")]
    pub context_size: usize,
}

/// Logging configuration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (error, warn, info, debug, trace)
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Log format (pretty or json)
    #[serde(default = "default_log_format")]
    pub format: String,
    /// OTLP/HTTP collector endpoint; traces are exported when set
    pub otlp_endpoint: Option<String>,
}

/// HTTP server settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_server_host")]
    pub host: String,
    #[serde(default = "default_server_port")]
    pub port: u16,
}

// Default value functions
fn default_openweather_base_url() -> String {
    "https://api.openweathermap.org".to_string()
}

fn default_weatherapi_base_url() -> String {
    "https://api.weatherapi.com/v1".to_string()
}

fn default_provider_timeout() -> u64 {
    10
}

fn default_geolocation_base_url() -> String {
    "https://ipinfo.io".to_string()
}

fn default_geolocation_timeout() -> u64 {
    5
}

fn default_reasoning_model() -> String {
    "gemini-1.5-flash".to_string()
}

fn default_reasoning_endpoint() -> String {
    "https://generativelanguage.googleapis.com/v1beta".to_string()
}

fn default_reasoning_temperature() -> f32 {
    0.7
}

fn default_reasoning_timeout() -> u64 {
    60
}

fn default_reasoning_max_steps() -> u32 {
    6
}

fn default_history_path() -> String {
    dirs::data_dir()
        .map(|dir| dir.join("weatherai").join("history"))
        .unwrap_or_else(|| PathBuf::from(".weatherai").join("history"))
        .to_string_lossy()
        .into_owned()
}

fn default_context_size() -> usize {
    5
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

fn default_server_host() -> String {
    "127.0.0.1".to_string()
}

fn default_server_port() -> u16 {
    8080
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            openweather_key: None,
            openweather_base_url: default_openweather_base_url(),
            weatherapi_key: None,
            weatherapi_base_url: default_weatherapi_base_url(),
            timeout_seconds: default_provider_timeout(),
        }
    }
}

impl Default for GeolocationConfig {
    fn default() -> Self {
        Self {
            base_url: default_geolocation_base_url(),
            timeout_seconds: default_geolocation_timeout(),
        }
    }
}

impl Default for ReasoningConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: default_reasoning_model(),
            endpoint: default_reasoning_endpoint(),
            temperature: default_reasoning_temperature(),
            timeout_seconds: default_reasoning_timeout(),
            max_steps: default_reasoning_max_steps(),
        }
    }
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            path: default_history_path(),
            context_size: default_context_size(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            otlp_endpoint: None,
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_server_host(),
            port: default_server_port(),
        }
    }
}

fn is_http_url(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}

impl WeatherAiConfig {
    /// Load configuration from file and environment variables
    pub fn load() -> Result<Self> {
        Self::load_from_path(None)
    }

    /// Load configuration from specified path
    pub fn load_from_path(config_path: Option<PathBuf>) -> Result<Self> {
        Self::load_with_env(config_path, None)
    }

    /// Load configuration with an explicit environment instead of the process one
    fn load_with_env(
        config_path: Option<PathBuf>,
        env: Option<HashMap<String, String>>,
    ) -> Result<Self> {
        let mut builder = Config::builder();

        // Load from file if path is provided or use default location
        let config_file = config_path.unwrap_or_else(|| {
            Self::get_config_path().unwrap_or_else(|| PathBuf::from("config.toml"))
        });

        if config_file.exists() {
            builder = builder.add_source(
                File::from(config_file.clone())
                    .required(false)
                    .format(config::FileFormat::Toml),
            );
        }

        // Environment overrides, e.g. WEATHERAI_PROVIDERS__WEATHERAPI_KEY
        builder = builder.add_source(
            Environment::with_prefix("WEATHERAI")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true)
                .source(env),
        );

        let settings = builder
            .build()
            .with_context(|| "Failed to build configuration")?;

        let mut config: WeatherAiConfig = settings
            .try_deserialize()
            .with_context(|| "Failed to deserialize configuration")?;

        // Apply defaults for missing values
        config.apply_defaults();

        // Validate configuration
        config.validate()?;

        Ok(config)
    }

    /// Get the default configuration file path
    #[must_use]
    pub fn get_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("weatherai").join("config.toml"))
    }

    /// Apply default values to missing configuration fields
    pub fn apply_defaults(&mut self) {
        if self.providers.openweather_base_url.is_empty() {
            self.providers.openweather_base_url = default_openweather_base_url();
        }
        if self.providers.weatherapi_base_url.is_empty() {
            self.providers.weatherapi_base_url = default_weatherapi_base_url();
        }
        if self.providers.timeout_seconds == 0 {
            self.providers.timeout_seconds = default_provider_timeout();
        }
        if self.geolocation.base_url.is_empty() {
            self.geolocation.base_url = default_geolocation_base_url();
        }
        if self.geolocation.timeout_seconds == 0 {
            self.geolocation.timeout_seconds = default_geolocation_timeout();
        }
        if self.reasoning.model.is_empty() {
            self.reasoning.model = default_reasoning_model();
        }
        if self.reasoning.endpoint.is_empty() {
            self.reasoning.endpoint = default_reasoning_endpoint();
        }
        if self.reasoning.timeout_seconds == 0 {
            self.reasoning.timeout_seconds = default_reasoning_timeout();
        }
        if self.reasoning.max_steps == 0 {
            self.reasoning.max_steps = default_reasoning_max_steps();
        }
        if self.history.path.is_empty() {
            self.history.path = default_history_path();
        }
        if self.history.context_size == 0 {
            self.history.context_size = default_context_size();
        }
        if self.logging.level.is_empty() {
            self.logging.level = default_log_level();
        }
        if self.logging.format.is_empty() {
            self.logging.format = default_log_format();
        }
        if self.server.host.is_empty() {
            self.server.host = default_server_host();
        }
    }

    /// Validate all configuration settings
    pub fn validate(&self) -> Result<()> {
        self.validate_api_keys()?;
        self.validate_numeric_ranges()?;
        self.validate_string_values()?;
        Ok(())
    }

    /// Validate API keys and credentials
    pub fn validate_api_keys(&self) -> Result<()> {
        let keys = [
            ("OpenWeatherMap", &self.providers.openweather_key),
            ("WeatherAPI", &self.providers.weatherapi_key),
            ("Gemini", &self.reasoning.api_key),
        ];

        for (service, key) in keys {
            if let Some(key) = key
                && key.trim().is_empty()
            {
                return Err(WeatherAiError::config(format!(
                    "{service} API key cannot be empty if provided. Either remove it or provide a valid key."
                ))
                .into());
            }
        }

        Ok(())
    }

    /// Validate numeric configuration ranges
    fn validate_numeric_ranges(&self) -> Result<()> {
        if self.providers.timeout_seconds > 300 {
            return Err(
                WeatherAiError::config("Provider timeout cannot exceed 300 seconds").into(),
            );
        }

        if self.geolocation.timeout_seconds > 60 {
            return Err(
                WeatherAiError::config("Geolocation timeout cannot exceed 60 seconds").into(),
            );
        }

        if self.reasoning.timeout_seconds > 600 {
            return Err(
                WeatherAiError::config("Reasoning timeout cannot exceed 600 seconds").into(),
            );
        }

        if self.reasoning.max_steps > 20 {
            return Err(WeatherAiError::config("Reasoning max steps cannot exceed 20").into());
        }

        if !(0.0..=2.0).contains(&self.reasoning.temperature) {
            return Err(WeatherAiError::config(
                "Reasoning temperature must be between 0.0 and 2.0",
            )
            .into());
        }

        if self.history.context_size > 50 {
            return Err(WeatherAiError::config("History context size cannot exceed 50").into());
        }

        Ok(())
    }

    /// Validate string configuration values
    fn validate_string_values(&self) -> Result<()> {
        let valid_log_levels = ["error", "warn", "info", "debug", "trace"];
        if !valid_log_levels.contains(&self.logging.level.as_str()) {
            return Err(WeatherAiError::config(format!(
                "Invalid log level '{}'. Must be one of: {}",
                self.logging.level,
                valid_log_levels.join(", ")
            ))
            .into());
        }

        let valid_log_formats = ["pretty", "json"];
        if !valid_log_formats.contains(&self.logging.format.as_str()) {
            return Err(WeatherAiError::config(format!(
                "Invalid log format '{}'. Must be one of: {}",
                self.logging.format,
                valid_log_formats.join(", ")
            ))
            .into());
        }

        let urls = [
            ("OpenWeatherMap base URL", self.providers.openweather_base_url.as_str()),
            ("WeatherAPI base URL", self.providers.weatherapi_base_url.as_str()),
            ("Geolocation base URL", self.geolocation.base_url.as_str()),
            ("Reasoning endpoint", self.reasoning.endpoint.as_str()),
        ];
        for (name, url) in urls {
            if !is_http_url(url) {
                return Err(WeatherAiError::config(format!(
                    "{name} must be a valid HTTP or HTTPS URL"
                ))
                .into());
            }
        }

        if let Some(endpoint) = &self.logging.otlp_endpoint
            && !is_http_url(endpoint)
        {
            return Err(
                WeatherAiError::config("OTLP endpoint must be a valid HTTP or HTTPS URL").into(),
            );
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = WeatherAiConfig::default();
        assert_eq!(config.providers.timeout_seconds, 10);
        assert_eq!(config.geolocation.base_url, "https://ipinfo.io");
        assert_eq!(config.geolocation.timeout_seconds, 5);
        assert_eq!(config.reasoning.model, "gemini-1.5-flash");
        assert_eq!(config.reasoning.max_steps, 6);
        assert_eq!(config.history.context_size, 5);
        assert_eq!(config.logging.level, "info");
        assert!(config.providers.weatherapi_key.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation_empty_api_key() {
        let mut config = WeatherAiConfig::default();
        config.providers.weatherapi_key = Some("  ".to_string());
        let result = config.validate_api_keys();
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("WeatherAPI"));
    }

    #[test]
    fn test_config_validation_invalid_log_level() {
        let mut config = WeatherAiConfig::default();
        config.logging.level = "invalid".to_string();
        let result = config.validate();
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("Invalid log level"));
    }

    #[test]
    fn test_config_validation_numeric_ranges() {
        let mut config = WeatherAiConfig::default();
        config.providers.timeout_seconds = 500;
        let result = config.validate();
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("timeout cannot exceed"));

        let mut config = WeatherAiConfig::default();
        config.reasoning.temperature = 3.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validation_urls() {
        let mut config = WeatherAiConfig::default();
        config.geolocation.base_url = "ipinfo.io".to_string();
        assert!(config.validate().is_err());

        let mut config = WeatherAiConfig::default();
        config.logging.otlp_endpoint = Some("localhost:4318".to_string());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_apply_defaults_fills_zero_values() {
        let mut config = WeatherAiConfig::default();
        config.providers.timeout_seconds = 0;
        config.history.context_size = 0;
        config.reasoning.model = String::new();
        config.apply_defaults();
        assert_eq!(config.providers.timeout_seconds, 10);
        assert_eq!(config.history.context_size, 5);
        assert_eq!(config.reasoning.model, "gemini-1.5-flash");
    }

    #[test]
    fn test_load_from_file_with_env_override() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
[providers]
weatherapi_key = "file-key"
timeout_seconds = 7

[history]
context_size = 3

[server]
port = 9090
"#
        )
        .unwrap();

        let env = HashMap::from([(
            "WEATHERAI_REASONING__MODEL".to_string(),
            "gemini-test-model".to_string(),
        )]);
        let config =
            WeatherAiConfig::load_with_env(Some(file.path().to_path_buf()), Some(env)).unwrap();
        assert_eq!(config.providers.weatherapi_key.as_deref(), Some("file-key"));
        assert_eq!(config.providers.timeout_seconds, 7);
        assert_eq!(config.history.context_size, 3);
        assert_eq!(config.server.port, 9090);
        assert_eq!(config.reasoning.model, "gemini-test-model");
        assert_eq!(config.geolocation.base_url, "https://ipinfo.io");
    }

    #[test]
    fn test_config_path_generation() {
        let path = WeatherAiConfig::get_config_path();
        assert!(path.is_some());
        let path = path.unwrap();
        assert!(path.to_string_lossy().contains("weatherai"));
        assert!(path.to_string_lossy().contains("config.toml"));
    }
}
