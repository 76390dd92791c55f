//! Error types and handling for the `WeatherAI` assistant

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Why a requested time was rejected for a query category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WindowRejection {
    /// The time expression could not be understood
    Unparseable,
    /// Forecast target lies before today or too far ahead
    OutOfForecastRange,
    /// Historical target is today or in the future
    NotInPast,
}

impl WindowRejection {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            WindowRejection::Unparseable => "unparseable",
            WindowRejection::OutOfForecastRange => "out_of_forecast_range",
            WindowRejection::NotInPast => "not_in_past",
        }
    }
}

impl fmt::Display for WindowRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Main error type for the `WeatherAI` application
#[derive(Error, Debug)]
pub enum WeatherAiError {
    /// No usable location could be determined
    #[error("Location unresolved: {message}")]
    Unresolved { message: String },

    /// Requested time is outside what the category supports
    #[error("Invalid time window: {reason}")]
    InvalidWindow { reason: WindowRejection },

    /// Upstream weather request failed or returned an unexpected shape
    #[error("Provider error: {message}")]
    Provider { message: String },

    /// A required field was missing from an otherwise successful fetch
    #[error("Data unavailable: missing {field}")]
    DataUnavailable { field: String },

    /// Reasoning layer failures
    #[error("Reasoning error: {message}")]
    Reasoning { message: String },

    /// History store failures
    #[error("History store error: {message}")]
    Storage { message: String },

    /// Configuration-related errors
    #[error("Configuration error: {message}")]
    Config { message: String },
}

impl WeatherAiError {
    pub fn unresolved<S: Into<String>>(message: S) -> Self {
        Self::Unresolved {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn invalid_window(reason: WindowRejection) -> Self {
        Self::InvalidWindow { reason }
    }

    pub fn provider<S: Into<String>>(message: S) -> Self {
        Self::Provider {
            message: message.into(),
        }
    }

    pub fn data_unavailable<S: Into<String>>(field: S) -> Self {
        Self::DataUnavailable {
            field: field.into(),
        }
    }

    pub fn reasoning<S: Into<String>>(message: S) -> Self {
        Self::Reasoning {
            message: message.into(),
        }
    }

    pub fn storage<S: Into<String>>(message: S) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }

    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Short explanation suitable for showing to the person who asked
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            WeatherAiError::Unresolved { .. } => {
                "❌ Location unavailable: I couldn't work out where you are. Please mention a city."
                    .to_string()
            }
            WeatherAiError::InvalidWindow { reason } => match reason {
                WindowRejection::Unparseable => {
                    "❌ Could not parse the provided date. Try something like 'tomorrow', 'next Friday' or '2 days ago'."
                        .to_string()
                }
                WindowRejection::OutOfForecastRange => format!(
                    "❌ Can only fetch forecasts from today up to {} days ahead.",
                    crate::temporal::MAX_FORECAST_DAYS
                ),
                WindowRejection::NotInPast => {
                    "❌ Historical data is only available for past dates (not today or future)."
                        .to_string()
                }
            },
            WeatherAiError::Provider { message } => format!("❌ Weather unavailable: {message}"),
            WeatherAiError::DataUnavailable { field } => {
                format!("❌ Weather data not available (missing {field}).")
            }
            WeatherAiError::Reasoning { .. } => {
                "Sorry, I couldn't reach the assistant service right now.".to_string()
            }
            WeatherAiError::Storage { .. } => {
                "Conversation history is unavailable right now.".to_string()
            }
            WeatherAiError::Config { .. } => {
                "Configuration error. Please check your config file and API keys.".to_string()
            }
        }
    }
}
