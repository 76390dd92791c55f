//! Query categories and validated time windows

use std::fmt;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Which provider and window rule a question falls under
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Current,
    Forecast,
    Historical,
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Category::Current => "current",
            Category::Forecast => "forecast",
            Category::Historical => "historical",
        };
        f.write_str(name)
    }
}

/// A parsed point in time that passed the category's window validation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindowRequest {
    pub category: Category,
    /// Absolute local date-time the question is about
    pub target: NaiveDateTime,
    /// Calendar days between today and the target date (negative for the past)
    pub days_ahead: i64,
}

/// A weather question, tagged by category
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WeatherQuery {
    Current,
    Forecast(TimeWindowRequest),
    Historical(TimeWindowRequest),
}

impl WeatherQuery {
    #[must_use]
    pub fn category(&self) -> Category {
        match self {
            WeatherQuery::Current => Category::Current,
            WeatherQuery::Forecast(_) => Category::Forecast,
            WeatherQuery::Historical(_) => Category::Historical,
        }
    }

    #[must_use]
    pub fn window(&self) -> Option<&TimeWindowRequest> {
        match self {
            WeatherQuery::Current => None,
            WeatherQuery::Forecast(window) | WeatherQuery::Historical(window) => Some(window),
        }
    }

    /// Build the query for a validated window
    #[must_use]
    pub fn from_window(window: TimeWindowRequest) -> Self {
        match window.category {
            Category::Current => WeatherQuery::Current,
            Category::Forecast => WeatherQuery::Forecast(window),
            Category::Historical => WeatherQuery::Historical(window),
        }
    }
}
