//! Turning free-form time text into validated query windows

mod parser;

pub use parser::{DatePreference, parse_expression};

use chrono::{Duration, Local, NaiveDateTime};
use tracing::debug;

use crate::Result;
use crate::error::{WeatherAiError, WindowRejection};
use crate::models::{Category, TimeWindowRequest};

/// Forecasts are available for today and the following days, exclusive of this bound
pub const MAX_FORECAST_DAYS: i64 = 3;

/// Resolves and validates the point in time a question is about
#[derive(Debug, Clone, Copy, Default)]
pub struct TemporalPlanner;

impl TemporalPlanner {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Plan a window against the local wall clock
    pub fn plan(&self, category: Category, text: Option<&str>) -> Result<TimeWindowRequest> {
        self.plan_at(category, text, Local::now().naive_local())
    }

    /// Plan a window relative to an explicit `now`
    pub fn plan_at(
        &self,
        category: Category,
        text: Option<&str>,
        now: NaiveDateTime,
    ) -> Result<TimeWindowRequest> {
        let text = text.map(str::trim).filter(|t| !t.is_empty());

        let target = match (category, text) {
            (Category::Current, _) => now,
            (Category::Forecast, None) => now,
            (Category::Historical, None) => now - Duration::days(1),
            (Category::Forecast, Some(text)) => {
                parse_expression(text, now, DatePreference::Future)
                    .ok_or(WeatherAiError::invalid_window(WindowRejection::Unparseable))?
            }
            (Category::Historical, Some(text)) => {
                parse_expression(text, now, DatePreference::Past)
                    .ok_or(WeatherAiError::invalid_window(WindowRejection::Unparseable))?
            }
        };

        let days_ahead = (target.date() - now.date()).num_days();
        debug!(%category, %target, days_ahead, "Planned time window");

        match category {
            Category::Forecast if !(0..MAX_FORECAST_DAYS).contains(&days_ahead) => Err(
                WeatherAiError::invalid_window(WindowRejection::OutOfForecastRange),
            ),
            Category::Historical if days_ahead >= 0 => {
                Err(WeatherAiError::invalid_window(WindowRejection::NotInPast))
            }
            _ => Ok(TimeWindowRequest {
                category,
                target,
                days_ahead,
            }),
        }
    }
}
