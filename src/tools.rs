//! Weather tools exposed to the reasoning layer

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, warn};

use crate::engine::WeatherEngine;
use crate::models::Category;
use crate::reasoning::{ToolCall, ToolCallError, ToolDescriptor, ToolExecutor, ToolParameter};

pub const CURRENT_WEATHER: &str = "CurrentWeather";
pub const FORECAST: &str = "Forecast";
pub const HISTORICAL: &str = "Historical";

const CITY: ToolParameter = ToolParameter {
    name: "city",
    description: "City name. Leave empty to use the user's current location.",
};

/// The three weather tools offered to the model
#[must_use]
pub fn catalog() -> Vec<ToolDescriptor> {
    vec![
        ToolDescriptor {
            name: CURRENT_WEATHER,
            description: "Get current weather for a given city. If no city is provided, \
                          it uses the user's current location.",
            parameters: vec![CITY],
        },
        ToolDescriptor {
            name: FORECAST,
            description: "Get the weather forecast for a specific date and time (e.g. 'tomorrow', \
                          'next Monday at 6pm') for a given or current location. Use this for \
                          questions like 'weather update tomorrow' or 'forecast for Sunday in \
                          Dhaka'. Forecasts cover today and the next two days.",
            parameters: vec![
                CITY,
                ToolParameter {
                    name: "target_datetime",
                    description: "When the forecast is for, as the user phrased it. \
                                  Leave empty for right now.",
                },
            ],
        },
        ToolDescriptor {
            name: HISTORICAL,
            description: "Fetch historical weather for a past date: temperature highs and lows, \
                          wind speed, precipitation, humidity and conditions. If no city is \
                          provided, the user's current location is used. If no date is given, \
                          it defaults to yesterday.",
            parameters: vec![
                CITY,
                ToolParameter {
                    name: "target_date",
                    description: "The past date, as the user phrased it (e.g. 'yesterday', \
                                  '3 days ago', 'last Friday').",
                },
            ],
        },
    ]
}

#[derive(Debug, Default, Deserialize)]
struct CurrentArgs {
    #[serde(default, alias = "location")]
    city: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ForecastArgs {
    #[serde(default, alias = "location")]
    city: Option<String>,
    #[serde(default, alias = "date", alias = "datetime", alias = "target_date")]
    target_datetime: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct HistoricalArgs {
    #[serde(default, alias = "location")]
    city: Option<String>,
    #[serde(default, alias = "date", alias = "target_datetime")]
    target_date: Option<String>,
}

fn parse_args<T: DeserializeOwned + Default>(call: &ToolCall) -> Result<T, ToolCallError> {
    let invalid = |message: String| ToolCallError::InvalidArguments {
        tool: call.name.clone(),
        message,
    };

    match &call.arguments {
        Value::Null => Ok(T::default()),
        Value::Object(_) => {
            serde_json::from_value(call.arguments.clone()).map_err(|e| invalid(e.to_string()))
        }
        _ => Err(invalid("arguments must be a JSON object".to_string())),
    }
}

/// Treat blank values and the words "none"/"null" as not given
fn present(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| {
        !v.is_empty() && !v.eq_ignore_ascii_case("none") && !v.eq_ignore_ascii_case("null")
    })
}

/// City and date of the most recent successful lookup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookupRecord {
    pub city: String,
    pub date: String,
}

/// Tool executor for a single query
pub struct WeatherTools {
    engine: Arc<WeatherEngine>,
    last_lookup: Mutex<Option<LookupRecord>>,
}

impl WeatherTools {
    pub fn new(engine: Arc<WeatherEngine>) -> Self {
        Self {
            engine,
            last_lookup: Mutex::new(None),
        }
    }

    pub fn last_lookup(&self) -> Option<LookupRecord> {
        self.last_lookup
            .lock()
            .map(|record| record.clone())
            .unwrap_or(None)
    }
}

#[async_trait]
impl ToolExecutor for WeatherTools {
    fn catalog(&self) -> Vec<ToolDescriptor> {
        catalog()
    }

    async fn execute(&self, call: &ToolCall) -> Result<String, ToolCallError> {
        debug!("Executing tool {} with {}", call.name, call.arguments);

        let (category, city, when) = match call.name.as_str() {
            CURRENT_WEATHER => {
                let args: CurrentArgs = parse_args(call)?;
                (Category::Current, args.city, None)
            }
            FORECAST => {
                let args: ForecastArgs = parse_args(call)?;
                (Category::Forecast, args.city, args.target_datetime)
            }
            HISTORICAL => {
                let args: HistoricalArgs = parse_args(call)?;
                (Category::Historical, args.city, args.target_date)
            }
            other => return Err(ToolCallError::UnknownTool(other.to_string())),
        };

        let city = present(city);
        let when = present(when);
        match self
            .engine
            .lookup(category, city.as_deref(), when.as_deref())
            .await
        {
            Ok(lookup) => {
                if let Ok(mut record) = self.last_lookup.lock() {
                    *record = Some(LookupRecord {
                        city: lookup.location.name.clone(),
                        date: lookup.reading.date().format("%Y-%m-%d").to_string(),
                    });
                }
                Ok(lookup.reading.to_string())
            }
            Err(e) => {
                warn!("{} lookup failed: {}", category, e);
                Ok(e.user_message())
            }
        }
    }
}
