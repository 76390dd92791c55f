//! WeatherAPI.com forecast and history client

use chrono::NaiveDate;
use reqwest::Client;
use serde::Deserialize;
use tracing::{info, instrument};

use super::http::{build_client, get_json};
use crate::Result;
use crate::config::ProvidersConfig;
use crate::error::WeatherAiError;
use crate::models::Location;

/// Shared shape of `/forecast.json` and `/history.json` responses.
///
/// `forecast.forecastday` is structurally required; everything below it is
/// optional so that missing values surface as data-unavailable errors later.
#[derive(Debug, Clone, Deserialize)]
pub struct DailySeriesPayload {
    pub location: Option<ProviderLocation>,
    pub forecast: ForecastBlock,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProviderLocation {
    pub name: Option<String>,
    pub country: Option<String>,
    /// IANA time zone name, e.g. `Asia/Dhaka`
    pub tz_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ForecastBlock {
    pub forecastday: Vec<ForecastDay>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ForecastDay {
    /// `YYYY-MM-DD`
    pub date: String,
    pub day: Option<DayAggregate>,
    pub astro: Option<Astro>,
    #[serde(default)]
    pub hour: Vec<HourEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DayAggregate {
    pub maxtemp_c: Option<f64>,
    pub mintemp_c: Option<f64>,
    pub avgtemp_c: Option<f64>,
    pub maxwind_kph: Option<f64>,
    pub totalprecip_mm: Option<f64>,
    pub avghumidity: Option<f64>,
    pub condition: Option<ConditionText>,
}

/// Sunrise/sunset as local clock strings such as `05:53 AM`
#[derive(Debug, Clone, Deserialize)]
pub struct Astro {
    pub sunrise: Option<String>,
    pub sunset: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HourEntry {
    /// Local time, `YYYY-MM-DD HH:MM`
    pub time: String,
    pub temp_c: Option<f64>,
    pub feelslike_c: Option<f64>,
    pub humidity: Option<f64>,
    pub wind_kph: Option<f64>,
    pub pressure_mb: Option<f64>,
    pub condition: Option<ConditionText>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ConditionText {
    pub text: Option<String>,
}

/// Client for the WeatherAPI.com forecast and history endpoints
pub struct WeatherApiClient {
    client: Client,
    api_key: Option<String>,
    base_url: String,
}

impl WeatherApiClient {
    pub fn new(config: &ProvidersConfig) -> Result<Self> {
        Ok(Self {
            client: build_client(config.timeout_seconds)?,
            api_key: config.weatherapi_key.clone(),
            base_url: config.weatherapi_base_url.trim_end_matches('/').to_string(),
        })
    }

    fn key(&self) -> Result<String> {
        self.api_key
            .as_deref()
            .map(|k| urlencoding::encode(k).into_owned())
            .ok_or_else(|| WeatherAiError::provider("WeatherAPI key is not configured"))
    }

    /// Fetch `days` calendar days of hourly forecast starting today
    #[instrument(skip(self), fields(location = %location.name))]
    pub async fn forecast(&self, location: &Location, days: i64) -> Result<DailySeriesPayload> {
        let url = format!(
            "{}/forecast.json?key={}&q={}&days={}&aqi=no&alerts=no",
            self.base_url,
            self.key()?,
            urlencoding::encode(&location.query_value()),
            days
        );

        let payload: DailySeriesPayload = get_json(&self.client, &url, "WeatherAPI").await?;
        info!(
            "Forecast received with {} day(s)",
            payload.forecast.forecastday.len()
        );
        Ok(payload)
    }

    /// Fetch the recorded hourly series and daily aggregate for one past date
    #[instrument(skip(self), fields(location = %location.name))]
    pub async fn history(&self, location: &Location, date: NaiveDate) -> Result<DailySeriesPayload> {
        let url = format!(
            "{}/history.json?key={}&q={}&dt={}",
            self.base_url,
            self.key()?,
            urlencoding::encode(&location.query_value()),
            date.format("%Y-%m-%d")
        );

        let payload: DailySeriesPayload = get_json(&self.client, &url, "WeatherAPI").await?;
        if payload.forecast.forecastday.is_empty() {
            return Err(WeatherAiError::provider(format!(
                "No historical data returned for {date}"
            )));
        }
        info!("History received for {}", date);
        Ok(payload)
    }
}
