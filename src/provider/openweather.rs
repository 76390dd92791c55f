//! OpenWeatherMap current-conditions client

use reqwest::Client;
use serde::Deserialize;
use tracing::{info, instrument};

use super::http::{build_client, get_json};
use crate::Result;
use crate::config::ProvidersConfig;
use crate::error::WeatherAiError;
use crate::models::Location;

/// Response of `/data/2.5/weather`; only `main` is structurally required
#[derive(Debug, Clone, Deserialize)]
pub struct CurrentPayload {
    pub main: MainBlock,
    #[serde(default)]
    pub weather: Vec<ConditionBlock>,
    pub wind: Option<WindBlock>,
    pub sys: Option<SysBlock>,
    /// Offset from UTC in seconds
    pub timezone: Option<i32>,
    /// Observation time, unix seconds
    pub dt: Option<i64>,
    pub name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MainBlock {
    pub temp: Option<f64>,
    pub feels_like: Option<f64>,
    pub humidity: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ConditionBlock {
    pub main: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WindBlock {
    pub speed: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SysBlock {
    pub sunrise: Option<i64>,
    pub sunset: Option<i64>,
}

/// Client for the OpenWeatherMap current weather endpoint
pub struct OpenWeatherClient {
    client: Client,
    api_key: Option<String>,
    base_url: String,
}

impl OpenWeatherClient {
    pub fn new(config: &ProvidersConfig) -> Result<Self> {
        Ok(Self {
            client: build_client(config.timeout_seconds)?,
            api_key: config.openweather_key.clone(),
            base_url: config.openweather_base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Fetch current conditions in metric units
    #[instrument(skip(self), fields(location = %location.name))]
    pub async fn current(&self, location: &Location) -> Result<CurrentPayload> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| WeatherAiError::provider("OpenWeatherMap API key is not configured"))?;

        let place = match location.coordinates {
            Some(c) => format!("lat={}&lon={}", c.latitude, c.longitude),
            None => format!("q={}", urlencoding::encode(&location.name)),
        };
        let url = format!(
            "{}/data/2.5/weather?{}&appid={}&units=metric",
            self.base_url,
            place,
            urlencoding::encode(api_key)
        );

        let payload: CurrentPayload = get_json(&self.client, &url, "OpenWeatherMap").await?;
        info!(
            "Current conditions received for {}",
            payload.name.as_deref().unwrap_or(&location.name)
        );
        Ok(payload)
    }
}
