//! Upstream weather providers
//!
//! Routes each query category to the service that answers it:
//! - Current conditions: OpenWeatherMap
//! - Forecast and history: WeatherAPI.com

pub mod http;
pub mod openweather;
pub mod weatherapi;

use async_trait::async_trait;
use tracing::debug;

pub use openweather::{CurrentPayload, OpenWeatherClient};
pub use weatherapi::{DailySeriesPayload, WeatherApiClient};

use crate::Result;
use crate::config::ProvidersConfig;
use crate::models::{Location, WeatherQuery};

/// Provider response before normalization, one shape per category
#[derive(Debug, Clone)]
pub enum RawPayload {
    Current(CurrentPayload),
    Forecast(DailySeriesPayload),
    Historical(DailySeriesPayload),
}

/// Anything that can fetch raw weather data for a planned query
#[async_trait]
pub trait WeatherGateway: Send + Sync {
    async fn fetch(&self, query: &WeatherQuery, location: &Location) -> Result<RawPayload>;
}

/// Gateway backed by the real HTTP providers
pub struct ProviderGateway {
    openweather: OpenWeatherClient,
    weatherapi: WeatherApiClient,
}

impl ProviderGateway {
    pub fn new(config: &ProvidersConfig) -> Result<Self> {
        Ok(Self {
            openweather: OpenWeatherClient::new(config)?,
            weatherapi: WeatherApiClient::new(config)?,
        })
    }
}

#[async_trait]
impl WeatherGateway for ProviderGateway {
    async fn fetch(&self, query: &WeatherQuery, location: &Location) -> Result<RawPayload> {
        debug!(category = %query.category(), location = %location.name, "Fetching weather");
        match query {
            WeatherQuery::Current => self.openweather.current(location).await.map(RawPayload::Current),
            WeatherQuery::Forecast(window) => self
                .weatherapi
                .forecast(location, window.days_ahead + 1)
                .await
                .map(RawPayload::Forecast),
            WeatherQuery::Historical(window) => self
                .weatherapi
                .history(location, window.target.date())
                .await
                .map(RawPayload::Historical),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Category, TimeWindowRequest};
    use chrono::NaiveDate;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_forecast_spans_days_ahead_plus_one() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/forecast.json"))
            .and(query_param("days", "3"))
            .respond_with(ResponseTemplate::new(200).set_body_json(
                serde_json::json!({"forecast": {"forecastday": []}}),
            ))
            .expect(1)
            .mount(&server)
            .await;

        let config = ProvidersConfig {
            weatherapi_key: Some("wapi-test-key".to_string()),
            weatherapi_base_url: server.uri(),
            ..ProvidersConfig::default()
        };
        let gateway = ProviderGateway::new(&config).unwrap();
        let query = WeatherQuery::Forecast(TimeWindowRequest {
            category: Category::Forecast,
            target: NaiveDate::from_ymd_opt(2026, 10, 18)
                .unwrap()
                .and_hms_opt(9, 0, 0)
                .unwrap(),
            days_ahead: 2,
        });

        let payload = gateway
            .fetch(&query, &Location::named("Dhaka"))
            .await
            .unwrap();
        assert!(matches!(payload, RawPayload::Forecast(_)));
    }
}
