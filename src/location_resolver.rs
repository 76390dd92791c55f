//! Location Resolution Module
//!
//! Determines which place a question is about. An explicitly named city wins;
//! otherwise the caller's approximate location is looked up from their public
//! IP address.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, instrument, warn};

use crate::Result;
use crate::config::GeolocationConfig;
use crate::error::WeatherAiError;
use crate::models::{Coordinates, Location};
use crate::provider::http::{build_client, get_json};

/// Best-effort lookup of the caller's location
#[async_trait]
pub trait IpGeolocator: Send + Sync {
    async fn locate(&self) -> Result<Location>;
}

/// Response of ipinfo.io `/json`
#[derive(Debug, Deserialize)]
struct IpInfoResponse {
    city: Option<String>,
    country: Option<String>,
    /// `"lat,lon"`
    loc: Option<String>,
}

/// ipinfo.io client
pub struct IpInfoClient {
    client: Client,
    base_url: String,
}

impl IpInfoClient {
    pub fn new(config: &GeolocationConfig) -> Result<Self> {
        Ok(Self {
            client: build_client(config.timeout_seconds)?,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl IpGeolocator for IpInfoClient {
    #[instrument(skip(self))]
    async fn locate(&self) -> Result<Location> {
        let url = format!("{}/json", self.base_url);
        let info: IpInfoResponse = get_json(&self.client, &url, "IP geolocation")
            .await
            .map_err(|e| WeatherAiError::unresolved(e.to_string()))?;

        let city = info
            .city
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .ok_or_else(|| WeatherAiError::unresolved("IP geolocation returned no city"))?;

        if info.country.is_none() {
            warn!("Incomplete location data: no country for {}", city);
        }

        Ok(Location::named(city)
            .with_country(info.country)
            .with_coordinates(info.loc.as_deref().and_then(Coordinates::parse)))
    }
}

/// Service for resolving the location of a weather question
pub struct LocationResolver {
    geolocator: Box<dyn IpGeolocator>,
}

impl LocationResolver {
    pub fn new(geolocator: Box<dyn IpGeolocator>) -> Self {
        Self { geolocator }
    }

    /// Resolve an optional explicit city into a location.
    ///
    /// A non-blank city is returned as given; the provider call is where an
    /// unknown name gets rejected.
    pub async fn resolve(&self, explicit_city: Option<&str>) -> Result<Location> {
        if let Some(city) = explicit_city.map(str::trim).filter(|c| !c.is_empty()) {
            debug!("Using explicit city: {}", city);
            return Ok(Location::named(city));
        }

        debug!("No city given, falling back to IP geolocation");
        let location = self.geolocator.locate().await.inspect_err(|e| {
            warn!("Location could not be resolved: {}", e);
        })?;
        debug!(
            "Resolved location: {} ({})",
            location.name,
            location.country.as_deref().unwrap_or("unknown country")
        );
        Ok(location)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    struct CountingGeolocator {
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl IpGeolocator for CountingGeolocator {
        async fn locate(&self) -> Result<Location> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(Location::named("Sylhet"))
        }
    }

    async fn resolver_for(server: &MockServer, timeout_seconds: u64) -> LocationResolver {
        let config = GeolocationConfig {
            base_url: server.uri(),
            timeout_seconds,
        };
        LocationResolver::new(Box::new(IpInfoClient::new(&config).unwrap()))
    }

    #[tokio::test]
    async fn test_explicit_city_skips_lookup() {
        let calls = Arc::new(AtomicUsize::new(0));
        let resolver = LocationResolver::new(Box::new(CountingGeolocator {
            calls: calls.clone(),
        }));

        let location = resolver.resolve(Some("  Dhaka ")).await.unwrap();
        assert_eq!(location.name, "Dhaka");
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        let location = resolver.resolve(Some("   ")).await.unwrap();
        assert_eq!(location.name, "Sylhet");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_ip_lookup_success() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "ip": "203.0.113.7",
                "city": "Dhaka",
                "country": "BD",
                "loc": "23.7104,90.4074"
            })))
            .mount(&server)
            .await;

        let location = resolver_for(&server, 5).await.resolve(None).await.unwrap();
        assert_eq!(location.name, "Dhaka");
        assert_eq!(location.country.as_deref(), Some("BD"));
        assert_eq!(location.coordinates.unwrap().latitude, 23.7104);
    }

    #[tokio::test]
    async fn test_missing_city_is_unresolved() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"country": "BD"})),
            )
            .mount(&server)
            .await;

        let err = resolver_for(&server, 5).await.resolve(None).await.unwrap_err();
        assert!(matches!(err, WeatherAiError::Unresolved { .. }));
    }

    #[tokio::test]
    async fn test_timeout_is_unresolved() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"city": "Dhaka"}))
                    .set_delay(Duration::from_secs(3)),
            )
            .mount(&server)
            .await;

        let err = resolver_for(&server, 1).await.resolve(None).await.unwrap_err();
        assert!(matches!(err, WeatherAiError::Unresolved { .. }));
    }

    #[tokio::test]
    async fn test_error_status_is_unresolved() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&server)
            .await;

        let err = resolver_for(&server, 5).await.resolve(Some("")).await.unwrap_err();
        assert!(matches!(err, WeatherAiError::Unresolved { .. }));
    }
}
