//! Weather lookup pipeline
//!
//! One lookup runs location resolution, time planning, the provider fetch
//! and normalization, in that order. A failure at any step stops the
//! pipeline before the next one runs.

use std::time::Instant;

use tracing::{info, instrument};

use crate::Result;
use crate::config::WeatherAiConfig;
use crate::location_resolver::{IpInfoClient, LocationResolver};
use crate::models::{Category, Location, WeatherQuery, WeatherReading};
use crate::normalizer;
use crate::provider::{ProviderGateway, WeatherGateway};
use crate::temporal::TemporalPlanner;

/// Outcome of a successful lookup
#[derive(Debug, Clone)]
pub struct Lookup {
    pub location: Location,
    pub query: WeatherQuery,
    pub reading: WeatherReading,
}

/// Answers a single categorized weather question
pub struct WeatherEngine {
    resolver: LocationResolver,
    planner: TemporalPlanner,
    gateway: Box<dyn WeatherGateway>,
}

impl WeatherEngine {
    pub fn new(
        resolver: LocationResolver,
        planner: TemporalPlanner,
        gateway: Box<dyn WeatherGateway>,
    ) -> Self {
        Self {
            resolver,
            planner,
            gateway,
        }
    }

    /// Build an engine talking to the configured upstream services
    pub fn from_config(config: &WeatherAiConfig) -> Result<Self> {
        let geolocator = IpInfoClient::new(&config.geolocation)?;
        Ok(Self::new(
            LocationResolver::new(Box::new(geolocator)),
            TemporalPlanner::new(),
            Box::new(ProviderGateway::new(&config.providers)?),
        ))
    }

    #[instrument(skip(self))]
    pub async fn lookup(
        &self,
        category: Category,
        city: Option<&str>,
        when: Option<&str>,
    ) -> Result<Lookup> {
        let start = Instant::now();

        let location = self.resolver.resolve(city).await?;
        let window = self.planner.plan(category, when)?;
        let query = WeatherQuery::from_window(window);
        let payload = self.gateway.fetch(&query, &location).await?;
        let reading = normalizer::normalize(&query, &location, payload)?;

        info!(
            "{} lookup for {} completed in {:.3}s",
            category,
            location.name,
            start.elapsed().as_secs_f64()
        );

        Ok(Lookup {
            location,
            query,
            reading,
        })
    }
}
