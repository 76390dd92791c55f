//! Data models for the `WeatherAI` assistant
//!
//! This module contains the core domain models organized by concern:
//! - Location: resolved places and coordinates
//! - Query: categories, validated time windows and tagged queries
//! - Reading: normalized weather readings and their rendering
//! - Exchange: persisted conversation turns

pub mod exchange;
pub mod location;
pub mod query;
pub mod reading;

// Re-export all public types for convenient access
pub use exchange::Exchange;
pub use location::{Coordinates, Location};
pub use query::{Category, TimeWindowRequest, WeatherQuery};
pub use reading::{CurrentConditions, ForecastPoint, HistoricalDay, WeatherReading};
