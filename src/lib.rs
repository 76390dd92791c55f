//! `WeatherAI` - Conversational weather assistant
//!
//! This library answers natural-language weather questions by letting a
//! language model call current, forecast and historical weather lookups,
//! and keeps a persistent record of every exchange.

pub mod api;
pub mod config;
pub mod context;
pub mod engine;
pub mod error;
pub mod history;
pub mod location_resolver;
pub mod models;
pub mod normalizer;
pub mod orchestrator;
pub mod provider;
pub mod reasoning;
pub mod telemetry;
pub mod temporal;
pub mod tools;
pub mod web;

// Re-export core types for public API
pub use config::WeatherAiConfig;
pub use engine::{Lookup, WeatherEngine};
pub use error::{WeatherAiError, WindowRejection};
pub use history::{FjallHistoryStore, HistoryStore, MemoryHistoryStore};
pub use location_resolver::LocationResolver;
pub use models::{Exchange, Location, WeatherQuery, WeatherReading};
pub use orchestrator::{EngineContext, QueryOrchestrator};
pub use temporal::TemporalPlanner;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Core result type used throughout the library
pub type Result<T> = std::result::Result<T, WeatherAiError>;
