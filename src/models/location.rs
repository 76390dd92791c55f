//! Location model for resolved places

use serde::{Deserialize, Serialize};

/// Geographic coordinates in decimal degrees
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    /// Parse the `"lat,lon"` form used by IP geolocation services
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        let (lat, lon) = value.split_once(',')?;
        let latitude = lat.trim().parse::<f64>().ok()?;
        let longitude = lon.trim().parse::<f64>().ok()?;

        if !(-90.0..=90.0).contains(&latitude) || !(-180.0..=180.0).contains(&longitude) {
            return None;
        }

        Some(Self {
            latitude,
            longitude,
        })
    }
}

/// A place a weather question refers to
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Location {
    /// Human-readable place name (city)
    pub name: String,
    /// Country code (ISO 3166-1 alpha-2), when known
    pub country: Option<String>,
    /// Coordinates, when known
    pub coordinates: Option<Coordinates>,
}

impl Location {
    /// Create a location from a bare place name
    #[must_use]
    pub fn named<S: Into<String>>(name: S) -> Self {
        Self {
            name: name.into(),
            country: None,
            coordinates: None,
        }
    }

    #[must_use]
    pub fn with_country(mut self, country: Option<String>) -> Self {
        self.country = country;
        self
    }

    #[must_use]
    pub fn with_coordinates(mut self, coordinates: Option<Coordinates>) -> Self {
        self.coordinates = coordinates;
        self
    }

    /// Value for provider `q` parameters: coordinates when known, otherwise the name
    #[must_use]
    pub fn query_value(&self) -> String {
        match self.coordinates {
            Some(c) => format!("{:.4},{:.4}", c.latitude, c.longitude),
            None => self.name.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_coordinates() {
        let coords = Coordinates::parse("23.7104,90.4074").unwrap();
        assert_eq!(coords.latitude, 23.7104);
        assert_eq!(coords.longitude, 90.4074);

        assert!(Coordinates::parse("91.0,8.0").is_none());
        assert!(Coordinates::parse("46.0").is_none());
        assert!(Coordinates::parse("north,east").is_none());
    }

    #[test]
    fn test_query_value_prefers_coordinates() {
        let named = Location::named("Dhaka");
        assert_eq!(named.query_value(), "Dhaka");

        let located = Location::named("Dhaka").with_coordinates(Coordinates::parse("23.71,90.41"));
        assert_eq!(located.query_value(), "23.7100,90.4100");
    }
}
