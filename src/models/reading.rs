//! Normalized weather readings and their text rendering

use std::fmt;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

use super::Category;

/// Conditions observed right now
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrentConditions {
    pub location: String,
    /// Observation time in the location's local clock
    pub observed_at: NaiveDateTime,
    pub temperature_c: f64,
    pub feels_like_c: f64,
    pub humidity_pct: f64,
    pub wind_speed_ms: f64,
    pub condition: String,
    /// Local clock time of today's sunrise
    pub sunrise: NaiveTime,
    /// Local clock time of today's sunset
    pub sunset: NaiveTime,
}

/// The forecast hour closest to the requested time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastPoint {
    pub location: String,
    /// Timestamp of the matched hourly entry
    pub time: NaiveDateTime,
    pub temperature_c: f64,
    pub feels_like_c: f64,
    pub humidity_pct: f64,
    pub wind_kph: f64,
    pub pressure_mb: f64,
    pub condition: String,
    /// Absent when the day's astro data is missing
    pub sunrise_temperature_c: Option<f64>,
    /// Absent when the day's astro data is missing
    pub sunset_temperature_c: Option<f64>,
}

/// Daily aggregate for a past date
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoricalDay {
    pub location: String,
    pub date: NaiveDate,
    pub max_temp_c: f64,
    pub min_temp_c: f64,
    pub avg_temp_c: f64,
    pub max_wind_kph: f64,
    pub total_precip_mm: f64,
    pub avg_humidity_pct: f64,
    pub condition: String,
    pub sunrise_temperature_c: f64,
    pub sunset_temperature_c: f64,
}

/// Canonical reading, one shape per category
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "category", rename_all = "lowercase")]
pub enum WeatherReading {
    Current(CurrentConditions),
    Forecast(ForecastPoint),
    Historical(HistoricalDay),
}

impl WeatherReading {
    #[must_use]
    pub fn category(&self) -> Category {
        match self {
            WeatherReading::Current(_) => Category::Current,
            WeatherReading::Forecast(_) => Category::Forecast,
            WeatherReading::Historical(_) => Category::Historical,
        }
    }

    #[must_use]
    pub fn location(&self) -> &str {
        match self {
            WeatherReading::Current(c) => &c.location,
            WeatherReading::Forecast(f) => &f.location,
            WeatherReading::Historical(h) => &h.location,
        }
    }

    /// Calendar date the reading describes
    #[must_use]
    pub fn date(&self) -> NaiveDate {
        match self {
            WeatherReading::Current(c) => c.observed_at.date(),
            WeatherReading::Forecast(f) => f.time.date(),
            WeatherReading::Historical(h) => h.date,
        }
    }
}

fn clock(time: NaiveTime) -> String {
    time.format("%I:%M %p").to_string()
}

impl fmt::Display for CurrentConditions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "📅 Today is {}", self.observed_at.format("%B %d, %Y"))?;
        writeln!(f, "📍 Current weather in {}:", self.location)?;
        writeln!(f, "🌅 Sunrise: {}", clock(self.sunrise))?;
        writeln!(f, "🌇 Sunset: {}", clock(self.sunset))?;
        writeln!(
            f,
            "🌡️ Temp: {}°C (Feels like {}°C)",
            self.temperature_c, self.feels_like_c
        )?;
        writeln!(f, "📖 {}", self.condition)?;
        writeln!(f, "💧 Humidity: {}%", self.humidity_pct)?;
        write!(f, "🌬️ Wind: {} m/s", self.wind_speed_ms)
    }
}

impl fmt::Display for ForecastPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "📍 Weather in {} at {}:",
            self.location,
            self.time.format("%Y-%m-%d %H:%M")
        )?;
        writeln!(
            f,
            "🌡️ Temperature: {}°C (Feels like {}°C)",
            self.temperature_c, self.feels_like_c
        )?;
        writeln!(f, "🌬️ Wind Speed: {} kph", self.wind_kph)?;
        writeln!(f, "💧 Humidity: {}%", self.humidity_pct)?;
        writeln!(f, "📈 Pressure: {} hPa", self.pressure_mb)?;
        write!(f, "📖 Condition: {}", self.condition)?;

        if let Some(temp) = self.sunrise_temperature_c {
            write!(f, "\n🌅 Temperature at sunrise: {temp}°C")?;
        }
        if let Some(temp) = self.sunset_temperature_c {
            write!(f, "\n🌇 Temperature at sunset: {temp}°C")?;
        }
        Ok(())
    }
}

impl fmt::Display for HistoricalDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "📅 Historical weather in {} on {}:",
            self.location,
            self.date.format("%Y-%m-%d")
        )?;
        writeln!(f, "🌡️ Max Temp: {}°C", self.max_temp_c)?;
        writeln!(f, "🌡️ Min Temp: {}°C", self.min_temp_c)?;
        writeln!(f, "🌡️ Avg Temp: {}°C", self.avg_temp_c)?;
        writeln!(f, "🌬️ Max Wind Speed: {} kph", self.max_wind_kph)?;
        writeln!(f, "💧 Total Precipitation: {} mm", self.total_precip_mm)?;
        writeln!(f, "💧 Avg Humidity: {}%", self.avg_humidity_pct)?;
        writeln!(f, "📖 Condition: {}", self.condition)?;
        writeln!(
            f,
            "🌅 Temperature at sunrise: {}°C",
            self.sunrise_temperature_c
        )?;
        write!(f, "🌇 Temperature at sunset: {}°C", self.sunset_temperature_c)
    }
}

impl fmt::Display for WeatherReading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WeatherReading::Current(c) => c.fmt(f),
            WeatherReading::Forecast(p) => p.fmt(f),
            WeatherReading::Historical(h) => h.fmt(f),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn forecast_point() -> ForecastPoint {
        ForecastPoint {
            location: "Dhaka".to_string(),
            time: NaiveDate::from_ymd_opt(2026, 10, 17)
                .unwrap()
                .and_hms_opt(17, 0, 0)
                .unwrap(),
            temperature_c: 29.4,
            feels_like_c: 33.0,
            humidity_pct: 74.0,
            wind_kph: 11.2,
            pressure_mb: 1009.0,
            condition: "Patchy rain nearby".to_string(),
            sunrise_temperature_c: None,
            sunset_temperature_c: Some(28.1),
        }
    }

    #[test]
    fn test_forecast_display_omits_absent_sunrise() {
        let text = forecast_point().to_string();
        assert!(text.starts_with("📍 Weather in Dhaka at 2026-10-17 17:00:"));
        assert!(text.contains("🌡️ Temperature: 29.4°C (Feels like 33°C)"));
        assert!(text.contains("📈 Pressure: 1009 hPa"));
        assert!(!text.contains("sunrise"));
        assert!(text.ends_with("🌇 Temperature at sunset: 28.1°C"));
    }

    #[test]
    fn test_current_display_uses_clock_times() {
        let reading = WeatherReading::Current(CurrentConditions {
            location: "Dhaka".to_string(),
            observed_at: NaiveDate::from_ymd_opt(2026, 10, 16)
                .unwrap()
                .and_hms_opt(14, 5, 0)
                .unwrap(),
            temperature_c: 30.5,
            feels_like_c: 36.1,
            humidity_pct: 80.0,
            wind_speed_ms: 3.6,
            condition: "Haze".to_string(),
            sunrise: NaiveTime::from_hms_opt(5, 53, 0).unwrap(),
            sunset: NaiveTime::from_hms_opt(17, 32, 0).unwrap(),
        });

        let text = reading.to_string();
        assert!(text.contains("📅 Today is October 16, 2026"));
        assert!(text.contains("🌅 Sunrise: 05:53 AM"));
        assert!(text.contains("🌇 Sunset: 05:32 PM"));
        assert!(text.contains("💧 Humidity: 80%"));
        assert_eq!(reading.category(), Category::Current);
        assert_eq!(reading.location(), "Dhaka");
    }
}
