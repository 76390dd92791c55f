//! Mapping provider payloads into canonical weather readings
//!
//! Forecast and history payloads carry hourly series in the location's local
//! clock. The reading for a requested time is the hourly entry nearest to it,
//! compared as epoch seconds in the provider-reported time zone. The same
//! selection, scoped to a single day, yields the temperatures at sunrise and
//! sunset.

use chrono::{
    DateTime, FixedOffset, LocalResult, NaiveDate, NaiveDateTime, NaiveTime, Offset, TimeZone,
    Utc,
};
use chrono_tz::Tz;
use tracing::debug;

use crate::Result;
use crate::error::WeatherAiError;
use crate::models::{
    CurrentConditions, ForecastPoint, HistoricalDay, Location, TimeWindowRequest, WeatherQuery,
    WeatherReading,
};
use crate::provider::RawPayload;
use crate::provider::openweather::CurrentPayload;
use crate::provider::weatherapi::{DailySeriesPayload, ForecastDay, HourEntry};

const HOUR_FORMAT: &str = "%Y-%m-%d %H:%M";
const ASTRO_FORMAT: &str = "%I:%M %p";

/// Pick the item whose timestamp is closest to `target`.
///
/// Items without a timestamp are skipped. Equidistant candidates resolve to
/// the earlier timestamp regardless of their order in `items`.
pub fn nearest<T, F>(items: &[T], target: i64, timestamp: F) -> Option<&T>
where
    F: Fn(&T) -> Option<i64>,
{
    items
        .iter()
        .filter_map(|item| timestamp(item).map(|ts| (ts, item)))
        .min_by_key(|(ts, _)| ((ts - target).abs(), *ts))
        .map(|(_, item)| item)
}

/// Epoch seconds of a local wall-clock time in `tz` (UTC when unknown)
pub fn to_epoch(local: NaiveDateTime, tz: Option<Tz>) -> i64 {
    let Some(tz) = tz else {
        return local.and_utc().timestamp();
    };

    match tz.from_local_datetime(&local) {
        LocalResult::Single(dt) => dt.timestamp(),
        LocalResult::Ambiguous(earliest, _) => earliest.timestamp(),
        // Inside a DST gap: shift by the offset in effect at that UTC instant
        LocalResult::None => {
            let offset = tz.offset_from_utc_datetime(&local).fix().local_minus_utc();
            local.and_utc().timestamp() - i64::from(offset)
        }
    }
}

/// Turn a raw provider payload into the reading for `query`
pub fn normalize(
    query: &WeatherQuery,
    location: &Location,
    payload: RawPayload,
) -> Result<WeatherReading> {
    match (query, payload) {
        (WeatherQuery::Current, RawPayload::Current(p)) => {
            normalize_current(location, &p).map(WeatherReading::Current)
        }
        (WeatherQuery::Forecast(window), RawPayload::Forecast(p)) => {
            normalize_forecast(location, window, &p).map(WeatherReading::Forecast)
        }
        (WeatherQuery::Historical(window), RawPayload::Historical(p)) => {
            normalize_historical(location, window, &p).map(WeatherReading::Historical)
        }
        (query, _) => Err(WeatherAiError::provider(format!(
            "Provider returned data that does not match a {} query",
            query.category()
        ))),
    }
}

fn required<T>(value: Option<T>, field: &str) -> Result<T> {
    value.ok_or_else(|| WeatherAiError::data_unavailable(field))
}

fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn clock_at(epoch: i64, offset: FixedOffset, field: &str) -> Result<NaiveTime> {
    DateTime::from_timestamp(epoch, 0)
        .map(|dt| dt.with_timezone(&offset).time())
        .ok_or_else(|| WeatherAiError::data_unavailable(field))
}

fn normalize_current(location: &Location, payload: &CurrentPayload) -> Result<CurrentConditions> {
    let offset = payload
        .timezone
        .and_then(FixedOffset::east_opt)
        .unwrap_or(Utc.fix());

    let sys = required(payload.sys.as_ref(), "sys")?;
    let condition = payload
        .weather
        .first()
        .and_then(|w| w.description.as_deref().or(w.main.as_deref()));

    let observed_at = payload
        .dt
        .and_then(|dt| DateTime::from_timestamp(dt, 0))
        .unwrap_or_else(Utc::now)
        .with_timezone(&offset)
        .naive_local();

    Ok(CurrentConditions {
        location: location.name.clone(),
        observed_at,
        temperature_c: required(payload.main.temp, "main.temp")?,
        feels_like_c: required(payload.main.feels_like, "main.feels_like")?,
        humidity_pct: required(payload.main.humidity, "main.humidity")?,
        wind_speed_ms: required(payload.wind.as_ref().and_then(|w| w.speed), "wind.speed")?,
        condition: capitalize(required(condition, "weather.description")?),
        sunrise: clock_at(required(sys.sunrise, "sys.sunrise")?, offset, "sys.sunrise")?,
        sunset: clock_at(required(sys.sunset, "sys.sunset")?, offset, "sys.sunset")?,
    })
}

fn provider_tz(payload: &DailySeriesPayload) -> Option<Tz> {
    payload
        .location
        .as_ref()
        .and_then(|l| l.tz_id.as_deref())
        .and_then(|id| id.parse().ok())
}

fn hour_time(entry: &HourEntry) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(&entry.time, HOUR_FORMAT).ok()
}

fn astro_clock(value: Option<&str>) -> Option<NaiveTime> {
    value.and_then(|v| NaiveTime::parse_from_str(v.trim(), ASTRO_FORMAT).ok())
}

/// Temperature of the hour nearest to `clock` on `day`
fn temperature_near(day: &ForecastDay, date: NaiveDate, clock: NaiveTime, tz: Option<Tz>) -> Option<f64> {
    let target = to_epoch(date.and_time(clock), tz);
    nearest(&day.hour, target, |h| hour_time(h).map(|t| to_epoch(t, tz)))
        .and_then(|h| h.temp_c)
}

fn normalize_forecast(
    location: &Location,
    window: &TimeWindowRequest,
    payload: &DailySeriesPayload,
) -> Result<ForecastPoint> {
    let tz = provider_tz(payload);
    let hours: Vec<&HourEntry> = payload
        .forecast
        .forecastday
        .iter()
        .flat_map(|day| day.hour.iter())
        .collect();

    let target = to_epoch(window.target, tz);
    let entry = nearest(&hours, target, |h| hour_time(h).map(|t| to_epoch(t, tz)))
        .copied()
        .ok_or_else(|| WeatherAiError::data_unavailable("forecast.hour"))?;
    let time = required(hour_time(entry), "hour.time")?;
    debug!(target = %window.target, matched = %time, candidates = hours.len(), "Nearest forecast hour");

    let target_date = window.target.date();
    let target_day = payload
        .forecast
        .forecastday
        .iter()
        .find(|day| NaiveDate::parse_from_str(&day.date, "%Y-%m-%d").ok() == Some(target_date));
    let astro = target_day.and_then(|day| day.astro.as_ref().map(|astro| (day, astro)));

    let (sunrise_temperature_c, sunset_temperature_c) = match astro {
        Some((day, astro)) => (
            astro_clock(astro.sunrise.as_deref())
                .and_then(|clock| temperature_near(day, target_date, clock, tz)),
            astro_clock(astro.sunset.as_deref())
                .and_then(|clock| temperature_near(day, target_date, clock, tz)),
        ),
        None => (None, None),
    };

    Ok(ForecastPoint {
        location: location.name.clone(),
        time,
        temperature_c: required(entry.temp_c, "hour.temp_c")?,
        feels_like_c: required(entry.feelslike_c, "hour.feelslike_c")?,
        humidity_pct: required(entry.humidity, "hour.humidity")?,
        wind_kph: required(entry.wind_kph, "hour.wind_kph")?,
        pressure_mb: required(entry.pressure_mb, "hour.pressure_mb")?,
        condition: required(
            entry.condition.as_ref().and_then(|c| c.text.clone()),
            "hour.condition",
        )?,
        sunrise_temperature_c,
        sunset_temperature_c,
    })
}

fn normalize_historical(
    location: &Location,
    window: &TimeWindowRequest,
    payload: &DailySeriesPayload,
) -> Result<HistoricalDay> {
    let tz = provider_tz(payload);
    let day = required(payload.forecast.forecastday.first(), "forecast.forecastday")?;
    let aggregate = required(day.day.as_ref(), "forecastday.day")?;
    let astro = required(day.astro.as_ref(), "forecastday.astro")?;
    let date = required(
        NaiveDate::parse_from_str(&day.date, "%Y-%m-%d").ok(),
        "forecastday.date",
    )?;
    debug!(requested = %window.target.date(), provided = %date, "Historical day");

    let sunrise = required(astro_clock(astro.sunrise.as_deref()), "astro.sunrise")?;
    let sunset = required(astro_clock(astro.sunset.as_deref()), "astro.sunset")?;

    Ok(HistoricalDay {
        location: location.name.clone(),
        date,
        max_temp_c: required(aggregate.maxtemp_c, "day.maxtemp_c")?,
        min_temp_c: required(aggregate.mintemp_c, "day.mintemp_c")?,
        avg_temp_c: required(aggregate.avgtemp_c, "day.avgtemp_c")?,
        max_wind_kph: required(aggregate.maxwind_kph, "day.maxwind_kph")?,
        total_precip_mm: required(aggregate.totalprecip_mm, "day.totalprecip_mm")?,
        avg_humidity_pct: required(aggregate.avghumidity, "day.avghumidity")?,
        condition: required(
            aggregate.condition.as_ref().and_then(|c| c.text.clone()),
            "day.condition",
        )?,
        sunrise_temperature_c: required(
            temperature_near(day, date, sunrise, tz),
            "sunrise temperature",
        )?,
        sunset_temperature_c: required(
            temperature_near(day, date, sunset, tz),
            "sunset temperature",
        )?,
    })
}
