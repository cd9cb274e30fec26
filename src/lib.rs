//! # Surf Watch Core Library
//!
//! This library provides the data model and core logic for the surf watch
//! dashboard: fetching merged weather and marine forecasts, picking the hour
//! closest to "now", composing condensed text summaries and pushing them to
//! notification sinks on a daily schedule.
//!
//! ## Design Philosophy
//!
//! ### Canonical Units
//! - **Wind speed** is always stored in km/h, **temperature** always in °C
//! - Conversion to knots, m/s, °F or K happens only when a value is formatted
//!   for display or for a message, never at storage time
//!
//! ### Sparse Marine Coverage
//! Marine fields (waves, sea temperature) are `Option`s. They are absent exactly
//! when the marine provider had nothing for that hour, which is common for
//! inland or sheltered coordinates.
//!
//! ### Data Flow
//! 1. **Settings**: persisted domains are loaded once at startup ([`settings`])
//! 2. **Fetch**: weather + marine series are merged into a [`ForecastBundle`] ([`forecast`])
//! 3. **Select**: the sample nearest to the wall clock is chosen ([`current`])
//! 4. **Compose**: a view-mode specific summary is built ([`message`])
//! 5. **Dispatch**: matching schedule minutes push the summary to sinks
//!    ([`schedule`], [`notify`])
//!
//! ## Core Types
//! - [`HourlySample`]: one hour of merged forecast data
//! - [`ForecastBundle`]: one complete fetch result for a location
//! - [`Location`]: a named coordinate pair with its IANA timezone
//! - [`ViewMode`]: selector for message and dashboard layout

use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub mod app;
pub mod astro;
pub mod config;
pub mod current;
pub mod forecast;
pub mod message;
pub mod notify;
pub mod renderer;
pub mod schedule;
pub mod settings;
pub mod tide;
pub mod units;

/// One hour of merged weather and marine data.
///
/// Non-optional fields come from the general weather series. An hour with no
/// wind or temperature is dropped while merging; missing humidity or cloud
/// cover reads as 0. Every `Option` field is absent exactly when the provider
/// omitted it.
///
/// # Example
/// ```
/// use chrono::DateTime;
/// use surf_watch_lib::HourlySample;
///
/// let time = DateTime::parse_from_rfc3339("2025-07-24T09:00:00-04:00").unwrap();
/// let sample = HourlySample::new(time, 20.0, 45.0, 18.0);
/// assert!(sample.wave_height.is_none());
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HourlySample {
    /// Start of the hour, in the location's UTC offset
    pub time: DateTime<FixedOffset>,
    /// Sustained wind speed at 10 m, km/h
    pub wind_speed: f64,
    /// Wind gusts at 10 m, km/h
    pub wind_gusts: Option<f64>,
    /// Wind direction in degrees (meteorological, "coming from")
    pub wind_direction: f64,
    /// Air temperature at 2 m, °C
    pub temperature: f64,
    /// Relative humidity, %
    pub humidity: f64,
    /// Total cloud cover, %
    pub cloud_cover: f64,
    /// Precipitation probability, %
    pub precipitation_probability: Option<f64>,
    /// Precipitation amount, mm
    pub precipitation: Option<f64>,
    /// Sea-level pressure, hPa
    pub pressure: Option<f64>,
    /// Visibility, m
    pub visibility: Option<f64>,
    /// Significant wave height, m
    pub wave_height: Option<f64>,
    /// Mean wave direction, degrees
    pub wave_direction: Option<f64>,
    /// Wave period, s
    pub wave_period: Option<f64>,
    /// Sea-surface temperature, °C
    pub sea_surface_temperature: Option<f64>,
    /// UV index
    pub uv_index: Option<f64>,
}

impl HourlySample {
    /// Build a sample with the required fields set and all optional fields absent.
    pub fn new(
        time: DateTime<FixedOffset>,
        wind_speed: f64,
        wind_direction: f64,
        temperature: f64,
    ) -> Self {
        Self {
            time,
            wind_speed,
            wind_gusts: None,
            wind_direction,
            temperature,
            humidity: 0.0,
            cloud_cover: 0.0,
            precipitation_probability: None,
            precipitation: None,
            pressure: None,
            visibility: None,
            wave_height: None,
            wave_direction: None,
            wave_period: None,
            sea_surface_temperature: None,
            uv_index: None,
        }
    }
}

/// Complete forecast for one location, produced atomically by one fetch.
///
/// Samples are chronologically non-decreasing. A refresh replaces the whole
/// bundle; there is no incremental merge.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ForecastBundle {
    pub location: Location,
    pub samples: Vec<HourlySample>,
    /// Sunrise on the bundle's first day
    pub sunrise: Option<DateTime<FixedOffset>>,
    /// Sunset on the bundle's first day
    pub sunset: Option<DateTime<FixedOffset>>,
    pub fetched_at: DateTime<Utc>,
}

impl ForecastBundle {
    /// True when the bundle carries no marine data at all.
    pub fn is_inland(&self) -> bool {
        self.samples
            .iter()
            .all(|s| s.wave_height.is_none() && s.sea_surface_temperature.is_none())
    }
}

/// A named coordinate pair.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Location {
    /// Stable identifier (geocoder id, or a fixed id for the default)
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
    pub latitude: f64,
    pub longitude: f64,
    /// IANA timezone name, e.g. "America/New_York"
    pub timezone: String,
}

impl Location {
    /// Human-readable label: "Name, Region, Country" with absent parts skipped.
    pub fn label(&self) -> String {
        let mut parts = vec![self.name.as_str()];
        if let Some(region) = self.region.as_deref() {
            if region != self.name {
                parts.push(region);
            }
        }
        if let Some(country) = self.country.as_deref() {
            parts.push(country);
        }
        parts.join(", ")
    }
}

impl Default for Location {
    fn default() -> Self {
        Location {
            id: 4975802,
            name: "Portland".to_string(),
            region: Some("Maine".to_string()),
            country: Some("United States".to_string()),
            latitude: 43.6591,
            longitude: -70.2568,
            timezone: "America/New_York".to_string(),
        }
    }
}

/// Selector for which fields the message composer and the dashboard include.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewMode {
    #[default]
    Casual,
    Surfer,
    Everything,
    Custom,
}

impl ViewMode {
    pub const ALL: [ViewMode; 4] = [
        ViewMode::Casual,
        ViewMode::Surfer,
        ViewMode::Everything,
        ViewMode::Custom,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ViewMode::Casual => "casual",
            ViewMode::Surfer => "surfer",
            ViewMode::Everything => "everything",
            ViewMode::Custom => "custom",
        }
    }
}

impl fmt::Display for ViewMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ViewMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ViewMode::ALL
            .into_iter()
            .find(|mode| mode.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown view mode '{s}' (casual, surfer, everything, custom)"))
    }
}

/// Display unit for wind speed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WindUnit {
    #[default]
    Kmh,
    Knots,
    Ms,
}

impl WindUnit {
    pub fn label(self) -> &'static str {
        match self {
            WindUnit::Kmh => "km/h",
            WindUnit::Knots => "kn",
            WindUnit::Ms => "m/s",
        }
    }
}

impl FromStr for WindUnit {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "kmh" | "km/h" | "kph" => Ok(WindUnit::Kmh),
            "knots" | "kn" | "kt" => Ok(WindUnit::Knots),
            "ms" | "m/s" => Ok(WindUnit::Ms),
            other => Err(format!("unknown wind unit '{other}' (kmh, knots, ms)")),
        }
    }
}

/// Display unit for temperature.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TempUnit {
    #[default]
    Celsius,
    Fahrenheit,
    Kelvin,
}

impl TempUnit {
    pub fn label(self) -> &'static str {
        match self {
            TempUnit::Celsius => "°C",
            TempUnit::Fahrenheit => "°F",
            TempUnit::Kelvin => " K",
        }
    }
}

impl FromStr for TempUnit {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "c" | "celsius" => Ok(TempUnit::Celsius),
            "f" | "fahrenheit" => Ok(TempUnit::Fahrenheit),
            "k" | "kelvin" => Ok(TempUnit::Kelvin),
            other => Err(format!("unknown temperature unit '{other}' (c, f, k)")),
        }
    }
}

/// The pair of unit preferences threaded through formatting.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Units {
    pub wind: WindUnit,
    pub temp: TempUnit,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_view_mode_parse() {
        assert_eq!("surfer".parse::<ViewMode>(), Ok(ViewMode::Surfer));
        assert_eq!("Everything".parse::<ViewMode>(), Ok(ViewMode::Everything));
        assert!("chart".parse::<ViewMode>().is_err());
    }

    #[test]
    fn test_unit_parse_aliases() {
        assert_eq!("km/h".parse::<WindUnit>(), Ok(WindUnit::Kmh));
        assert_eq!("kt".parse::<WindUnit>(), Ok(WindUnit::Knots));
        assert_eq!("K".parse::<TempUnit>(), Ok(TempUnit::Kelvin));
    }

    #[test]
    fn test_location_label_skips_duplicates() {
        let location = Location {
            region: Some("Portland".to_string()),
            ..Location::default()
        };
        assert_eq!(location.label(), "Portland, United States");
        assert_eq!(Location::default().label(), "Portland, Maine, United States");
    }

    #[test]
    fn test_view_mode_serializes_lowercase() {
        let json = serde_json::to_string(&ViewMode::Surfer).unwrap();
        assert_eq!(json, "\"surfer\"");
    }
}
