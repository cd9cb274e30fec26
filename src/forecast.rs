//! # Forecast and Geocoding Data Source
//!
//! This module handles all network operations for the dashboard: hourly
//! weather and marine forecasts for a coordinate pair, and free-text location
//! search. It also keeps a small on-disk cache of the most recent bundle per
//! location.
//!
//! ## Data Sources
//!
//! ### Open-Meteo
//! - **Weather**: `/v1/forecast` hourly series plus daily sunrise/sunset
//! - **Marine**: `/v1/marine` hourly wave and sea-surface series
//! - **Geocoding**: `/v1/search` candidate locations for a query
//!
//! Each forecast endpoint returns parallel arrays keyed by an hourly `time`
//! array of local timestamps ("2025-07-24T09:00"). Those are resolved against
//! the response's IANA zone, so a window that crosses a DST change keeps
//! every hour on its true instant.
//!
//! ### Processing Pipeline
//! 1. **Fetch**: both forecast GETs run concurrently
//! 2. **Decode**: every per-hour value is an `Option`, so nulls and missing
//!    arrays become absent fields instead of errors
//! 3. **Merge**: series are aligned by exact timestamp-string equality; hours
//!    missing from the marine series keep absent marine fields
//! 4. **Cache**: the bundle is written to `forecast-<id>.json` for the TTL
//!
//! ## Error Handling
//! - **Weather failure**: the whole fetch fails ([`ForecastError`])
//! - **Marine failure**: logged and treated as "no marine coverage"
//! - **Cache failure**: never fatal; a bad cache file is ignored

use crate::config::ProviderConfig;
use crate::{ForecastBundle, HourlySample, Location};
use chrono::{DateTime, FixedOffset, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use std::{fs, io};
use thiserror::Error;
use tracing::{debug, info, warn};

const WEATHER_FIELDS: &str = "temperature_2m,relative_humidity_2m,cloud_cover,\
precipitation_probability,precipitation,pressure_msl,visibility,wind_speed_10m,\
wind_direction_10m,wind_gusts_10m,uv_index";

const MARINE_FIELDS: &str = "wave_height,wave_direction,wave_period,sea_surface_temperature";

const DAILY_FIELDS: &str = "sunrise,sunset";

const LOCAL_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M";

/// Errors that can occur while fetching or decoding forecast data.
#[derive(Error, Debug)]
pub enum ForecastError {
    /// Transport failure (DNS, connect, timeout, TLS) or undecodable body
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Provider answered with a non-success status
    #[error("{endpoint} returned HTTP {status}")]
    Status { endpoint: &'static str, status: u16 },

    /// A timestamp or UTC offset in the response could not be interpreted
    #[error("invalid timestamp '{0}'")]
    Timestamp(String),
}

// -- Provider response records --

/// Weather endpoint response.
#[derive(Debug, Deserialize)]
pub struct WeatherResponse {
    pub utc_offset_seconds: i32,
    #[serde(default)]
    pub timezone: Option<String>,
    #[serde(default)]
    pub hourly: WeatherHourly,
    #[serde(default)]
    pub daily: Option<DailyAstro>,
}

#[derive(Debug, Default, Deserialize)]
pub struct WeatherHourly {
    #[serde(default)]
    pub time: Vec<String>,
    #[serde(default, rename = "temperature_2m")]
    pub temperature: Vec<Option<f64>>,
    #[serde(default, rename = "relative_humidity_2m")]
    pub humidity: Vec<Option<f64>>,
    #[serde(default)]
    pub cloud_cover: Vec<Option<f64>>,
    #[serde(default)]
    pub precipitation_probability: Vec<Option<f64>>,
    #[serde(default)]
    pub precipitation: Vec<Option<f64>>,
    #[serde(default, rename = "pressure_msl")]
    pub pressure: Vec<Option<f64>>,
    #[serde(default)]
    pub visibility: Vec<Option<f64>>,
    #[serde(default, rename = "wind_speed_10m")]
    pub wind_speed: Vec<Option<f64>>,
    #[serde(default, rename = "wind_direction_10m")]
    pub wind_direction: Vec<Option<f64>>,
    #[serde(default, rename = "wind_gusts_10m")]
    pub wind_gusts: Vec<Option<f64>>,
    #[serde(default)]
    pub uv_index: Vec<Option<f64>>,
}

#[derive(Debug, Default, Deserialize)]
pub struct DailyAstro {
    #[serde(default)]
    pub sunrise: Vec<Option<String>>,
    #[serde(default)]
    pub sunset: Vec<Option<String>>,
}

/// Marine endpoint response.
#[derive(Debug, Default, Deserialize)]
pub struct MarineResponse {
    #[serde(default)]
    pub hourly: MarineHourly,
}

#[derive(Debug, Default, Deserialize)]
pub struct MarineHourly {
    #[serde(default)]
    pub time: Vec<String>,
    #[serde(default)]
    pub wave_height: Vec<Option<f64>>,
    #[serde(default)]
    pub wave_direction: Vec<Option<f64>>,
    #[serde(default)]
    pub wave_period: Vec<Option<f64>>,
    #[serde(default)]
    pub sea_surface_temperature: Vec<Option<f64>>,
}

/// Geocoding endpoint response.
#[derive(Debug, Deserialize)]
pub struct GeocodingResponse {
    #[serde(default)]
    pub results: Vec<GeocodingResult>,
}

#[derive(Debug, Deserialize)]
pub struct GeocodingResult {
    pub id: u64,
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub timezone: Option<String>,
    #[serde(default)]
    pub admin1: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
}

impl From<GeocodingResult> for Location {
    fn from(result: GeocodingResult) -> Self {
        Location {
            id: result.id,
            name: result.name,
            region: result.admin1,
            country: result.country,
            latitude: result.latitude,
            longitude: result.longitude,
            timezone: result.timezone.unwrap_or_else(|| "auto".to_string()),
        }
    }
}

fn at(series: &[Option<f64>], index: usize) -> Option<f64> {
    series.get(index).copied().flatten()
}

/// The zone used to turn provider-local timestamps into instants.
#[derive(Debug, Clone, Copy)]
pub struct LocalZone {
    tz: Option<Tz>,
    fallback: FixedOffset,
}

impl LocalZone {
    /// Resolve by IANA name, keeping `fallback` for unknown names and for
    /// local times that fall in a DST gap.
    pub fn new(name: Option<&str>, fallback: FixedOffset) -> Self {
        let tz = name.and_then(|n| match n.parse::<Tz>() {
            Ok(tz) => Some(tz),
            Err(_) => {
                debug!("Unknown timezone '{}', using fixed offset {}", n, fallback);
                None
            }
        });
        Self { tz, fallback }
    }

    fn from_response(weather: &WeatherResponse) -> Result<Self, ForecastError> {
        let fallback = FixedOffset::east_opt(weather.utc_offset_seconds)
            .ok_or_else(|| ForecastError::Timestamp(weather.utc_offset_seconds.to_string()))?;
        Ok(Self::new(weather.timezone.as_deref(), fallback))
    }

    /// Ambiguous hours (the repeated hour when clocks go back) take the
    /// earlier instant.
    fn resolve(&self, naive: &NaiveDateTime) -> Option<DateTime<FixedOffset>> {
        match self.tz {
            Some(tz) => tz
                .from_local_datetime(naive)
                .earliest()
                .map(|t| t.fixed_offset())
                .or_else(|| self.fallback.from_local_datetime(naive).single()),
            None => self.fallback.from_local_datetime(naive).single(),
        }
    }
}

/// Interpret a provider-local timestamp in the given zone.
pub fn parse_local(raw: &str, zone: &LocalZone) -> Result<DateTime<FixedOffset>, ForecastError> {
    let naive = NaiveDateTime::parse_from_str(raw, LOCAL_TIME_FORMAT)
        .map_err(|_| ForecastError::Timestamp(raw.to_string()))?;
    zone.resolve(&naive)
        .ok_or_else(|| ForecastError::Timestamp(raw.to_string()))
}

/// Merge the weather and marine series into one bundle.
///
/// Alignment is by exact equality of the raw timestamp strings. Weather hours
/// with a null required field are dropped; marine-only hours are ignored.
pub fn merge(
    location: &Location,
    weather: &WeatherResponse,
    marine: Option<&MarineResponse>,
) -> Result<ForecastBundle, ForecastError> {
    let zone = LocalZone::from_response(weather)?;

    let marine_index: HashMap<&str, usize> = marine
        .map(|m| {
            m.hourly
                .time
                .iter()
                .enumerate()
                .map(|(i, t)| (t.as_str(), i))
                .collect()
        })
        .unwrap_or_default();

    let w = &weather.hourly;
    let mut samples = Vec::with_capacity(w.time.len());

    for (i, raw_time) in w.time.iter().enumerate() {
        let (Some(wind_speed), Some(wind_direction), Some(temperature)) = (
            at(&w.wind_speed, i),
            at(&w.wind_direction, i),
            at(&w.temperature, i),
        ) else {
            debug!("Skipping {} with missing required weather fields", raw_time);
            continue;
        };

        let mut sample = HourlySample {
            time: parse_local(raw_time, &zone)?,
            wind_speed,
            wind_gusts: at(&w.wind_gusts, i),
            wind_direction,
            temperature,
            humidity: at(&w.humidity, i).unwrap_or(0.0),
            cloud_cover: at(&w.cloud_cover, i).unwrap_or(0.0),
            precipitation_probability: at(&w.precipitation_probability, i),
            precipitation: at(&w.precipitation, i),
            pressure: at(&w.pressure, i),
            visibility: at(&w.visibility, i),
            wave_height: None,
            wave_direction: None,
            wave_period: None,
            sea_surface_temperature: None,
            uv_index: at(&w.uv_index, i),
        };

        if let (Some(m), Some(&j)) = (marine, marine_index.get(raw_time.as_str())) {
            sample.wave_height = at(&m.hourly.wave_height, j);
            sample.wave_direction = at(&m.hourly.wave_direction, j);
            sample.wave_period = at(&m.hourly.wave_period, j);
            sample.sea_surface_temperature = at(&m.hourly.sea_surface_temperature, j);
        }

        samples.push(sample);
    }

    // Providers return ascending series; a stable sort keeps ties in order
    samples.sort_by_key(|s| s.time);

    let (sunrise, sunset) = match &weather.daily {
        Some(daily) => (
            first_day(&daily.sunrise, &zone)?,
            first_day(&daily.sunset, &zone)?,
        ),
        None => (None, None),
    };

    Ok(ForecastBundle {
        location: location.clone(),
        samples,
        sunrise,
        sunset,
        fetched_at: Utc::now(),
    })
}

fn first_day(
    series: &[Option<String>],
    zone: &LocalZone,
) -> Result<Option<DateTime<FixedOffset>>, ForecastError> {
    match series.first().and_then(|s| s.as_deref()) {
        Some(raw) => parse_local(raw, zone).map(Some),
        None => Ok(None),
    }
}

/// HTTP client for the forecast and geocoding providers.
pub struct ForecastClient {
    http: reqwest::Client,
    providers: ProviderConfig,
    cache_dir: Option<PathBuf>,
    cache_ttl: Duration,
}

impl ForecastClient {
    pub fn new(
        providers: ProviderConfig,
        user_agent: &str,
        cache_dir: Option<PathBuf>,
        cache_ttl: Duration,
    ) -> Result<Self, ForecastError> {
        let http = reqwest::Client::builder()
            .user_agent(user_agent)
            .timeout(Duration::from_secs(providers.timeout_secs))
            .build()?;
        Ok(Self {
            http,
            providers,
            cache_dir,
            cache_ttl,
        })
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        endpoint: &'static str,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<T, ForecastError> {
        let response = self.http.get(url).query(query).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ForecastError::Status {
                endpoint,
                status: status.as_u16(),
            });
        }
        Ok(response.json::<T>().await?)
    }

    fn forecast_query(location: &Location, hourly: &str) -> Vec<(&'static str, String)> {
        vec![
            ("latitude", location.latitude.to_string()),
            ("longitude", location.longitude.to_string()),
            ("timezone", location.timezone.clone()),
            ("hourly", hourly.to_string()),
        ]
    }

    /// Fetch and merge a fresh bundle from the network.
    pub async fn fetch(&self, location: &Location) -> Result<ForecastBundle, ForecastError> {
        info!("Fetching forecast for {}", location.label());

        let mut weather_query = Self::forecast_query(location, WEATHER_FIELDS);
        weather_query.push(("daily", DAILY_FIELDS.to_string()));
        weather_query.push(("forecast_days", self.providers.forecast_days.to_string()));
        let mut marine_query = Self::forecast_query(location, MARINE_FIELDS);
        marine_query.push(("forecast_days", self.providers.forecast_days.to_string()));

        let (weather, marine) = tokio::join!(
            self.get_json::<WeatherResponse>("weather", &self.providers.weather_url, &weather_query),
            self.get_json::<MarineResponse>("marine", &self.providers.marine_url, &marine_query),
        );

        let weather = weather?;
        let marine = match marine {
            Ok(marine) => Some(marine),
            Err(e) => {
                warn!("Marine data unavailable for {}: {}", location.label(), e);
                None
            }
        };

        let bundle = merge(location, &weather, marine.as_ref())?;
        debug!("Merged {} hourly samples", bundle.samples.len());
        Ok(bundle)
    }

    /// Cache-first fetch: a fresh cached bundle is returned without touching
    /// the network; otherwise fetch and refresh the cache.
    pub async fn fetch_cached(&self, location: &Location) -> Result<ForecastBundle, ForecastError> {
        if let Some(path) = self.cache_path(location) {
            match load_cache(&path, Some(self.cache_ttl)) {
                Ok(bundle) => {
                    debug!("Using cached forecast from {}", path.display());
                    return Ok(bundle);
                }
                Err(e) => debug!("Cache miss for {}: {}", path.display(), e),
            }
        }

        let bundle = self.fetch(location).await?;

        if let Some(path) = self.cache_path(location) {
            if let Err(e) = save_cache(&path, &bundle) {
                warn!("Could not write forecast cache {}: {}", path.display(), e);
            }
        }
        Ok(bundle)
    }

    /// The last cached bundle for a location regardless of age.
    pub fn cached(&self, location: &Location) -> Option<ForecastBundle> {
        let path = self.cache_path(location)?;
        load_cache(&path, None).ok()
    }

    /// Search the geocoder for candidate locations.
    pub async fn search(&self, query: &str) -> Result<Vec<Location>, ForecastError> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(Vec::new());
        }
        info!("Searching locations for '{}'", query);
        let params = [
            ("name", query.to_string()),
            ("count", self.providers.geocoding_count.to_string()),
            ("language", "en".to_string()),
            ("format", "json".to_string()),
        ];
        let response: GeocodingResponse = self
            .get_json("geocoding", &self.providers.geocoding_url, &params)
            .await?;
        Ok(response.results.into_iter().map(Location::from).collect())
    }

    fn cache_path(&self, location: &Location) -> Option<PathBuf> {
        self.cache_dir
            .as_ref()
            .map(|dir| dir.join(format!("forecast-{}.json", location.id)))
    }
}

/// Load a cached bundle, rejecting it if older than `ttl` (when given).
pub fn load_cache(path: &Path, ttl: Option<Duration>) -> Result<ForecastBundle, io::Error> {
    if let Some(ttl) = ttl {
        let modified = fs::metadata(path)?.modified()?;
        let age = SystemTime::now()
            .duration_since(modified)
            .map_err(|_| io::Error::other("time error"))?;
        if age > ttl {
            return Err(io::Error::other("stale"));
        }
    }

    let data = fs::read(path)?;
    let bundle = serde_json::from_slice(&data)?;
    Ok(bundle)
}

/// Write a bundle to the cache file.
pub fn save_cache(path: &Path, bundle: &ForecastBundle) -> Result<(), io::Error> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let data = serde_json::to_vec(bundle)?;
    fs::write(path, data)?;
    Ok(())
}
