//! # Persistent Settings
//!
//! User preferences are grouped into independent domains, each stored as its
//! own JSON entry so one corrupted value never takes the others down. Reads
//! never fail: a missing or unparseable entry falls back to the domain's
//! default and the problem is only logged.
//!
//! The storage backend is the [`SettingsStore`] trait. The binary uses
//! [`FileStore`] (one `<key>.json` per domain); tests use [`MemoryStore`].

use crate::schedule::NotificationSchedule;
use crate::{Location, TempUnit, ViewMode, WindUnit};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::{fs, io};
use thiserror::Error;
use tracing::debug;

/// Storage key of each settings domain.
pub mod keys {
    pub const WIND_UNIT: &str = "wind-unit";
    pub const TEMP_UNIT: &str = "temp-unit";
    pub const THEME: &str = "theme";
    pub const VIEW_MODE: &str = "view-mode";
    pub const CARD_TOGGLES: &str = "card-toggles";
    pub const PUBSUB: &str = "pubsub";
    pub const WEBHOOK: &str = "webhook";
    pub const LOCATION: &str = "location";
    pub const SAVED_LOCATIONS: &str = "saved-locations";
    pub const CUSTOM_FIELDS: &str = "custom-fields";
    pub const SHOW_HOURLY: &str = "show-hourly";
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("store IO: {0}")]
    Io(#[from] io::Error),

    #[error("serialize: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Raw key/value persistence.
pub trait SettingsStore {
    /// The stored text for `key`, if any.
    fn load_raw(&self, key: &str) -> Option<String>;

    /// Replace the stored text for `key`.
    fn save_raw(&self, key: &str, value: &str) -> Result<(), StoreError>;
}

/// Read and decode one domain, falling back to `default` on any problem.
pub fn load_or_default<T, S>(store: &S, key: &str, default: T) -> T
where
    T: DeserializeOwned,
    S: SettingsStore + ?Sized,
{
    let Some(raw) = store.load_raw(key) else {
        return default;
    };
    match serde_json::from_str(&raw) {
        Ok(value) => value,
        Err(e) => {
            debug!("Ignoring unreadable setting '{}': {}", key, e);
            default
        }
    }
}

/// Encode and write one domain.
pub fn save<T, S>(store: &S, key: &str, value: &T) -> Result<(), StoreError>
where
    T: Serialize,
    S: SettingsStore + ?Sized,
{
    let raw = serde_json::to_string(value)?;
    store.save_raw(key, &raw)
}

/// Directory-backed store: `<dir>/<key>.json`.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new<P: Into<PathBuf>>(dir: P) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

impl SettingsStore for FileStore {
    fn load_raw(&self, key: &str) -> Option<String> {
        fs::read_to_string(self.path(key)).ok()
    }

    fn save_raw(&self, key: &str, value: &str) -> Result<(), StoreError> {
        fs::create_dir_all(&self.dir)?;
        fs::write(self.path(key), value)?;
        Ok(())
    }
}

/// In-memory store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SettingsStore for MemoryStore {
    fn load_raw(&self, key: &str) -> Option<String> {
        self.entries
            .lock()
            .ok()
            .and_then(|entries| entries.get(key).cloned())
    }

    fn save_raw(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| io::Error::other("memory store poisoned"))?;
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// Dashboard color treatment.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Dark,
    Light,
}

impl std::str::FromStr for Theme {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "dark" => Ok(Theme::Dark),
            "light" => Ok(Theme::Light),
            other => Err(format!("unknown theme '{other}' (dark, light)")),
        }
    }
}

/// Which dashboard cards a view mode shows.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CardToggles {
    pub tides: bool,
    pub astro: bool,
    pub marine: bool,
}

impl Default for CardToggles {
    fn default() -> Self {
        Self {
            tides: true,
            astro: true,
            marine: true,
        }
    }
}

/// Dashboard card identifiers that can be toggled per view mode.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Card {
    Tides,
    Astro,
    Marine,
}

impl std::str::FromStr for Card {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "tides" => Ok(Card::Tides),
            "astro" => Ok(Card::Astro),
            "marine" => Ok(Card::Marine),
            other => Err(format!("unknown card '{other}' (tides, astro, marine)")),
        }
    }
}

impl CardToggles {
    pub fn set(&mut self, card: Card, on: bool) {
        match card {
            Card::Tides => self.tides = on,
            Card::Astro => self.astro = on,
            Card::Marine => self.marine = on,
        }
    }
}

/// Fields selectable for the custom view's current-conditions card.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    Wind,
    Gusts,
    Temperature,
    Humidity,
    CloudCover,
    Precipitation,
    Pressure,
    Visibility,
    UvIndex,
    WaveHeight,
    WavePeriod,
    SeaTemperature,
}

impl Field {
    pub const ALL: [Field; 12] = [
        Field::Wind,
        Field::Gusts,
        Field::Temperature,
        Field::Humidity,
        Field::CloudCover,
        Field::Precipitation,
        Field::Pressure,
        Field::Visibility,
        Field::UvIndex,
        Field::WaveHeight,
        Field::WavePeriod,
        Field::SeaTemperature,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Field::Wind => "wind",
            Field::Gusts => "gusts",
            Field::Temperature => "temperature",
            Field::Humidity => "humidity",
            Field::CloudCover => "cloud_cover",
            Field::Precipitation => "precipitation",
            Field::Pressure => "pressure",
            Field::Visibility => "visibility",
            Field::UvIndex => "uv_index",
            Field::WaveHeight => "wave_height",
            Field::WavePeriod => "wave_period",
            Field::SeaTemperature => "sea_temperature",
        }
    }
}

impl std::str::FromStr for Field {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().replace('-', "_").to_ascii_lowercase();
        Field::ALL
            .into_iter()
            .find(|f| f.as_str() == wanted)
            .ok_or_else(|| format!("unknown field '{s}'"))
    }
}

fn default_custom_fields() -> Vec<Field> {
    vec![Field::Wind, Field::Temperature, Field::WaveHeight]
}

/// Pub/sub sink configuration.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PubSubSettings {
    pub enabled: bool,
    /// Topic path segment appended to the base URL
    pub topic: String,
    pub schedule: NotificationSchedule,
}

/// Webhook sink configuration.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WebhookSettings {
    pub enabled: bool,
    pub url: String,
    pub schedule: NotificationSchedule,
}

/// Every persisted settings domain.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    pub wind_unit: WindUnit,
    pub temp_unit: TempUnit,
    pub theme: Theme,
    pub view_mode: ViewMode,
    pub card_toggles: BTreeMap<ViewMode, CardToggles>,
    pub pubsub: PubSubSettings,
    pub webhook: WebhookSettings,
    pub location: Location,
    pub saved_locations: Vec<Location>,
    pub custom_fields: Vec<Field>,
    pub show_hourly: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            wind_unit: WindUnit::default(),
            temp_unit: TempUnit::default(),
            theme: Theme::default(),
            view_mode: ViewMode::default(),
            card_toggles: BTreeMap::new(),
            pubsub: PubSubSettings::default(),
            webhook: WebhookSettings::default(),
            location: Location::default(),
            saved_locations: Vec::new(),
            custom_fields: default_custom_fields(),
            show_hourly: true,
        }
    }
}

impl Settings {
    /// Read every domain, each falling back to its own default.
    pub fn load<S: SettingsStore + ?Sized>(store: &S) -> Self {
        let d = Settings::default();
        Self {
            wind_unit: load_or_default(store, keys::WIND_UNIT, d.wind_unit),
            temp_unit: load_or_default(store, keys::TEMP_UNIT, d.temp_unit),
            theme: load_or_default(store, keys::THEME, d.theme),
            view_mode: load_or_default(store, keys::VIEW_MODE, d.view_mode),
            card_toggles: load_or_default(store, keys::CARD_TOGGLES, d.card_toggles),
            pubsub: load_or_default(store, keys::PUBSUB, d.pubsub),
            webhook: load_or_default(store, keys::WEBHOOK, d.webhook),
            location: load_or_default(store, keys::LOCATION, d.location),
            saved_locations: load_or_default(store, keys::SAVED_LOCATIONS, d.saved_locations),
            custom_fields: load_or_default(store, keys::CUSTOM_FIELDS, d.custom_fields),
            show_hourly: load_or_default(store, keys::SHOW_HOURLY, d.show_hourly),
        }
    }

    /// Write a single domain.
    pub fn save_domain<S: SettingsStore + ?Sized>(
        &self,
        store: &S,
        key: &str,
    ) -> Result<(), StoreError> {
        match key {
            keys::WIND_UNIT => save(store, key, &self.wind_unit),
            keys::TEMP_UNIT => save(store, key, &self.temp_unit),
            keys::THEME => save(store, key, &self.theme),
            keys::VIEW_MODE => save(store, key, &self.view_mode),
            keys::CARD_TOGGLES => save(store, key, &self.card_toggles),
            keys::PUBSUB => save(store, key, &self.pubsub),
            keys::WEBHOOK => save(store, key, &self.webhook),
            keys::LOCATION => save(store, key, &self.location),
            keys::SAVED_LOCATIONS => save(store, key, &self.saved_locations),
            keys::CUSTOM_FIELDS => save(store, key, &self.custom_fields),
            keys::SHOW_HOURLY => save(store, key, &self.show_hourly),
            other => Err(io::Error::other(format!("unknown settings key '{other}'")).into()),
        }
    }

    /// Write every domain.
    pub fn save_all<S: SettingsStore + ?Sized>(&self, store: &S) -> Result<(), StoreError> {
        for key in [
            keys::WIND_UNIT,
            keys::TEMP_UNIT,
            keys::THEME,
            keys::VIEW_MODE,
            keys::CARD_TOGGLES,
            keys::PUBSUB,
            keys::WEBHOOK,
            keys::LOCATION,
            keys::SAVED_LOCATIONS,
            keys::CUSTOM_FIELDS,
            keys::SHOW_HOURLY,
        ] {
            self.save_domain(store, key)?;
        }
        Ok(())
    }

    /// Card toggles for a view mode, defaulting to everything on.
    pub fn cards(&self, mode: ViewMode) -> CardToggles {
        self.card_toggles.get(&mode).copied().unwrap_or_default()
    }
}
