//! # Application Controller
//!
//! All mutable state lives in one [`AppState`] owned by an [`App`]. Settings
//! changes go through [`reduce`], a pure function that applies an [`Action`]
//! and reports which settings domain changed; the controller then persists
//! exactly that domain through the injected [`SettingsStore`].
//!
//! Forecast refreshes are sequenced with generation tokens: each
//! [`App::begin_refresh`] hands out a new token and only the result carrying
//! the latest token is applied. A slow fetch for a location the user already
//! switched away from is dropped instead of overwriting the newer bundle.

use crate::current::nearest_sample;
use crate::forecast::ForecastError;
use crate::message;
use crate::notify::{Dispatch, Trigger};
use crate::settings::{
    keys, Card, Field, PubSubSettings, Settings, SettingsStore, StoreError, Theme,
    WebhookSettings,
};
use crate::{ForecastBundle, HourlySample, Location, TempUnit, Units, ViewMode, WindUnit};
use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

/// A user-initiated settings change.
#[derive(Clone, Debug, PartialEq)]
pub enum Action {
    SetWindUnit(WindUnit),
    SetTempUnit(TempUnit),
    SetTheme(Theme),
    SetViewMode(ViewMode),
    SetCard {
        mode: ViewMode,
        card: Card,
        on: bool,
    },
    SetShowHourly(bool),
    SetCustomFields(Vec<Field>),
    /// Make an ad hoc location (e.g. a search result) current
    UseLocation(Location),
    /// Add a location to the saved set
    SaveLocation(Location),
    /// Make a saved location current
    SelectSaved(u64),
    /// Remove a location from the saved set
    DeleteSaved(u64),
    SetPubSub(PubSubSettings),
    SetWebhook(WebhookSettings),
}

fn replace<T: PartialEq>(slot: &mut T, value: T, key: &'static str) -> Option<&'static str> {
    if *slot == value {
        None
    } else {
        *slot = value;
        Some(key)
    }
}

/// Apply `action` to `settings`.
///
/// Returns the key of the domain that changed, or `None` when the action was
/// a no-op.
pub fn reduce(settings: &mut Settings, action: Action) -> Option<&'static str> {
    match action {
        Action::SetWindUnit(unit) => replace(&mut settings.wind_unit, unit, keys::WIND_UNIT),
        Action::SetTempUnit(unit) => replace(&mut settings.temp_unit, unit, keys::TEMP_UNIT),
        Action::SetTheme(theme) => replace(&mut settings.theme, theme, keys::THEME),
        Action::SetViewMode(mode) => replace(&mut settings.view_mode, mode, keys::VIEW_MODE),
        Action::SetCard { mode, card, on } => {
            let mut cards = settings.cards(mode);
            cards.set(card, on);
            if settings.card_toggles.get(&mode) == Some(&cards) {
                return None;
            }
            settings.card_toggles.insert(mode, cards);
            Some(keys::CARD_TOGGLES)
        }
        Action::SetShowHourly(on) => replace(&mut settings.show_hourly, on, keys::SHOW_HOURLY),
        Action::SetCustomFields(fields) => {
            let mut unique = Vec::with_capacity(fields.len());
            for field in fields {
                if !unique.contains(&field) {
                    unique.push(field);
                }
            }
            replace(&mut settings.custom_fields, unique, keys::CUSTOM_FIELDS)
        }
        Action::UseLocation(location) => replace(&mut settings.location, location, keys::LOCATION),
        Action::SaveLocation(location) => {
            if settings.saved_locations.iter().any(|l| l.id == location.id) {
                return None;
            }
            settings.saved_locations.push(location);
            Some(keys::SAVED_LOCATIONS)
        }
        Action::SelectSaved(id) => {
            let location = settings
                .saved_locations
                .iter()
                .find(|l| l.id == id)?
                .clone();
            replace(&mut settings.location, location, keys::LOCATION)
        }
        Action::DeleteSaved(id) => {
            let before = settings.saved_locations.len();
            settings.saved_locations.retain(|l| l.id != id);
            (settings.saved_locations.len() != before).then_some(keys::SAVED_LOCATIONS)
        }
        Action::SetPubSub(pubsub) => replace(&mut settings.pubsub, pubsub, keys::PUBSUB),
        Action::SetWebhook(webhook) => replace(&mut settings.webhook, webhook, keys::WEBHOOK),
    }
}

/// Handle for one in-flight forecast refresh.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RefreshToken {
    generation: u64,
}

#[derive(Debug, Default)]
pub struct AppState {
    pub settings: Settings,
    /// Last successfully fetched forecast, kept across failed refreshes
    pub bundle: Option<ForecastBundle>,
    /// Error from the most recent refresh, cleared on success
    pub error: Option<String>,
    /// Generation of the most recently started refresh
    pub generation: u64,
}

pub struct App<S: SettingsStore> {
    store: S,
    state: AppState,
}

impl<S: SettingsStore> App<S> {
    /// Load every settings domain from `store`.
    pub fn new(store: S) -> Self {
        let settings = Settings::load(&store);
        debug!("Loaded settings; current location {}", settings.location.label());
        Self {
            store,
            state: AppState {
                settings,
                ..AppState::default()
            },
        }
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    pub fn settings(&self) -> &Settings {
        &self.state.settings
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn units(&self) -> Units {
        Units {
            wind: self.state.settings.wind_unit,
            temp: self.state.settings.temp_unit,
        }
    }

    /// Apply a settings action and persist the changed domain.
    ///
    /// Returns whether anything changed. A location change invalidates any
    /// refresh still in flight.
    pub fn apply(&mut self, action: Action) -> Result<bool, StoreError> {
        let Some(key) = reduce(&mut self.state.settings, action) else {
            return Ok(false);
        };
        self.state.settings.save_domain(&self.store, key)?;
        debug!("Persisted setting '{}'", key);

        if key == keys::LOCATION {
            info!("Location changed to {}", self.state.settings.location.label());
            self.state.generation += 1;
        }
        Ok(true)
    }

    /// Re-read every settings domain, picking up changes made by another process.
    /// Returns whether the current location changed.
    pub fn reload_settings(&mut self) -> bool {
        let settings = Settings::load(&self.store);
        let moved = settings.location != self.state.settings.location;
        if moved {
            self.state.generation += 1;
        }
        self.state.settings = settings;
        moved
    }

    /// Show an older bundle (e.g. from an expired cache) when nothing else is
    /// loaded. Any refresh error stays visible.
    pub fn restore_stale(&mut self, bundle: ForecastBundle) {
        if self.state.bundle.is_none() {
            self.state.bundle = Some(bundle);
        }
    }

    /// Start a refresh for the current location.
    pub fn begin_refresh(&mut self) -> RefreshToken {
        self.state.generation += 1;
        RefreshToken {
            generation: self.state.generation,
        }
    }

    /// Apply a refresh result if `token` is still the latest.
    ///
    /// On failure the previous bundle stays and the error is recorded. Returns
    /// whether the result was applied.
    pub fn complete_refresh(
        &mut self,
        token: RefreshToken,
        result: Result<ForecastBundle, ForecastError>,
    ) -> bool {
        if token.generation != self.state.generation {
            debug!(
                "Discarding stale refresh (generation {} < {})",
                token.generation, self.state.generation
            );
            return false;
        }
        match result {
            Ok(bundle) => {
                self.state.bundle = Some(bundle);
                self.state.error = None;
            }
            Err(e) => {
                warn!("Forecast refresh failed: {}", e);
                self.state.error = Some(e.to_string());
            }
        }
        true
    }

    /// The sample nearest to `now`, if a bundle is loaded.
    pub fn current_sample(&self, now: DateTime<Utc>) -> Option<&HourlySample> {
        let bundle = self.state.bundle.as_ref()?;
        nearest_sample(&bundle.samples, now)
    }

    /// Summary for the current sample in the active view mode; empty when there
    /// is nothing to report.
    pub fn compose_message(&self, now: DateTime<Utc>) -> String {
        let Some(bundle) = self.state.bundle.as_ref() else {
            return String::new();
        };
        message::compose(
            bundle,
            nearest_sample(&bundle.samples, now),
            self.units(),
            self.state.settings.view_mode,
        )
    }

    /// Package the current summary for the sinks; `None` when it is empty.
    pub fn dispatch(&self, now: DateTime<Utc>, trigger: Trigger) -> Option<Dispatch> {
        let message = self.compose_message(now);
        if message.is_empty() {
            return None;
        }
        let location = self
            .state
            .bundle
            .as_ref()
            .map(|b| b.location.label())
            .unwrap_or_else(|| self.state.settings.location.label());
        Some(Dispatch {
            message,
            location,
            timestamp: now,
            trigger,
        })
    }
}
