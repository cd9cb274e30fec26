//! # Message Composition
//!
//! Builds the condensed multi-line text summary that is pushed to
//! notification sinks. One pure function, one formatting branch per
//! [`ViewMode`]:
//!
//! - **casual**: location, local time, wind, temperature, rain/clear indicator
//! - **surfer**: casual plus a wind-strength rating, shore-relative wind
//!   classification and a water-surface description from wave height
//! - **everything**: every field present in the sample
//! - **custom**: same as casual
//!
//! Numbers are rounded to whole units except wave height, sea-surface
//! temperature and visibility, which keep one decimal.

use crate::units::{
    compass, format_temp, format_temp_precise, format_visibility, format_wind,
    format_wind_with_direction, whole, PLACEHOLDER,
};
use crate::{ForecastBundle, HourlySample, Units, ViewMode};

/// Precipitation probability above which the summary reports rain.
pub const RAIN_THRESHOLD_PCT: f64 = 30.0;

/// Wind speed bands, km/h.
const LIGHT_BELOW_KMH: f64 = 16.0;
const MODERATE_BELOW_KMH: f64 = 30.0;

/// Wave height bands, m.
const SMOOTH_BELOW_M: f64 = 0.3;
const CHOPPY_BELOW_M: f64 = 0.8;

/// Qualitative wind strength from a km/h speed.
pub fn wind_rating(kmh: f64) -> &'static str {
    if kmh < LIGHT_BELOW_KMH {
        "Light"
    } else if kmh < MODERATE_BELOW_KMH {
        "Moderate"
    } else {
        "Strong+"
    }
}

/// Qualitative water surface from a wave height in metres.
pub fn water_surface(wave_height_m: f64) -> &'static str {
    if wave_height_m < SMOOTH_BELOW_M {
        "Smooth"
    } else if wave_height_m < CHOPPY_BELOW_M {
        "Choppy"
    } else {
        "Rough"
    }
}

/// Fixed compass heuristic: wind from `[315°, 45°)` or `[135°, 225°)` counts as
/// side-onshore. It ignores the real shoreline bearing at the location.
pub fn is_side_onshore(degrees: f64) -> bool {
    let d = degrees.rem_euclid(360.0);
    !(45.0..315.0).contains(&d) || (135.0..225.0).contains(&d)
}

/// Shore-relative label for a wind direction.
pub fn shore_wind(degrees: f64) -> &'static str {
    if is_side_onshore(degrees) {
        "Side-onshore"
    } else {
        "Cross-shore"
    }
}

/// "Rain N%" when the probability exceeds the threshold, otherwise "Clear".
pub fn precipitation_indicator(probability: Option<f64>) -> String {
    match probability {
        Some(p) if p > RAIN_THRESHOLD_PCT => format!("Rain {}%", whole(p)),
        _ => "Clear".to_string(),
    }
}

/// Compose the summary for `sample` at the bundle's location.
///
/// Returns an empty string when there is no current sample.
pub fn compose(
    bundle: &ForecastBundle,
    sample: Option<&HourlySample>,
    units: Units,
    mode: ViewMode,
) -> String {
    let Some(sample) = sample else {
        return String::new();
    };

    let lines = match mode {
        ViewMode::Casual | ViewMode::Custom => casual(bundle, sample, units),
        ViewMode::Surfer => surfer(bundle, sample, units),
        ViewMode::Everything => everything(bundle, sample, units),
    };
    lines.join("\n")
}

fn header(bundle: &ForecastBundle, sample: &HourlySample) -> Vec<String> {
    vec![
        bundle.location.label(),
        sample.time.format("%a %H:%M").to_string(),
    ]
}

fn casual(bundle: &ForecastBundle, sample: &HourlySample, units: Units) -> Vec<String> {
    let mut lines = header(bundle, sample);
    lines.push(format!(
        "Wind: {}",
        format_wind_with_direction(sample.wind_speed, sample.wind_direction, units.wind)
    ));
    lines.push(format!("Temp: {}", format_temp(sample.temperature, units.temp)));
    lines.push(precipitation_indicator(sample.precipitation_probability));
    lines
}

fn surfer(bundle: &ForecastBundle, sample: &HourlySample, units: Units) -> Vec<String> {
    let mut lines = header(bundle, sample);
    lines.push(format!(
        "Wind: {} ({})",
        format_wind_with_direction(sample.wind_speed, sample.wind_direction, units.wind),
        wind_rating(sample.wind_speed)
    ));
    lines.push(format!("Shore: {}", shore_wind(sample.wind_direction)));

    let waves = match sample.wave_height {
        Some(height) => {
            let mut text = format!("{:.1} m {}", height, water_surface(height));
            if let Some(period) = sample.wave_period {
                text.push_str(&format!(", {} s", whole(period)));
            }
            if let Some(direction) = sample.wave_direction {
                text.push_str(&format!(" from {}", compass(direction)));
            }
            text
        }
        None => PLACEHOLDER.to_string(),
    };
    lines.push(format!("Waves: {waves}"));

    if let Some(sst) = sample.sea_surface_temperature {
        lines.push(format!("Water: {}", format_temp_precise(sst, units.temp)));
    }
    lines.push(format!("Air: {}", format_temp(sample.temperature, units.temp)));
    lines.push(precipitation_indicator(sample.precipitation_probability));
    lines
}

fn everything(bundle: &ForecastBundle, sample: &HourlySample, units: Units) -> Vec<String> {
    let mut lines = header(bundle, sample);

    let mut wind = format!(
        "Wind: {}",
        format_wind_with_direction(sample.wind_speed, sample.wind_direction, units.wind)
    );
    if let Some(gusts) = sample.wind_gusts {
        wind.push_str(&format!(", gusts {}", format_wind(gusts, units.wind)));
    }
    lines.push(wind);
    lines.push(format!("Temp: {}", format_temp(sample.temperature, units.temp)));
    lines.push(format!("Humidity: {}%", whole(sample.humidity)));
    lines.push(format!("Cloud cover: {}%", whole(sample.cloud_cover)));

    if let Some(probability) = sample.precipitation_probability {
        lines.push(format!("Precipitation chance: {}%", whole(probability)));
    }
    if let Some(amount) = sample.precipitation {
        lines.push(format!("Precipitation: {} mm", whole(amount)));
    }
    if let Some(pressure) = sample.pressure {
        lines.push(format!("Pressure: {} hPa", whole(pressure)));
    }
    if let Some(visibility) = sample.visibility {
        lines.push(format!("Visibility: {}", format_visibility(visibility)));
    }
    if let Some(uv) = sample.uv_index {
        lines.push(format!("UV index: {}", whole(uv)));
    }
    if let Some(height) = sample.wave_height {
        lines.push(format!("Wave height: {height:.1} m"));
    }
    if let Some(period) = sample.wave_period {
        lines.push(format!("Wave period: {} s", whole(period)));
    }
    if let Some(direction) = sample.wave_direction {
        lines.push(format!("Wave direction: {}", compass(direction)));
    }
    if let Some(sst) = sample.sea_surface_temperature {
        lines.push(format!("Sea temp: {}", format_temp_precise(sst, units.temp)));
    }
    lines
}
