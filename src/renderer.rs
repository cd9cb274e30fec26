//! # Terminal Dashboard Rendering
//!
//! Renders the application state as a plain-text dashboard:
//!
//! 1. Header with the location and active view mode
//! 2. Inline error banner when the last refresh failed (stale data stays)
//! 3. Current-conditions card, with fields chosen by the view mode
//! 4. Hourly table (optional)
//! 5. ASCII tide chart centred on "now" (optional, approximate model)
//! 6. Astronomy line (optional)
//!
//! The dark theme adds ANSI emphasis; the light theme is plain text.

use crate::app::AppState;
use crate::astro::{daylight, format_span, moon_phase, Daylight};
use crate::current::nearest_sample;
use crate::message::{precipitation_indicator, shore_wind, water_surface, wind_rating};
use crate::settings::{CardToggles, Field, Settings, Theme};
use crate::tide::{self, Trend};
use crate::units::{
    compass, format_optional, format_temp, format_temp_precise, format_visibility, format_wind,
    format_wind_with_direction, whole, PLACEHOLDER,
};
use crate::{ForecastBundle, HourlySample, Units, ViewMode};
use chrono::{DateTime, Duration, FixedOffset, Offset, Utc};

const CHART_ROWS: usize = 12;
const Y_AXIS_WIDTH: usize = 6;
/// Hours shown on each side of "now"
const CHART_HOURS: i64 = 12;
const CHART_STEP_MINUTES: i64 = 30;
const HOURLY_ROWS: usize = 12;

struct Style {
    ansi: bool,
}

impl Style {
    fn new(theme: Theme) -> Self {
        Self {
            ansi: theme == Theme::Dark,
        }
    }

    fn paint(&self, code: &str, text: &str) -> String {
        if self.ansi {
            format!("\x1b[{code}m{text}\x1b[0m")
        } else {
            text.to_string()
        }
    }

    fn bold(&self, text: &str) -> String {
        self.paint("1", text)
    }

    fn dim(&self, text: &str) -> String {
        self.paint("2", text)
    }

    fn alert(&self, text: &str) -> String {
        self.paint("1;33", text)
    }
}

/// Fields shown on the current-conditions card for a view mode.
fn card_fields(settings: &Settings, mode: ViewMode) -> Vec<Field> {
    match mode {
        ViewMode::Casual => vec![Field::Wind, Field::Temperature, Field::Precipitation],
        ViewMode::Surfer => vec![
            Field::Wind,
            Field::Gusts,
            Field::WaveHeight,
            Field::WavePeriod,
            Field::SeaTemperature,
            Field::Temperature,
        ],
        ViewMode::Everything => Field::ALL.to_vec(),
        ViewMode::Custom => settings.custom_fields.clone(),
    }
}

fn is_marine(field: Field) -> bool {
    matches!(
        field,
        Field::WaveHeight | Field::WavePeriod | Field::SeaTemperature
    )
}

/// Label and display value of one field; absent data renders as a dash.
fn field_line(field: Field, sample: &HourlySample, units: Units) -> (&'static str, String) {
    match field {
        Field::Wind => (
            "Wind",
            format_wind_with_direction(sample.wind_speed, sample.wind_direction, units.wind),
        ),
        Field::Gusts => (
            "Gusts",
            format_optional(sample.wind_gusts, |g| format_wind(g, units.wind)),
        ),
        Field::Temperature => ("Temperature", format_temp(sample.temperature, units.temp)),
        Field::Humidity => ("Humidity", format!("{}%", whole(sample.humidity))),
        Field::CloudCover => ("Cloud cover", format!("{}%", whole(sample.cloud_cover))),
        Field::Precipitation => {
            let value = match (sample.precipitation_probability, sample.precipitation) {
                (Some(p), Some(mm)) => format!("{}% ({} mm)", whole(p), whole(mm)),
                (Some(p), None) => format!("{}%", whole(p)),
                (None, Some(mm)) => format!("{} mm", whole(mm)),
                (None, None) => PLACEHOLDER.to_string(),
            };
            ("Precipitation", value)
        }
        Field::Pressure => (
            "Pressure",
            format_optional(sample.pressure, |p| format!("{} hPa", whole(p))),
        ),
        Field::Visibility => ("Visibility", format_optional(sample.visibility, format_visibility)),
        Field::UvIndex => (
            "UV index",
            format_optional(sample.uv_index, |uv| whole(uv).to_string()),
        ),
        Field::WaveHeight => (
            "Waves",
            format_optional(sample.wave_height, |h| format!("{h:.1} m")),
        ),
        Field::WavePeriod => (
            "Wave period",
            format_optional(sample.wave_period, |p| format!("{} s", whole(p))),
        ),
        Field::SeaTemperature => (
            "Water",
            format_optional(sample.sea_surface_temperature, |t| {
                format_temp_precise(t, units.temp)
            }),
        ),
    }
}

fn current_card(
    lines: &mut Vec<String>,
    style: &Style,
    settings: &Settings,
    cards: CardToggles,
    sample: &HourlySample,
    units: Units,
) {
    let mode = settings.view_mode;
    lines.push(style.bold(&format!("Now ({})", sample.time.format("%a %H:%M"))));

    for field in card_fields(settings, mode) {
        if is_marine(field) && !cards.marine {
            continue;
        }
        let (label, value) = field_line(field, sample, units);
        lines.push(format!("  {label:<13}{value}"));
    }

    match mode {
        ViewMode::Casual => {
            let sky = precipitation_indicator(sample.precipitation_probability);
            lines.push(format!("  {:<13}{}", "Sky", sky));
        }
        ViewMode::Surfer => {
            lines.push(format!("  {:<13}{}", "Rating", wind_rating(sample.wind_speed)));
            lines.push(format!("  {:<13}{}", "Shore", shore_wind(sample.wind_direction)));
            if cards.marine {
                if let Some(height) = sample.wave_height {
                    lines.push(format!("  {:<13}{}", "Surface", water_surface(height)));
                }
            }
        }
        ViewMode::Everything | ViewMode::Custom => {}
    }
}

fn hourly_table(
    lines: &mut Vec<String>,
    style: &Style,
    bundle: &ForecastBundle,
    current: &HourlySample,
    units: Units,
) {
    let start = bundle
        .samples
        .iter()
        .position(|s| std::ptr::eq(s, current))
        .unwrap_or(0);

    lines.push(style.bold("Hourly"));
    lines.push(style.dim(&format!(
        "  {:<7}{:>10} {:<4}{:>7}{:>7}{:>8}",
        "Time", "Wind", "Dir", "Temp", "Rain", "Waves"
    )));
    for sample in bundle.samples.iter().skip(start).take(HOURLY_ROWS) {
        lines.push(format!(
            "  {:<7}{:>10} {:<4}{:>7}{:>7}{:>8}",
            sample.time.format("%H:%M").to_string(),
            format_wind(sample.wind_speed, units.wind),
            compass(sample.wind_direction),
            format_temp(sample.temperature, units.temp),
            format_optional(sample.precipitation_probability, |p| format!("{}%", whole(p))),
            format_optional(sample.wave_height, |h| format!("{h:.1} m")),
        ));
    }
}

/// ASCII tide curve for the 24 hours around `now`, with an `X` at "now".
fn tide_chart(lines: &mut Vec<String>, style: &Style, now: DateTime<Utc>, offset: FixedOffset) {
    let points = tide::series(
        now - Duration::hours(CHART_HOURS),
        CHART_HOURS * 2,
        CHART_STEP_MINUTES,
    );
    let count = points.len();
    let (min, max) = points
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(min, max), p| {
            (min.min(p.height_m), max.max(p.height_m))
        });
    let span = (max - min).max(f64::EPSILON);

    let to_row = |height: f64| {
        let normalized = (height - min) / span;
        (((1.0 - normalized) * (CHART_ROWS as f64 - 1.0)).round() as usize).min(CHART_ROWS - 1)
    };

    let mut grid = vec![vec![' '; count + Y_AXIS_WIDTH]; CHART_ROWS];
    for row in grid.iter_mut() {
        row[Y_AXIS_WIDTH - 1] = '│';
    }

    let step = 0.5;
    let mut level = (min / step).ceil() * step;
    while level <= max {
        let label = format!("{level:>4.1}m");
        let row = to_row(level);
        for (i, ch) in label.chars().take(Y_AXIS_WIDTH - 1).enumerate() {
            grid[row][i] = ch;
        }
        level += step;
    }

    let center = count / 2;
    for (column, point) in points.iter().enumerate() {
        let row = to_row(point.height_m);
        grid[row][column + Y_AXIS_WIDTH] = if column == center { 'X' } else { '•' };
    }

    lines.push(format!("{} {}", style.bold("Tide"), style.dim("(approximate)")));
    lines.extend(grid.into_iter().map(|row| row.into_iter().collect::<String>()));

    let padding = " ".repeat(Y_AXIS_WIDTH);
    let markers: String = (0..count)
        .map(|i| if i % 6 == 0 { '|' } else { ' ' })
        .collect();
    lines.push(format!("{padding}{markers}"));

    let now_text = "Now";
    let left_width = center.saturating_sub(now_text.len() / 2);
    let right_width = count.saturating_sub(left_width + now_text.len());
    lines.push(format!(
        "{padding}{:<left_width$}{now_text}{:>right_width$}",
        format!("-{CHART_HOURS}h"),
        format!("+{CHART_HOURS}h"),
    ));

    let trend = match tide::trend_at(now) {
        Trend::Rising => "Rising",
        Trend::Falling => "Falling",
    };
    let extremes = tide::next_extremes(now);
    let describe = |label: &str, point: Option<tide::TidePoint>| match point {
        Some(p) => format!(
            "{label} {} ({:.1} m)",
            p.time.with_timezone(&offset).format("%H:%M"),
            p.height_m
        ),
        None => format!("{label} {PLACEHOLDER}"),
    };
    lines.push(format!(
        "{trend} · {} · {}",
        describe("next high", extremes.high),
        describe("next low", extremes.low)
    ));
}

fn astro_line(
    lines: &mut Vec<String>,
    style: &Style,
    bundle: &ForecastBundle,
    now: DateTime<Utc>,
) {
    let moon = moon_phase(now);
    let mut parts = vec![format!(
        "Moon: {} ({}%)",
        moon.name(),
        whole(moon.illumination * 100.0)
    )];
    if let Some(sunrise) = bundle.sunrise {
        parts.push(format!("Sunrise {}", sunrise.format("%H:%M")));
    }
    if let Some(sunset) = bundle.sunset {
        parts.push(format!("Sunset {}", sunset.format("%H:%M")));
    }
    match daylight(bundle, now) {
        Daylight::BeforeSunrise { until } => parts.push(format!("Sunrise in {}", format_span(until))),
        Daylight::Day { remaining } => {
            parts.push(format!("Daylight left {}", format_span(remaining)))
        }
        Daylight::AfterSunset => parts.push("After sunset".to_string()),
        Daylight::Unknown => {}
    }
    lines.push(style.bold("Astronomy"));
    lines.push(format!("  {}", parts.join(" · ")));
}

/// Render the full dashboard for `state` at `now`.
pub fn render_dashboard(state: &AppState, now: DateTime<Utc>) -> String {
    let settings = &state.settings;
    let style = Style::new(settings.theme);
    let units = Units {
        wind: settings.wind_unit,
        temp: settings.temp_unit,
    };
    let cards = settings.cards(settings.view_mode);
    let mut lines = Vec::new();

    let location = state
        .bundle
        .as_ref()
        .map(|b| &b.location)
        .unwrap_or(&settings.location);
    lines.push(format!(
        "{} {}",
        style.bold(&location.label()),
        style.dim(&format!("[{}]", settings.view_mode))
    ));

    if let Some(error) = &state.error {
        lines.push(style.alert(&format!("⚠ {error}")));
    }

    let Some(bundle) = &state.bundle else {
        lines.push("No forecast loaded".to_string());
        return lines.join("\n");
    };
    lines.push(style.dim(&format!(
        "Updated {}",
        bundle.fetched_at.format("%Y-%m-%d %H:%M UTC")
    )));
    lines.push(String::new());

    let current = nearest_sample(&bundle.samples, now);
    match current {
        Some(sample) => current_card(&mut lines, &style, settings, cards, sample, units),
        None => lines.push(format!("Now  {PLACEHOLDER}")),
    }
    if cards.marine && bundle.is_inland() {
        lines.push(style.dim("  No marine data for this location"));
    }

    if let (true, Some(sample)) = (settings.show_hourly, current) {
        lines.push(String::new());
        hourly_table(&mut lines, &style, bundle, sample, units);
    }

    if cards.tides {
        let offset = current
            .map(|s| *s.time.offset())
            .unwrap_or_else(|| Utc.fix());
        lines.push(String::new());
        tide_chart(&mut lines, &style, now, offset);
    }

    if cards.astro {
        lines.push(String::new());
        astro_line(&mut lines, &style, bundle, now);
    }

    lines.join("\n")
}
