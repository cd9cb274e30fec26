//! Astronomical timing: low-precision moon phase and daylight state.
//!
//! The moon phase uses Schaefer's routine (Sky & Telescope, 1985/1994).
//! Accuracy is about ±1 day on the phase, which is plenty for a dashboard
//! label and for shaping the toy tide envelope.

use crate::ForecastBundle;
use chrono::{DateTime, Datelike, Duration, Timelike, Utc};
use core::f64::consts::TAU;

/// Mean synodic month in days.
pub const SYNODIC_MONTH_DAYS: f64 = 29.530_588_2;

const PHASE_NAMES: [&str; 8] = [
    "New Moon",
    "Waxing Crescent",
    "First Quarter",
    "Waxing Gibbous",
    "Full Moon",
    "Waning Gibbous",
    "Last Quarter",
    "Waning Crescent",
];

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MoonPhase {
    /// Phase index 0 – 7 (0 = new, 4 = full)
    pub index: u8,
    /// Days since new moon
    pub age_days: f64,
    /// Illuminated fraction, 0–1
    pub illumination: f64,
}

impl MoonPhase {
    pub fn name(&self) -> &'static str {
        PHASE_NAMES[usize::from(self.index & 7)]
    }

    /// Position within the synodic month, 0–1.
    pub fn fraction(&self) -> f64 {
        self.age_days / SYNODIC_MONTH_DAYS
    }
}

/// Moon phase at an instant.
pub fn moon_phase(at: DateTime<Utc>) -> MoonPhase {
    let day = at.day() as f64
        + (at.hour() as f64 + at.minute() as f64 / 60.0 + at.second() as f64 / 3600.0) / 24.0;

    // Jan/Feb count as months 13/14 of the previous year
    let (mut y, mut m) = (at.year(), at.month() as i32);
    if m < 3 {
        y -= 1;
        m += 12;
    }
    m += 1;

    // Days from the 1900-01-00 12 UT new moon epoch
    let days = (365.25 * y as f64).floor() + (30.6 * m as f64).floor() + day - 694_039.09;

    let cycles = days / SYNODIC_MONTH_DAYS;
    let fraction = cycles - cycles.floor();
    let index = ((fraction * 8.0) + 0.5).floor() as u8 & 7;

    MoonPhase {
        index,
        age_days: fraction * SYNODIC_MONTH_DAYS,
        illumination: (1.0 - (fraction * TAU).cos()) / 2.0,
    }
}

/// Where "now" sits relative to the bundle's sunrise and sunset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Daylight {
    BeforeSunrise { until: Duration },
    Day { remaining: Duration },
    AfterSunset,
    Unknown,
}

/// Daylight state for the bundle's first day.
pub fn daylight(bundle: &ForecastBundle, now: DateTime<Utc>) -> Daylight {
    let (Some(sunrise), Some(sunset)) = (bundle.sunrise, bundle.sunset) else {
        return Daylight::Unknown;
    };
    let sunrise = sunrise.with_timezone(&Utc);
    let sunset = sunset.with_timezone(&Utc);

    if now < sunrise {
        Daylight::BeforeSunrise {
            until: sunrise - now,
        }
    } else if now < sunset {
        Daylight::Day {
            remaining: sunset - now,
        }
    } else {
        Daylight::AfterSunset
    }
}

/// "3h 05m" style duration label.
pub fn format_span(span: Duration) -> String {
    let minutes = span.num_minutes().max(0);
    format!("{}h {:02}m", minutes / 60, minutes % 60)
}
