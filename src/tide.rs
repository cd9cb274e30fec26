//! # Approximate Tide Model
//!
//! A display-only tide curve. This is a toy sinusoid, not tide data for the
//! selected location: it has the right period and a plausible spring–neap
//! envelope, nothing more.
//!
//! ## Model Characteristics
//!
//! ### Semidiurnal Pattern
//! - **M2** (principal lunar): 12.42 h period, 1.2 m amplitude
//! - **S2** (principal solar): 12.00 h period, 0.25 m amplitude
//! - **Mean level**: 1.5 m above an arbitrary datum
//!
//! ### Lunar Phase & Amplitude
//! S2 is phase-shifted by twice the moon's phase angle, so the two constituents
//! reinforce near new/full moon (springs) and partly cancel near the quarters
//! (neaps).
//!
//! ### Accuracy Trade-offs
//! - ✅ **Correct period**: matches the real semidiurnal cycle
//! - ✅ **Spring–neap envelope**: amplitude follows the moon phase
//! - ❌ **No local phase**: high water is not aligned to any station
//! - ❌ **No asymmetry** or meteorological effects

use crate::astro::moon_phase;
use chrono::{DateTime, Duration, Utc};
use std::f64::consts::TAU;

const A_M2_M: f64 = 1.2;
const P_M2_HRS: f64 = 12.42;
const A_S2_M: f64 = 0.25;
const P_S2_HRS: f64 = 12.00;
const MEAN_LEVEL_M: f64 = 1.5;

/// Resolution used when searching for highs and lows.
const EXTREME_STEP_MINUTES: i64 = 6;

/// Search window for the next high and low (just over one M2 cycle).
const EXTREME_WINDOW_HOURS: i64 = 13;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TidePoint {
    pub time: DateTime<Utc>,
    pub height_m: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trend {
    Rising,
    Falling,
}

/// Next high and low water after a given instant.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Extremes {
    pub high: Option<TidePoint>,
    pub low: Option<TidePoint>,
}

/// Approximate water level at an instant, metres.
pub fn height_at(t: DateTime<Utc>) -> f64 {
    let hours = t.timestamp() as f64 / 3600.0;
    let moon_angle = moon_phase(t).fraction() * TAU;

    let theta_m2 = (hours / P_M2_HRS).fract() * TAU;
    let theta_s2 = (hours / P_S2_HRS).fract() * TAU + 2.0 * moon_angle;

    MEAN_LEVEL_M + A_M2_M * theta_m2.sin() + A_S2_M * theta_s2.sin()
}

/// Sample the curve every `step_minutes` for `hours` hours from `start`.
///
/// Includes both endpoints, so 24 h at 10-minute steps yields 145 points.
pub fn series(start: DateTime<Utc>, hours: i64, step_minutes: i64) -> Vec<TidePoint> {
    if step_minutes <= 0 || hours < 0 {
        return Vec::new();
    }
    let steps = hours * 60 / step_minutes;
    let mut points = Vec::with_capacity(steps as usize + 1);
    for step in 0..=steps {
        let time = start + Duration::minutes(step * step_minutes);
        points.push(TidePoint {
            time,
            height_m: height_at(time),
        });
    }
    points
}

/// Whether the water is rising or falling at `t`.
pub fn trend_at(t: DateTime<Utc>) -> Trend {
    if height_at(t + Duration::minutes(5)) >= height_at(t) {
        Trend::Rising
    } else {
        Trend::Falling
    }
}

/// Find the next high and low water after `from`.
pub fn next_extremes(from: DateTime<Utc>) -> Extremes {
    let points = series(from, EXTREME_WINDOW_HOURS, EXTREME_STEP_MINUTES);
    let mut extremes = Extremes {
        high: None,
        low: None,
    };

    for w in points.windows(3) {
        let (prev, mid, next) = (w[0].height_m, w[1].height_m, w[2].height_m);
        if extremes.high.is_none() && prev < mid && mid >= next {
            extremes.high = Some(w[1]);
        }
        if extremes.low.is_none() && prev > mid && mid <= next {
            extremes.low = Some(w[1]);
        }
        if extremes.high.is_some() && extremes.low.is_some() {
            break;
        }
    }
    extremes
}
