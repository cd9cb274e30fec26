//! Unit conversion and display formatting.
//!
//! Pure functions over the canonical storage units (km/h and °C). Nothing in
//! here keeps state.

use crate::{TempUnit, WindUnit};

/// Kilometres per hour in one knot (exact by definition).
pub const KMH_PER_KNOT: f64 = 1.852;

/// Kilometres per hour in one metre per second.
pub const KMH_PER_MS: f64 = 3.6;

const COMPASS_POINTS: [&str; 16] = [
    "N", "NNE", "NE", "ENE", "E", "ESE", "SE", "SSE", "S", "SSW", "SW", "WSW", "W", "WNW", "NW",
    "NNW",
];

/// Placeholder shown for absent values.
pub const PLACEHOLDER: &str = "-";

pub fn kmh_to_knots(kmh: f64) -> f64 {
    kmh / KMH_PER_KNOT
}

pub fn knots_to_kmh(knots: f64) -> f64 {
    knots * KMH_PER_KNOT
}

pub fn kmh_to_ms(kmh: f64) -> f64 {
    kmh / KMH_PER_MS
}

pub fn celsius_to_fahrenheit(celsius: f64) -> f64 {
    celsius * 9.0 / 5.0 + 32.0
}

pub fn celsius_to_kelvin(celsius: f64) -> f64 {
    celsius + 273.15
}

/// Convert a canonical km/h value to the requested display unit.
pub fn convert_wind(kmh: f64, unit: WindUnit) -> f64 {
    match unit {
        WindUnit::Kmh => kmh,
        WindUnit::Knots => kmh_to_knots(kmh),
        WindUnit::Ms => kmh_to_ms(kmh),
    }
}

/// Convert a canonical °C value to the requested display unit.
pub fn convert_temp(celsius: f64, unit: TempUnit) -> f64 {
    match unit {
        TempUnit::Celsius => celsius,
        TempUnit::Fahrenheit => celsius_to_fahrenheit(celsius),
        TempUnit::Kelvin => celsius_to_kelvin(celsius),
    }
}

/// Map a bearing in degrees to one of 16 compass points, rounding to the
/// nearest 22.5° sector. Any real input is accepted; the mapping has period 360.
///
/// # Example
/// ```
/// use surf_watch_lib::units::compass;
///
/// assert_eq!(compass(45.0), "NE");
/// assert_eq!(compass(-10.0), "N");
/// ```
pub fn compass(degrees: f64) -> &'static str {
    let index = (degrees / 22.5).round().rem_euclid(16.0) as usize;
    COMPASS_POINTS[index % 16]
}

/// Round to a whole number for display, avoiding "-0".
pub fn whole(value: f64) -> i64 {
    let rounded = value.round() as i64;
    if rounded == 0 {
        0
    } else {
        rounded
    }
}

/// Format a wind speed, e.g. "20 km/h".
pub fn format_wind(kmh: f64, unit: WindUnit) -> String {
    format!("{} {}", whole(convert_wind(kmh, unit)), unit.label())
}

/// Format a wind speed with its compass direction, e.g. "20 km/h NE".
pub fn format_wind_with_direction(kmh: f64, degrees: f64, unit: WindUnit) -> String {
    format!("{} {}", format_wind(kmh, unit), compass(degrees))
}

/// Format a temperature, e.g. "18°C" or "291 K".
pub fn format_temp(celsius: f64, unit: TempUnit) -> String {
    format!("{}{}", whole(convert_temp(celsius, unit)), unit.label())
}

/// Format a temperature with one decimal place, e.g. "16.4°C".
pub fn format_temp_precise(celsius: f64, unit: TempUnit) -> String {
    format!("{:.1}{}", convert_temp(celsius, unit), unit.label())
}

/// Format visibility in kilometres with one decimal place.
pub fn format_visibility(metres: f64) -> String {
    format!("{:.1} km", metres / 1000.0)
}

/// Format an optional value, falling back to the placeholder dash.
pub fn format_optional<T, F>(value: Option<T>, format: F) -> String
where
    F: FnOnce(T) -> String,
{
    value.map(format).unwrap_or_else(|| PLACEHOLDER.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compass_cardinal_points() {
        assert_eq!(compass(0.0), "N");
        assert_eq!(compass(90.0), "E");
        assert_eq!(compass(180.0), "S");
        assert_eq!(compass(270.0), "W");
        assert_eq!(compass(360.0), "N");
    }

    #[test]
    fn test_compass_rounds_to_nearest() {
        assert_eq!(compass(11.0), "N");
        assert_eq!(compass(12.0), "NNE");
        assert_eq!(compass(348.0), "NNW");
        assert_eq!(compass(349.0), "N");
    }

    #[test]
    fn test_compass_is_periodic() {
        for step in 0..720 {
            let degrees = step as f64 * 0.5 - 180.0;
            assert_eq!(
                compass(degrees),
                compass(degrees + 360.0),
                "compass should repeat every 360° (at {degrees})"
            );
        }
    }

    #[test]
    fn test_knots_roundtrip() {
        for kmh in [0.0, 1.0, 12.5, 37.04, 118.3] {
            let back = knots_to_kmh(kmh_to_knots(kmh));
            assert!((back - kmh).abs() < 1e-9, "{kmh} came back as {back}");
        }
        assert!((kmh_to_knots(1.852) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_temperature_conversions() {
        assert!((celsius_to_fahrenheit(100.0) - 212.0).abs() < 1e-9);
        assert!((celsius_to_fahrenheit(-40.0) - -40.0).abs() < 1e-9);
        assert!((celsius_to_kelvin(0.0) - 273.15).abs() < 1e-9);
    }

    #[test]
    fn test_formatting() {
        assert_eq!(format_wind(20.0, WindUnit::Kmh), "20 km/h");
        assert_eq!(format_wind(37.04, WindUnit::Knots), "20 kn");
        assert_eq!(format_wind(36.0, WindUnit::Ms), "10 m/s");
        assert_eq!(format_wind_with_direction(20.0, 45.0, WindUnit::Kmh), "20 km/h NE");
        assert_eq!(format_temp(18.0, TempUnit::Celsius), "18°C");
        assert_eq!(format_temp(18.0, TempUnit::Fahrenheit), "64°F");
        assert_eq!(format_temp(18.0, TempUnit::Kelvin), "291 K");
        assert_eq!(format_temp(-0.3, TempUnit::Celsius), "0°C");
        assert_eq!(format_visibility(24_140.0), "24.1 km");
    }

    #[test]
    fn test_format_optional_placeholder() {
        assert_eq!(format_optional(None::<f64>, |v| format!("{v}")), "-");
        assert_eq!(format_optional(Some(2.5), |v| format!("{v:.1} m")), "2.5 m");
    }
}
