//! Nearest-hour selection.
//!
//! Picks the sample that represents "current conditions". The series is small
//! (tens to a few hundred hours), so this is a plain left-to-right scan; ties
//! keep the first sample encountered.

use crate::HourlySample;
use chrono::{DateTime, TimeZone};

/// Return the sample whose timestamp is closest to `now`, or `None` for an
/// empty series.
///
/// # Example
/// ```
/// use chrono::{DateTime, Utc};
/// use surf_watch_lib::{current::nearest_sample, HourlySample};
///
/// let at = |s: &str| DateTime::parse_from_rfc3339(s).unwrap();
/// let samples = vec![
///     HourlySample::new(at("2025-07-24T09:00:00Z"), 10.0, 0.0, 15.0),
///     HourlySample::new(at("2025-07-24T10:00:00Z"), 12.0, 0.0, 16.0),
/// ];
/// let now = at("2025-07-24T09:40:00Z").with_timezone(&Utc);
/// assert_eq!(nearest_sample(&samples, now).unwrap().wind_speed, 12.0);
/// ```
pub fn nearest_sample<Tz: TimeZone>(
    samples: &[HourlySample],
    now: DateTime<Tz>,
) -> Option<&HourlySample> {
    let now = now.timestamp();
    let mut best: Option<(&HourlySample, i64)> = None;

    for sample in samples {
        let delta = (sample.time.timestamp() - now).abs();
        match best {
            Some((_, best_delta)) if delta >= best_delta => {}
            _ => best = Some((sample, delta)),
        }
    }

    best.map(|(sample, _)| sample)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, FixedOffset, Utc};

    fn series(start: &str, hours: i64) -> Vec<HourlySample> {
        let start = DateTime::parse_from_rfc3339(start).unwrap();
        (0..hours)
            .map(|h| HourlySample::new(start + Duration::hours(h), h as f64, 0.0, 10.0))
            .collect()
    }

    #[test]
    fn test_empty_series_has_no_current_sample() {
        assert!(nearest_sample(&[], Utc::now()).is_none());
    }

    #[test]
    fn test_picks_closest_hour() {
        let samples = series("2025-07-24T00:00:00+00:00", 24);
        let now = DateTime::parse_from_rfc3339("2025-07-24T05:29:00+00:00").unwrap();
        assert_eq!(nearest_sample(&samples, now).unwrap().wind_speed, 5.0);

        let now = DateTime::parse_from_rfc3339("2025-07-24T05:31:00+00:00").unwrap();
        assert_eq!(nearest_sample(&samples, now).unwrap().wind_speed, 6.0);
    }

    #[test]
    fn test_tie_keeps_earliest_sample() {
        let samples = series("2025-07-24T00:00:00+00:00", 3);
        let now = DateTime::parse_from_rfc3339("2025-07-24T01:30:00+00:00").unwrap();
        assert_eq!(nearest_sample(&samples, now).unwrap().wind_speed, 1.0);
    }

    #[test]
    fn test_duplicate_timestamps_keep_first() {
        let time = DateTime::parse_from_rfc3339("2025-07-24T03:00:00+00:00").unwrap();
        let samples = vec![
            HourlySample::new(time, 1.0, 0.0, 10.0),
            HourlySample::new(time, 2.0, 0.0, 10.0),
        ];
        assert_eq!(nearest_sample(&samples, time).unwrap().wind_speed, 1.0);
    }

    #[test]
    fn test_now_outside_series_clamps_to_edges() {
        let samples = series("2025-07-24T00:00:00+00:00", 6);
        let before = DateTime::parse_from_rfc3339("2025-07-23T12:00:00+00:00").unwrap();
        let after = DateTime::parse_from_rfc3339("2025-07-25T12:00:00+00:00").unwrap();
        assert_eq!(nearest_sample(&samples, before).unwrap().wind_speed, 0.0);
        assert_eq!(nearest_sample(&samples, after).unwrap().wind_speed, 5.0);
    }

    #[test]
    fn test_offsets_are_compared_as_instants() {
        // 09:00 at -04:00 is 13:00 UTC
        let local = FixedOffset::west_opt(4 * 3600).unwrap();
        let samples = series("2025-07-24T08:00:00-04:00", 3);
        let now = Utc.with_ymd_and_hms(2025, 7, 24, 13, 5, 0).unwrap();
        let picked = nearest_sample(&samples, now).unwrap();
        assert_eq!(picked.time.offset(), &local);
        assert_eq!(picked.wind_speed, 1.0);
    }

    #[test]
    fn test_matches_brute_force_minimum() {
        let samples = series("2025-07-24T00:00:00+00:00", 48);
        let origin = Utc.with_ymd_and_hms(2025, 7, 23, 22, 0, 0).unwrap();
        for minutes in (0..(52 * 60)).step_by(7) {
            let now = origin + Duration::minutes(minutes);
            let picked = nearest_sample(&samples, now).unwrap();
            let best = samples
                .iter()
                .map(|s| (s.time.timestamp() - now.timestamp()).abs())
                .min()
                .unwrap();
            assert_eq!((picked.time.timestamp() - now.timestamp()).abs(), best);
        }
    }
}
