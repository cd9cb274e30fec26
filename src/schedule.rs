//! # Notification Schedule Evaluation
//!
//! A schedule is a set of zero-padded "HH:MM" wall-clock times evaluated
//! against the host's local clock (not the forecast location's timezone).
//! Evaluation has one-minute granularity: "now" is formatted as "HH:MM" and
//! looked up in the set.
//!
//! The watch loop polls once immediately and then every minute. There is no
//! catch-up: if the process is asleep through a scheduled minute, that day's
//! dispatch is skipped. [`FireGuard`] keeps a minute that happens to be
//! checked twice from firing twice.

use chrono::{NaiveDateTime, NaiveTime, Timelike};
use serde::{Deserialize, Serialize};

const MINUTES_PER_DAY: u32 = 24 * 60;

/// Daily dispatch schedule for one sink.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationSchedule {
    /// Times of day, "HH:MM" 24-hour notation
    #[serde(default)]
    pub times: Vec<String>,
    /// Legacy "N times per day", used only while `times` is empty
    #[serde(default)]
    pub times_per_day: Option<u8>,
}

impl NotificationSchedule {
    pub fn from_times<I, S>(times: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            times: times.into_iter().map(Into::into).collect(),
            times_per_day: None,
        }
    }

    /// The times this schedule fires at, after applying the legacy fallback.
    pub fn effective_times(&self) -> Vec<String> {
        if !self.times.is_empty() {
            return self.times.clone();
        }
        match self.times_per_day {
            Some(n) if n > 0 => legacy_times(n),
            _ => Vec::new(),
        }
    }

    /// True if the schedule has at least one dispatch instant.
    pub fn is_empty(&self) -> bool {
        self.effective_times().is_empty()
    }
}

/// Spread `n` dispatch instants evenly across the day, starting at midnight.
/// `n` is capped at 24.
pub fn legacy_times(n: u8) -> Vec<String> {
    let n = u32::from(n.min(24));
    if n == 0 {
        return Vec::new();
    }
    let spacing = MINUTES_PER_DAY / n;
    (0..n)
        .map(|i| {
            let minute = i * spacing;
            format!("{:02}:{:02}", minute / 60, minute % 60)
        })
        .collect()
}

/// Format a wall-clock time as the schedule key "HH:MM".
pub fn minute_key<T: Timelike>(now: &T) -> String {
    format!("{:02}:{:02}", now.hour(), now.minute())
}

/// True iff the current minute is one of the schedule's dispatch instants.
pub fn should_fire<T: Timelike>(schedule: &NotificationSchedule, now: &T) -> bool {
    let key = minute_key(now);
    schedule.effective_times().iter().any(|t| *t == key)
}

/// Normalise user input such as "7:5" or " 18:00" to "HH:MM".
///
/// Returns `None` for anything that is not a valid time of day.
pub fn normalize_time(input: &str) -> Option<String> {
    let (h, m) = input.trim().split_once(':')?;
    let hour: u32 = h.trim().parse().ok()?;
    let minute: u32 = m.trim().parse().ok()?;
    NaiveTime::from_hms_opt(hour, minute, 0).map(|t| minute_key(&t))
}

/// Remembers the last minute a sink fired so one minute fires at most once.
#[derive(Debug, Default)]
pub struct FireGuard {
    last_fired: Option<NaiveDateTime>,
}

impl FireGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Evaluate the schedule at `now` and claim the minute if it should fire.
    ///
    /// Returns true at most once per distinct local minute.
    pub fn check(&mut self, schedule: &NotificationSchedule, now: NaiveDateTime) -> bool {
        let minute = now
            .with_second(0)
            .and_then(|t| t.with_nanosecond(0))
            .unwrap_or(now);
        if self.last_fired == Some(minute) {
            return false;
        }
        if should_fire(schedule, &now) {
            self.last_fired = Some(minute);
            return true;
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(hour: u32, minute: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(hour, minute, 0).unwrap()
    }

    fn on(day: u32, hour: u32, minute: u32, second: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 7, day)
            .unwrap()
            .and_hms_opt(hour, minute, second)
            .unwrap()
    }

    #[test]
    fn test_fires_only_on_exact_minutes() {
        let schedule = NotificationSchedule::from_times(["07:00", "18:00"]);
        assert!(should_fire(&schedule, &at(7, 0)));
        assert!(should_fire(&schedule, &at(18, 0)));
        assert!(!should_fire(&schedule, &at(6, 59)));
        assert!(!should_fire(&schedule, &at(7, 1)));
        assert!(!should_fire(&schedule, &at(0, 0)));
        assert!(!should_fire(&schedule, &at(19, 0)));
    }

    #[test]
    fn test_seconds_do_not_matter() {
        let schedule = NotificationSchedule::from_times(["07:00"]);
        assert!(should_fire(&schedule, &on(24, 7, 0, 59)));
    }

    #[test]
    fn test_empty_schedule_never_fires() {
        let schedule = NotificationSchedule::default();
        assert!(schedule.is_empty());
        for hour in 0..24 {
            assert!(!should_fire(&schedule, &at(hour, 0)));
        }
    }

    #[test]
    fn test_legacy_times_per_day() {
        assert_eq!(legacy_times(1), vec!["00:00"]);
        assert_eq!(legacy_times(3), vec!["00:00", "08:00", "16:00"]);
        assert_eq!(legacy_times(7)[1], "03:25");
        assert_eq!(legacy_times(200).len(), 24);
        assert!(legacy_times(0).is_empty());

        let schedule = NotificationSchedule {
            times: vec![],
            times_per_day: Some(2),
        };
        assert!(should_fire(&schedule, &at(12, 0)));
        assert!(!should_fire(&schedule, &at(6, 0)));
    }

    #[test]
    fn test_explicit_times_override_legacy_count() {
        let schedule = NotificationSchedule {
            times: vec!["06:30".to_string()],
            times_per_day: Some(2),
        };
        assert!(should_fire(&schedule, &at(6, 30)));
        assert!(!should_fire(&schedule, &at(12, 0)));
    }

    #[test]
    fn test_normalize_time() {
        assert_eq!(normalize_time("7:5").as_deref(), Some("07:05"));
        assert_eq!(normalize_time(" 18:00 ").as_deref(), Some("18:00"));
        assert_eq!(normalize_time("24:00"), None);
        assert_eq!(normalize_time("12:60"), None);
        assert_eq!(normalize_time("noon"), None);
    }

    #[test]
    fn test_fire_guard_fires_once_per_minute() {
        let schedule = NotificationSchedule::from_times(["07:00", "07:00"]);
        let mut guard = FireGuard::new();
        assert!(guard.check(&schedule, on(24, 7, 0, 1)));
        assert!(!guard.check(&schedule, on(24, 7, 0, 40)));
        assert!(!guard.check(&schedule, on(24, 7, 1, 0)));
        // Same minute on the next day fires again
        assert!(guard.check(&schedule, on(25, 7, 0, 3)));
    }
}
