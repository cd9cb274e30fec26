//! # End-to-End Scenarios
//!
//! Drives the library the way the binary does: settings persisted through a
//! real directory store, forecast bundles loaded from the cache, summaries
//! composed for the current hour and schedules evaluated minute by minute.

use crate::{refresh, scheduled_dispatch, send, wall_clock_at, SinkChoice, SinkKind, Watcher};
use chrono::{DateTime, Duration, Local, NaiveDate, TimeZone, Utc};
use std::time::{Duration as StdDuration, SystemTime};
use surf_watch_lib::app::{Action, App};
use surf_watch_lib::config::{NotifyConfig, ProviderConfig};
use surf_watch_lib::forecast::{load_cache, save_cache, ForecastClient};
use surf_watch_lib::notify::{dispatch_scheduled, Trigger};
use surf_watch_lib::schedule::{FireGuard, NotificationSchedule};
use surf_watch_lib::settings::{FileStore, MemoryStore, PubSubSettings, Settings};
use surf_watch_lib::{tide, ForecastBundle, HourlySample, Location, TempUnit, ViewMode, WindUnit};
use tempfile::TempDir;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

fn sample(precipitation_probability: f64) -> HourlySample {
    let time = DateTime::parse_from_rfc3339("2025-07-24T09:00:00-04:00").unwrap();
    let mut sample = HourlySample::new(time, 20.0, 45.0, 18.0);
    sample.humidity = 60.0;
    sample.cloud_cover = 40.0;
    sample.precipitation_probability = Some(precipitation_probability);
    sample
}

fn bundle(samples: Vec<HourlySample>) -> ForecastBundle {
    ForecastBundle {
        location: Location::default(),
        samples,
        sunrise: None,
        sunset: None,
        fetched_at: Utc::now(),
    }
}

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 7, 24, 13, 20, 0).unwrap()
}

fn local(hour: u32, min: u32, sec: u32) -> DateTime<Local> {
    Local.with_ymd_and_hms(2025, 7, 24, hour, min, sec).unwrap()
}

/// An app with one forecast hour loaded and the pub/sub sink scheduled for 07:00.
fn scheduled_app(enabled: bool, samples: Vec<HourlySample>) -> App<MemoryStore> {
    let mut app = App::new(MemoryStore::new());
    app.apply(Action::SetPubSub(PubSubSettings {
        enabled,
        topic: "beach".to_string(),
        schedule: NotificationSchedule::from_times(["07:00"]),
    }))
    .unwrap();
    let token = app.begin_refresh();
    app.complete_refresh(token, Ok(bundle(samples)));
    app
}

/// Accept one request, answer 200 and hand back the raw request text.
async fn accept_one() -> (String, tokio::task::JoinHandle<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let handle = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut buf = Vec::new();
        let mut chunk = [0u8; 4096];
        loop {
            let n = socket.read(&mut chunk).await.unwrap();
            if n == 0 {
                break;
            }
            buf.extend_from_slice(&chunk[..n]);
            let text = String::from_utf8_lossy(&buf);
            if let Some((head, body)) = text.split_once("\r\n\r\n") {
                let length = head
                    .lines()
                    .find_map(|l| {
                        let (name, value) = l.split_once(':')?;
                        name.eq_ignore_ascii_case("content-length")
                            .then(|| value.trim().parse::<usize>().ok())
                            .flatten()
                    })
                    .unwrap_or(0);
                if body.len() >= length {
                    break;
                }
            }
        }
        socket
            .write_all(b"HTTP/1.1 200 OK\r\ncontent-length: 0\r\nconnection: close\r\n\r\n")
            .await
            .unwrap();
        String::from_utf8_lossy(&buf).into_owned()
    });
    (format!("http://{addr}"), handle)
}

/// A settings change made in one session is visible in the next one.
#[test]
fn settings_survive_a_restart() {
    let dir = TempDir::new().unwrap();
    {
        let mut app = App::new(FileStore::new(dir.path()));
        app.apply(Action::SetWindUnit(WindUnit::Knots)).unwrap();
        app.apply(Action::SetViewMode(ViewMode::Surfer)).unwrap();
        app.apply(Action::SetPubSub(PubSubSettings {
            enabled: true,
            topic: "beach".to_string(),
            schedule: NotificationSchedule::from_times(["07:00", "18:00"]),
        }))
        .unwrap();
    }

    let restarted = App::new(FileStore::new(dir.path()));
    let settings = restarted.settings();
    assert_eq!(settings.wind_unit, WindUnit::Knots);
    assert_eq!(settings.view_mode, ViewMode::Surfer);
    assert_eq!(settings.pubsub.topic, "beach");
    assert_eq!(settings.temp_unit, TempUnit::Celsius);
}

/// A corrupted settings file only resets its own domain.
#[test]
fn corrupted_settings_file_falls_back() {
    let dir = TempDir::new().unwrap();
    let mut app = App::new(FileStore::new(dir.path()));
    app.apply(Action::SetTempUnit(TempUnit::Kelvin)).unwrap();
    app.apply(Action::SetWindUnit(WindUnit::Ms)).unwrap();
    std::fs::write(dir.path().join("wind-unit.json"), "{{{").unwrap();

    let settings = Settings::load(&FileStore::new(dir.path()));
    assert_eq!(settings.wind_unit, WindUnit::Kmh);
    assert_eq!(settings.temp_unit, TempUnit::Kelvin);
}

#[test]
fn casual_message_for_a_clear_hour() {
    let mut app = App::new(MemoryStore::new());
    let token = app.begin_refresh();
    app.complete_refresh(token, Ok(bundle(vec![sample(10.0)])));

    let text = app.compose_message(now());
    assert!(text.contains("20 km/h NE"), "{text}");
    assert!(text.contains("18°C"), "{text}");
    assert!(text.contains("Clear"), "{text}");
}

#[test]
fn casual_message_for_a_rainy_hour() {
    let mut app = App::new(MemoryStore::new());
    let token = app.begin_refresh();
    app.complete_refresh(token, Ok(bundle(vec![sample(55.0)])));

    let text = app.compose_message(now());
    assert!(text.contains("Rain 55%"), "{text}");
    assert!(!text.contains("Clear"), "{text}");
}

#[test]
fn empty_bundle_reports_nothing() {
    let mut app = App::new(MemoryStore::new());
    let token = app.begin_refresh();
    app.complete_refresh(token, Ok(bundle(Vec::new())));
    assert!(app.current_sample(now()).is_none());
    assert_eq!(app.compose_message(now()), "");
    assert!(app.dispatch(now(), Trigger::Scheduled).is_none());
}

/// A schedule fires once per matching minute even when polled several times.
#[test]
fn schedule_fires_once_per_minute_over_a_day() {
    let schedule = NotificationSchedule::from_times(["07:00", "18:00", "07:00"]);
    let mut guard = FireGuard::new();
    let start = NaiveDate::from_ymd_opt(2025, 7, 24)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap();

    let mut fired = Vec::new();
    // Poll every 20 seconds for a whole day
    for step in 0..(24 * 60 * 3) {
        let at = start + Duration::seconds(step * 20);
        if guard.check(&schedule, at) {
            fired.push(at.format("%H:%M").to_string());
        }
    }
    assert_eq!(fired, vec!["07:00", "18:00"]);
}

/// The cache written by one run is read back by the next.
#[test]
fn cached_bundle_is_served_offline() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("forecast-4975802.json");
    let original = bundle(vec![sample(10.0)]);
    save_cache(&path, &original).unwrap();

    let loaded = load_cache(&path, Some(StdDuration::from_secs(60))).unwrap();
    assert_eq!(loaded, original);
    assert!(load_cache(&dir.path().join("missing.json"), None).is_err());
}

/// With no network, refresh falls back to the cached bundle and keeps the
/// error visible.
#[tokio::test]
async fn refresh_uses_cache_when_providers_are_unreachable() {
    let dir = TempDir::new().unwrap();
    let location = Location::default();
    let cache = dir.path().join(format!("forecast-{}.json", location.id));
    save_cache(&cache, &bundle(vec![sample(10.0)])).unwrap();
    // Age the entry past the TTL
    std::fs::File::options()
        .write(true)
        .open(&cache)
        .unwrap()
        .set_modified(SystemTime::now() - StdDuration::from_secs(3600))
        .unwrap();

    // Bind then drop to get a port nothing listens on
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let providers = ProviderConfig {
        weather_url: format!("http://{addr}/v1/forecast"),
        marine_url: format!("http://{addr}/v1/marine"),
        timeout_secs: 2,
        ..ProviderConfig::default()
    };
    let client = ForecastClient::new(
        providers,
        "surf-watch-test",
        Some(dir.path().to_path_buf()),
        StdDuration::from_secs(60),
    )
    .unwrap();

    let mut app = App::new(MemoryStore::new());
    refresh(&mut app, &client).await;

    assert!(app.state().error.is_some());
    let restored = app.state().bundle.as_ref().expect("stale bundle restored");
    assert_eq!(restored.samples.len(), 1);
}

#[tokio::test]
async fn manual_send_without_sinks_fails() {
    let mut app = App::new(MemoryStore::new());
    let token = app.begin_refresh();
    app.complete_refresh(token, Ok(bundle(vec![sample(10.0)])));

    let http = reqwest::Client::new();
    let err = send(&app, SinkChoice::All, &http, &NotifyConfig::default())
        .await
        .unwrap_err();
    assert!(err.to_string().contains("no notification sink"), "{err}");

    // Naming a disabled sink surfaces the reason
    let err = send(&app, SinkChoice::Pubsub, &http, &NotifyConfig::default())
        .await
        .unwrap_err();
    assert!(err.to_string().contains("disabled"), "{err}");
}

/// A disabled sink never fires, even in a scheduled minute.
#[test]
fn disabled_sink_is_not_scheduled() {
    let app = scheduled_app(false, vec![sample(10.0)]);
    let mut guard = FireGuard::new();
    let http = reqwest::Client::new();
    let fired = scheduled_dispatch(
        &app,
        &mut guard,
        SinkKind::PubSub,
        &http,
        &NotifyConfig::default(),
        local(7, 0, 0),
    );
    assert!(fired.is_none());
}

/// The check on start and the first tick land in the same minute; only one
/// notification goes out and it reaches the topic.
#[tokio::test]
async fn start_check_and_first_tick_fire_once() {
    let (base, server) = accept_one().await;
    let config = NotifyConfig {
        pubsub_base_url: base,
        ..NotifyConfig::default()
    };
    let app = scheduled_app(true, vec![sample(10.0)]);
    let mut guard = FireGuard::new();
    let http = reqwest::Client::new();

    assert!(
        scheduled_dispatch(&app, &mut guard, SinkKind::PubSub, &http, &config, local(6, 59, 30))
            .is_none()
    );
    let (sink, dispatch) =
        scheduled_dispatch(&app, &mut guard, SinkKind::PubSub, &http, &config, local(7, 0, 5))
            .expect("due at 07:00");
    assert_eq!(dispatch.trigger, Trigger::Scheduled);
    assert!(
        scheduled_dispatch(&app, &mut guard, SinkKind::PubSub, &http, &config, local(7, 0, 50))
            .is_none()
    );
    // The webhook sink is not configured, so its own check stays quiet
    let mut webhook_guard = FireGuard::new();
    assert!(scheduled_dispatch(
        &app,
        &mut webhook_guard,
        SinkKind::Webhook,
        &http,
        &config,
        local(7, 0, 5)
    )
    .is_none());

    assert!(dispatch_scheduled(sink.as_ref(), &dispatch).await);
    let request = server.await.unwrap();
    assert!(request.starts_with("POST /beach "), "{request}");
    assert!(request.contains("Wind: 20 km/h NE"), "{request}");
}

/// With no forecast hour to describe, a due schedule sends nothing.
#[test]
fn due_schedule_without_data_sends_nothing() {
    let app = scheduled_app(true, Vec::new());
    let mut guard = FireGuard::new();
    let http = reqwest::Client::new();
    let fired = scheduled_dispatch(
        &app,
        &mut guard,
        SinkKind::PubSub,
        &http,
        &NotifyConfig::default(),
        local(7, 0, 0),
    );
    assert!(fired.is_none());
}

/// A tick handled late is judged by the minute it was due in.
#[tokio::test]
async fn late_tick_keeps_its_minute() {
    let deadline = tokio::time::Instant::now() - StdDuration::from_secs(20);
    let judged = wall_clock_at(deadline);
    let lag = Local::now() - judged;
    assert!(lag >= Duration::seconds(19) && lag <= Duration::seconds(21), "{lag}");
}

/// Each poll tick picks up schedule edits made by another invocation.
#[tokio::test]
async fn poll_tick_rereads_settings() {
    let dir = TempDir::new().unwrap();
    let mut app = App::new(FileStore::new(dir.path()));
    assert!(!app.settings().pubsub.enabled);

    let mut other = App::new(FileStore::new(dir.path()));
    other
        .apply(Action::SetPubSub(PubSubSettings {
            enabled: true,
            topic: "beach".to_string(),
            schedule: NotificationSchedule::from_times(["07:00"]),
        }))
        .unwrap();

    let client = ForecastClient::new(
        ProviderConfig::default(),
        "surf-watch-test",
        None,
        StdDuration::from_secs(60),
    )
    .unwrap();
    let http = reqwest::Client::new();
    let config = NotifyConfig::default();
    let mut watcher = Watcher {
        client: &client,
        http: &http,
        config: &config,
        sends: tokio::task::JoinSet::new(),
    };
    let mut guard = FireGuard::new();
    watcher
        .poll(&mut app, &mut guard, SinkKind::PubSub, tokio::time::Instant::now())
        .await;

    assert!(app.settings().pubsub.enabled);
    assert_eq!(app.settings().pubsub.topic, "beach");
}

#[test]
fn tide_curve_is_smooth_over_a_day() {
    let points = tide::series(now(), 24, 10);
    assert_eq!(points.len(), 145);
    for window in points.windows(2) {
        let step = (window[1].height_m - window[0].height_m).abs();
        assert!(step < 0.3, "10-minute change of {step} m");
    }
}
