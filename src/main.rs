//! # Surf Watch Application Entry Point
//!
//! Command-line front end for the surf watch library. It loads the static
//! configuration and the persisted settings, fetches the forecast for the
//! current location and either renders the dashboard, edits settings, sends a
//! summary on demand, or runs the long-lived `watch` loop that dispatches
//! scheduled notifications.

// Test modules
#[cfg(test)]
mod tests;

use anyhow::{bail, Context};
use chrono::{DateTime, Local, Utc};
use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use std::time::Duration;
use surf_watch_lib::app::{Action, App};
use surf_watch_lib::config::{Config, NotifyConfig, CONFIG_FILE};
use surf_watch_lib::forecast::ForecastClient;
use surf_watch_lib::notify::{
    dispatch_manual, dispatch_scheduled, Dispatch, NotifyError, PubSubSink, Sink, Trigger,
    WebhookSink,
};
use surf_watch_lib::renderer::render_dashboard;
use surf_watch_lib::schedule::{normalize_time, FireGuard, NotificationSchedule};
use surf_watch_lib::settings::{Card, Field, FileStore, Settings, SettingsStore, Theme};
use surf_watch_lib::{TempUnit, ViewMode, WindUnit};
use tokio::task::JoinSet;
use tokio::time::{interval, interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Weather and marine conditions dashboard with scheduled notifications
#[derive(Parser, Debug)]
#[command(name = "surf-watch", version, about)]
struct Cli {
    /// Configuration file
    #[arg(long, default_value = CONFIG_FILE)]
    config: PathBuf,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Render the dashboard for the current location (default)
    Show,
    /// Print the summary message for the current hour
    Message,
    /// Search for locations by name
    Search {
        #[arg(required = true, num_args = 1..)]
        query: Vec<String>,
    },
    /// Manage the current and saved locations
    Location {
        #[command(subcommand)]
        action: LocationCommand,
    },
    /// Change a display preference
    Set {
        #[command(subcommand)]
        setting: SetCommand,
    },
    /// Configure a notification sink
    Notify {
        #[command(subcommand)]
        sink: NotifyCommand,
    },
    /// Send the current summary now
    Send {
        #[arg(long, value_enum, default_value_t = SinkChoice::All)]
        sink: SinkChoice,
    },
    /// Keep running: refresh the forecast and dispatch scheduled notifications
    Watch,
    /// Write a configuration file with the default values
    Init {
        /// Replace an existing file
        #[arg(long)]
        force: bool,
    },
}

#[derive(Subcommand, Debug)]
enum LocationCommand {
    /// Search and make a result the current location
    Use {
        #[arg(required = true, num_args = 1..)]
        query: Vec<String>,
        /// Which search result to use, starting at 1
        #[arg(long, default_value_t = 1)]
        pick: usize,
    },
    /// Add the current location to the saved set
    Save,
    /// Make a saved location current
    Select { id: u64 },
    /// Remove a saved location
    Delete { id: u64 },
    /// List saved locations
    List,
}

#[derive(Subcommand, Debug)]
enum SetCommand {
    WindUnit { unit: WindUnit },
    TempUnit { unit: TempUnit },
    Theme { theme: Theme },
    Mode { mode: ViewMode },
    /// Show or hide the hourly table
    Hourly {
        #[arg(action = ArgAction::Set)]
        on: bool,
    },
    /// Turn a dashboard card on or off for one view mode
    Card {
        mode: ViewMode,
        card: Card,
        #[arg(action = ArgAction::Set)]
        on: bool,
    },
    /// Fields shown by the custom view
    CustomFields {
        #[arg(required = true, num_args = 1..)]
        fields: Vec<Field>,
    },
}

#[derive(Subcommand, Debug)]
enum NotifyCommand {
    /// Pub/sub topic notifications
    Pubsub {
        /// Topic name appended to the service URL
        #[arg(long)]
        topic: Option<String>,
        #[command(flatten)]
        schedule: ScheduleArgs,
    },
    /// Chat webhook notifications
    Webhook {
        #[arg(long)]
        url: Option<String>,
        #[command(flatten)]
        schedule: ScheduleArgs,
    },
}

#[derive(Args, Debug, Default)]
struct ScheduleArgs {
    /// Daily dispatch times, comma separated "HH:MM"
    #[arg(long, value_delimiter = ',')]
    times: Option<Vec<String>>,
    /// Legacy "N times per day" schedule, used while no times are set (0 clears)
    #[arg(long)]
    per_day: Option<u8>,
    #[arg(long, conflicts_with = "disable")]
    enable: bool,
    #[arg(long)]
    disable: bool,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum SinkChoice {
    All,
    Pubsub,
    Webhook,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum SinkKind {
    PubSub,
    Webhook,
}

impl SinkChoice {
    fn kinds(self) -> Vec<SinkKind> {
        match self {
            SinkChoice::All => vec![SinkKind::PubSub, SinkKind::Webhook],
            SinkChoice::Pubsub => vec![SinkKind::PubSub],
            SinkChoice::Webhook => vec![SinkKind::Webhook],
        }
    }
}

/// Apply schedule edits in place. Returns whether anything was given.
fn apply_schedule_args(
    args: &ScheduleArgs,
    schedule: &mut NotificationSchedule,
    enabled: &mut bool,
) -> anyhow::Result<bool> {
    let mut touched = false;
    if let Some(times) = &args.times {
        let mut normalized = Vec::with_capacity(times.len());
        for raw in times.iter().filter(|t| !t.trim().is_empty()) {
            let time = normalize_time(raw)
                .with_context(|| format!("invalid time '{raw}', expected HH:MM"))?;
            if !normalized.contains(&time) {
                normalized.push(time);
            }
        }
        normalized.sort();
        schedule.times = normalized;
        touched = true;
    }
    if let Some(n) = args.per_day {
        if n > 24 {
            bail!("--per-day must be between 0 and 24");
        }
        schedule.times_per_day = (n > 0).then_some(n);
        touched = true;
    }
    if args.enable {
        *enabled = true;
        touched = true;
    }
    if args.disable {
        *enabled = false;
        touched = true;
    }
    Ok(touched)
}

fn describe_schedule(enabled: bool, destination: &str, schedule: &NotificationSchedule) -> String {
    let times = schedule.effective_times();
    format!(
        "{} · destination: {} · times: {}",
        if enabled { "enabled" } else { "disabled" },
        if destination.is_empty() { "-" } else { destination },
        if times.is_empty() { "-".to_string() } else { times.join(", ") },
    )
}

fn build_sink(
    kind: SinkKind,
    http: &reqwest::Client,
    config: &NotifyConfig,
    settings: &Settings,
) -> Result<Box<dyn Sink>, NotifyError> {
    let sink: Box<dyn Sink> = match kind {
        SinkKind::PubSub => Box::new(PubSubSink::from_settings(
            http.clone(),
            config,
            &settings.pubsub,
        )?),
        SinkKind::Webhook => Box::new(WebhookSink::from_settings(
            http.clone(),
            config,
            &settings.webhook,
        )?),
    };
    Ok(sink)
}

fn schedule_for(kind: SinkKind, settings: &Settings) -> (bool, &NotificationSchedule) {
    match kind {
        SinkKind::PubSub => (settings.pubsub.enabled, &settings.pubsub.schedule),
        SinkKind::Webhook => (settings.webhook.enabled, &settings.webhook.schedule),
    }
}

/// Refresh the forecast for the current location, falling back to an expired
/// cache entry when the network fails and nothing else is loaded.
async fn refresh<S: SettingsStore>(app: &mut App<S>, client: &ForecastClient) {
    let location = app.settings().location.clone();
    let token = app.begin_refresh();
    let result = client.fetch_cached(&location).await;
    let failed = result.is_err();
    if app.complete_refresh(token, result) && failed {
        if let Some(stale) = client.cached(&location) {
            warn!("Showing cached forecast from {}", stale.fetched_at);
            app.restore_stale(stale);
        }
    }
}

/// One schedule check for one sink at wall-clock `now`. Returns the sink and
/// payload when a scheduled notification is due and there is data to report.
fn scheduled_dispatch<S: SettingsStore>(
    app: &App<S>,
    guard: &mut FireGuard,
    kind: SinkKind,
    http: &reqwest::Client,
    config: &NotifyConfig,
    now: DateTime<Local>,
) -> Option<(Box<dyn Sink>, Dispatch)> {
    let settings = app.settings();
    let (enabled, schedule) = schedule_for(kind, settings);
    if !enabled || !guard.check(schedule, now.naive_local()) {
        return None;
    }
    let sink = match build_sink(kind, http, config, settings) {
        Ok(sink) => sink,
        Err(e) => {
            warn!("Skipping scheduled notification: {}", e);
            return None;
        }
    };
    match app.dispatch(now.with_timezone(&Utc), Trigger::Scheduled) {
        Some(dispatch) => Some((sink, dispatch)),
        None => {
            info!("Nothing to report for scheduled {} notification", sink.name());
            None
        }
    }
}

/// Wall-clock time of a tick deadline, so a tick handled late is still judged
/// against the minute it was due in.
fn wall_clock_at(deadline: Instant) -> DateTime<Local> {
    let late = Instant::now().saturating_duration_since(deadline);
    Local::now() - chrono::Duration::from_std(late).unwrap_or_else(|_| chrono::Duration::zero())
}

/// Shared handles for the watch loop. Scheduled sends run as background tasks
/// so a slow sink never holds up the other one.
struct Watcher<'a> {
    client: &'a ForecastClient,
    http: &'a reqwest::Client,
    config: &'a NotifyConfig,
    sends: JoinSet<bool>,
}

impl Watcher<'_> {
    /// Poll one sink for the tick due at `deadline`. Settings are re-read first
    /// so edits from other invocations apply on the next minute.
    async fn poll<S: SettingsStore>(
        &mut self,
        app: &mut App<S>,
        guard: &mut FireGuard,
        kind: SinkKind,
        deadline: Instant,
    ) {
        let now = wall_clock_at(deadline);
        let moved = app.reload_settings();
        if let Some((sink, dispatch)) =
            scheduled_dispatch(app, guard, kind, self.http, self.config, now)
        {
            self.sends
                .spawn(async move { dispatch_scheduled(sink.as_ref(), &dispatch).await });
        }
        if moved {
            refresh(app, self.client).await;
        }
    }
}

async fn watch<S: SettingsStore>(
    app: &mut App<S>,
    client: &ForecastClient,
    http: &reqwest::Client,
    config: &Config,
) -> anyhow::Result<()> {
    let poll = Duration::from_secs(config.notify.poll_interval_secs.max(1));
    let refresh_every = Duration::from_secs(config.notify.refresh_interval_minutes.max(1) * 60);
    info!(
        "Watching {} (poll every {:?}, refresh every {:?})",
        app.settings().location.label(),
        poll,
        refresh_every
    );

    refresh(app, client).await;

    // The first tick completes immediately, so both sinks are checked on start
    let mut pubsub_tick = interval(poll);
    pubsub_tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut webhook_tick = interval(poll);
    webhook_tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut refresh_tick = interval_at(Instant::now() + refresh_every, refresh_every);
    refresh_tick.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let mut pubsub_guard = FireGuard::new();
    let mut webhook_guard = FireGuard::new();
    let mut watcher = Watcher {
        client,
        http,
        config: &config.notify,
        sends: JoinSet::new(),
    };

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            deadline = pubsub_tick.tick() => {
                watcher.poll(app, &mut pubsub_guard, SinkKind::PubSub, deadline).await;
            }
            deadline = webhook_tick.tick() => {
                watcher.poll(app, &mut webhook_guard, SinkKind::Webhook, deadline).await;
            }
            _ = refresh_tick.tick() => {
                app.reload_settings();
                refresh(app, client).await;
            }
            Some(joined) = watcher.sends.join_next(), if !watcher.sends.is_empty() => {
                if let Err(e) = joined {
                    warn!("Notification task failed: {}", e);
                }
            }
            result = &mut shutdown => {
                result.context("listening for Ctrl-C")?;
                info!("Shutting down");
                return Ok(());
            }
        }
    }
}

async fn send<S: SettingsStore>(
    app: &App<S>,
    choice: SinkChoice,
    http: &reqwest::Client,
    config: &NotifyConfig,
) -> anyhow::Result<()> {
    let Some(dispatch) = app.dispatch(Utc::now(), Trigger::Manual) else {
        bail!("nothing to report: no forecast data for the current hour");
    };

    let mut sent = 0;
    let mut failures = Vec::new();
    for kind in choice.kinds() {
        let sink = match build_sink(kind, http, config, app.settings()) {
            Ok(sink) => sink,
            // Sending to "all" only covers sinks that are set up
            Err(e @ (NotifyError::Disabled(_) | NotifyError::MissingDestination(_)))
                if choice == SinkChoice::All =>
            {
                debug!("Skipping: {}", e);
                continue;
            }
            Err(e) => {
                failures.push(e);
                continue;
            }
        };
        match dispatch_manual(sink.as_ref(), &dispatch).await {
            Ok(()) => {
                println!("Sent via {}", sink.name());
                sent += 1;
            }
            Err(e) => failures.push(e),
        }
    }

    if let Some(first) = failures.into_iter().next() {
        return Err(first.into());
    }
    if sent == 0 {
        bail!("no notification sink is enabled and configured");
    }
    Ok(())
}

/// Write the default configuration, refusing to replace a file unless forced.
fn init_config(path: &Path, force: bool) -> anyhow::Result<()> {
    if path.exists() && !force {
        bail!("{} already exists (use --force to replace it)", path.display());
    }
    Config::default()
        .save(path)
        .map_err(|e| anyhow::anyhow!("writing {}: {}", path.display(), e))
}

fn print_locations(settings: &Settings) {
    if settings.saved_locations.is_empty() {
        println!("No saved locations");
        return;
    }
    for location in &settings.saved_locations {
        let marker = if location.id == settings.location.id { "*" } else { " " };
        println!("{marker} {:>10}  {}", location.id, location.label());
    }
}

fn set_action(setting: SetCommand) -> Action {
    match setting {
        SetCommand::WindUnit { unit } => Action::SetWindUnit(unit),
        SetCommand::TempUnit { unit } => Action::SetTempUnit(unit),
        SetCommand::Theme { theme } => Action::SetTheme(theme),
        SetCommand::Mode { mode } => Action::SetViewMode(mode),
        SetCommand::Hourly { on } => Action::SetShowHourly(on),
        SetCommand::Card { mode, card, on } => Action::SetCard { mode, card, on },
        SetCommand::CustomFields { fields } => Action::SetCustomFields(fields),
    }
}

/// Main application entry point.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "surf_watch=info,surf_watch_lib=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = Config::load_from_path(&cli.config);
    let store = FileStore::new(&config.storage.dir);
    let mut app = App::new(store);

    let client = ForecastClient::new(
        config.providers.clone(),
        &config.notify.user_agent,
        Some(config.storage.dir.join("cache")),
        config.storage.cache_ttl(),
    )?;
    let http = reqwest::Client::builder()
        .user_agent(&config.notify.user_agent)
        .timeout(Duration::from_secs(config.providers.timeout_secs))
        .build()?;

    match cli.command.unwrap_or(Command::Show) {
        Command::Show => {
            refresh(&mut app, &client).await;
            println!("{}", render_dashboard(app.state(), Utc::now()));
        }
        Command::Message => {
            refresh(&mut app, &client).await;
            if let Some(error) = &app.state().error {
                warn!("{}", error);
            }
            let message = app.compose_message(Utc::now());
            if message.is_empty() {
                println!("No data for the current hour");
            } else {
                println!("{message}");
            }
        }
        Command::Search { query } => {
            let results = client.search(&query.join(" ")).await?;
            if results.is_empty() {
                println!("No matches");
            }
            for (i, location) in results.iter().enumerate() {
                println!(
                    "{:>2}. {:>10}  {}  ({:.4}, {:.4}, {})",
                    i + 1,
                    location.id,
                    location.label(),
                    location.latitude,
                    location.longitude,
                    location.timezone
                );
            }
        }
        Command::Location { action } => match action {
            LocationCommand::Use { query, pick } => {
                let results = client.search(&query.join(" ")).await?;
                let Some(location) = pick.checked_sub(1).and_then(|i| results.get(i)) else {
                    bail!("no search result #{} for '{}'", pick, query.join(" "));
                };
                let label = location.label();
                app.apply(Action::UseLocation(location.clone()))?;
                println!("Current location: {label}");
            }
            LocationCommand::Save => {
                let current = app.settings().location.clone();
                if app.apply(Action::SaveLocation(current.clone()))? {
                    println!("Saved {}", current.label());
                } else {
                    println!("{} is already saved", current.label());
                }
            }
            LocationCommand::Select { id } => {
                if !app.apply(Action::SelectSaved(id))? {
                    let current = app.settings().location.id == id;
                    if !current {
                        bail!("no saved location with id {id}");
                    }
                }
                println!("Current location: {}", app.settings().location.label());
            }
            LocationCommand::Delete { id } => {
                if !app.apply(Action::DeleteSaved(id))? {
                    bail!("no saved location with id {id}");
                }
                println!("Deleted saved location {id}");
            }
            LocationCommand::List => print_locations(app.settings()),
        },
        Command::Set { setting } => {
            let changed = app.apply(set_action(setting))?;
            println!("{}", if changed { "Updated" } else { "Unchanged" });
        }
        Command::Notify { sink } => match sink {
            NotifyCommand::Pubsub { topic, schedule } => {
                let mut pubsub = app.settings().pubsub.clone();
                let mut touched =
                    apply_schedule_args(&schedule, &mut pubsub.schedule, &mut pubsub.enabled)?;
                if let Some(topic) = topic {
                    pubsub.topic = topic.trim().to_string();
                    touched = true;
                }
                if touched {
                    app.apply(Action::SetPubSub(pubsub))?;
                }
                let pubsub = &app.settings().pubsub;
                println!(
                    "pub/sub: {}",
                    describe_schedule(pubsub.enabled, &pubsub.topic, &pubsub.schedule)
                );
            }
            NotifyCommand::Webhook { url, schedule } => {
                let mut webhook = app.settings().webhook.clone();
                let mut touched =
                    apply_schedule_args(&schedule, &mut webhook.schedule, &mut webhook.enabled)?;
                if let Some(url) = url {
                    webhook.url = url.trim().to_string();
                    touched = true;
                }
                if touched {
                    app.apply(Action::SetWebhook(webhook))?;
                }
                let webhook = &app.settings().webhook;
                println!(
                    "webhook: {}",
                    describe_schedule(webhook.enabled, &webhook.url, &webhook.schedule)
                );
            }
        },
        Command::Send { sink } => {
            refresh(&mut app, &client).await;
            send(&app, sink, &http, &config.notify).await?;
        }
        Command::Watch => watch(&mut app, &client, &http, &config).await?,
        Command::Init { force } => {
            init_config(&cli.config, force)?;
            println!("Wrote {}", cli.config.display());
        }
    }

    Ok(())
}
