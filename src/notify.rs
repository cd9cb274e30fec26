//! # Notification Dispatch
//!
//! Pushes a composed summary to external sinks. Every sink implements
//! [`Sink`] and owns the translation of a [`Dispatch`] into its own wire
//! payload:
//!
//! - [`PubSubSink`]: `POST {base}/{topic}` with `{"message": ...}` and fixed
//!   `Title`/`Priority`/`Tags` headers
//! - [`WebhookSink`]: chat webhook; manual sends get a rich embed, scheduled
//!   sends a plain `{"content": ...}`
//!
//! Delivery is best-effort: one attempt, no retry, no backoff. Scheduled
//! sends log and swallow failures ([`dispatch_scheduled`]); manual sends
//! return them to the caller ([`dispatch_manual`]).

use crate::config::NotifyConfig;
use crate::settings::{PubSubSettings, WebhookSettings};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::header::USER_AGENT;
use serde::Serialize;
use thiserror::Error;
use tracing::{error, info, warn};

/// Label reported in the embed's "Service" field.
pub const SERVICE_LABEL: &str = "Surf Watch";

#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("{0} notifications are disabled")]
    Disabled(&'static str),

    #[error("{0} has no destination configured")]
    MissingDestination(&'static str),

    /// Sink answered with a non-2xx status
    #[error("{sink} returned HTTP {status}")]
    Status { sink: &'static str, status: u16 },

    /// Request never got a response
    #[error("{sink} request failed: {source}")]
    Network {
        sink: &'static str,
        #[source]
        source: reqwest::Error,
    },
}

/// What caused a dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    Scheduled,
    Manual,
}

/// One summary to deliver.
#[derive(Debug, Clone)]
pub struct Dispatch {
    pub message: String,
    /// Location label shown alongside the message
    pub location: String,
    pub timestamp: DateTime<Utc>,
    pub trigger: Trigger,
}

#[async_trait]
pub trait Sink: Send + Sync {
    fn name(&self) -> &'static str;

    async fn send(&self, dispatch: &Dispatch) -> Result<(), NotifyError>;
}

/// Send on behalf of the user and surface any failure.
pub async fn dispatch_manual(sink: &dyn Sink, dispatch: &Dispatch) -> Result<(), NotifyError> {
    sink.send(dispatch).await?;
    info!("Sent {} notification", sink.name());
    Ok(())
}

/// Send from the schedule; failures are logged, never propagated.
///
/// Returns whether the send succeeded.
pub async fn dispatch_scheduled(sink: &dyn Sink, dispatch: &Dispatch) -> bool {
    match sink.send(dispatch).await {
        Ok(()) => {
            info!("Scheduled {} notification delivered", sink.name());
            true
        }
        Err(e) => {
            warn!("Scheduled {} notification dropped: {}", sink.name(), e);
            false
        }
    }
}

async fn post_json<T: Serialize + ?Sized>(
    sink: &'static str,
    request: reqwest::RequestBuilder,
    body: &T,
) -> Result<(), NotifyError> {
    let response = request
        .json(body)
        .send()
        .await
        .map_err(|source| NotifyError::Network { sink, source })?;
    let status = response.status();
    if !status.is_success() {
        return Err(NotifyError::Status {
            sink,
            status: status.as_u16(),
        });
    }
    Ok(())
}

// -- Pub/sub --

#[derive(Debug, Serialize, PartialEq)]
pub struct PubSubPayload {
    pub message: String,
}

pub fn pubsub_payload(dispatch: &Dispatch) -> PubSubPayload {
    PubSubPayload {
        message: dispatch.message.clone(),
    }
}

pub struct PubSubSink {
    http: reqwest::Client,
    url: String,
    title: String,
    priority: String,
    tags: String,
}

impl PubSubSink {
    pub const NAME: &'static str = "pub/sub";

    pub fn new(http: reqwest::Client, config: &NotifyConfig, topic: &str) -> Self {
        Self {
            http,
            url: format!(
                "{}/{}",
                config.pubsub_base_url.trim_end_matches('/'),
                topic.trim_matches('/')
            ),
            title: config.pubsub_title.clone(),
            priority: config.pubsub_priority.clone(),
            tags: config.pubsub_tags.clone(),
        }
    }

    /// Build the sink from user settings, rejecting disabled or unconfigured ones.
    pub fn from_settings(
        http: reqwest::Client,
        config: &NotifyConfig,
        settings: &PubSubSettings,
    ) -> Result<Self, NotifyError> {
        if !settings.enabled {
            return Err(NotifyError::Disabled(Self::NAME));
        }
        if settings.topic.trim().is_empty() {
            return Err(NotifyError::MissingDestination(Self::NAME));
        }
        Ok(Self::new(http, config, &settings.topic))
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl Sink for PubSubSink {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    async fn send(&self, dispatch: &Dispatch) -> Result<(), NotifyError> {
        let request = self
            .http
            .post(&self.url)
            .header("Title", &self.title)
            .header("Priority", &self.priority)
            .header("Tags", &self.tags);
        post_json(Self::NAME, request, &pubsub_payload(dispatch))
            .await
            .inspect_err(|e| error!("Pub/sub notification to {} failed: {}", self.url, e))
    }
}

// -- Webhook --

#[derive(Debug, Serialize, PartialEq)]
pub struct EmbedThumbnail {
    pub url: String,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct EmbedField {
    pub name: String,
    pub value: String,
    pub inline: bool,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct Embed {
    pub title: String,
    pub description: String,
    pub color: u32,
    pub timestamp: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<EmbedThumbnail>,
    pub fields: Vec<EmbedField>,
}

#[derive(Debug, Serialize, PartialEq)]
#[serde(untagged)]
pub enum WebhookPayload {
    Embed {
        username: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        avatar_url: Option<String>,
        embeds: Vec<Embed>,
    },
    Content {
        content: String,
    },
}

pub struct WebhookSink {
    http: reqwest::Client,
    url: String,
    username: String,
    avatar_url: Option<String>,
    thumbnail_url: Option<String>,
    color: u32,
    user_agent: String,
}

impl WebhookSink {
    pub const NAME: &'static str = "webhook";

    pub fn new(http: reqwest::Client, config: &NotifyConfig, url: &str) -> Self {
        Self {
            http,
            url: url.trim().to_string(),
            username: config.webhook_username.clone(),
            avatar_url: config.webhook_avatar_url.clone(),
            thumbnail_url: config.webhook_thumbnail_url.clone(),
            color: config.webhook_color,
            user_agent: config.user_agent.clone(),
        }
    }

    /// Build the sink from user settings, rejecting disabled or unconfigured ones.
    pub fn from_settings(
        http: reqwest::Client,
        config: &NotifyConfig,
        settings: &WebhookSettings,
    ) -> Result<Self, NotifyError> {
        if !settings.enabled {
            return Err(NotifyError::Disabled(Self::NAME));
        }
        if settings.url.trim().is_empty() {
            return Err(NotifyError::MissingDestination(Self::NAME));
        }
        Ok(Self::new(http, config, &settings.url))
    }

    /// Payload for a dispatch: embed for manual sends, plain content otherwise.
    pub fn payload(&self, dispatch: &Dispatch) -> WebhookPayload {
        match dispatch.trigger {
            Trigger::Scheduled => WebhookPayload::Content {
                content: dispatch.message.clone(),
            },
            Trigger::Manual => WebhookPayload::Embed {
                username: self.username.clone(),
                avatar_url: self.avatar_url.clone(),
                embeds: vec![self.embed(dispatch)],
            },
        }
    }

    fn embed(&self, dispatch: &Dispatch) -> Embed {
        Embed {
            title: format!("Conditions at {}", dispatch.location),
            description: dispatch.message.clone(),
            color: self.color,
            timestamp: dispatch.timestamp.to_rfc3339_opts(SecondsFormat::Secs, true),
            thumbnail: self
                .thumbnail_url
                .clone()
                .map(|url| EmbedThumbnail { url }),
            fields: vec![
                EmbedField {
                    name: "Location".to_string(),
                    value: dispatch.location.clone(),
                    inline: true,
                },
                EmbedField {
                    name: "Timestamp".to_string(),
                    value: dispatch.timestamp.format("%Y-%m-%d %H:%M UTC").to_string(),
                    inline: true,
                },
                EmbedField {
                    name: "Service".to_string(),
                    value: SERVICE_LABEL.to_string(),
                    inline: true,
                },
            ],
        }
    }
}

#[async_trait]
impl Sink for WebhookSink {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    async fn send(&self, dispatch: &Dispatch) -> Result<(), NotifyError> {
        let request = self.http.post(&self.url).header(USER_AGENT, &self.user_agent);
        post_json(Self::NAME, request, &self.payload(dispatch)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schedule::NotificationSchedule;
    use chrono::TimeZone;
    use serde_json::json;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    fn dispatch(trigger: Trigger) -> Dispatch {
        Dispatch {
            message: "Portland\nWind: 20 km/h NE".to_string(),
            location: "Portland, Maine".to_string(),
            timestamp: Utc.with_ymd_and_hms(2025, 7, 24, 13, 0, 0).unwrap(),
            trigger,
        }
    }

    fn request_complete(buf: &[u8]) -> bool {
        let text = String::from_utf8_lossy(buf);
        let Some(header_end) = text.find("\r\n\r\n") else {
            return false;
        };
        let length = text[..header_end]
            .lines()
            .find_map(|line| {
                let (name, value) = line.split_once(':')?;
                if name.eq_ignore_ascii_case("content-length") {
                    value.trim().parse::<usize>().ok()
                } else {
                    None
                }
            })
            .unwrap_or(0);
        buf.len() >= header_end + 4 + length
    }

    /// Accept one request, answer with `status`, return the raw request text.
    async fn serve_once(status: &'static str) -> (String, tokio::task::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = Vec::new();
            let mut chunk = [0u8; 4096];
            while !request_complete(&buf) {
                let n = socket.read(&mut chunk).await.unwrap();
                if n == 0 {
                    break;
                }
                buf.extend_from_slice(&chunk[..n]);
            }
            let response =
                format!("HTTP/1.1 {status}\r\ncontent-length: 0\r\nconnection: close\r\n\r\n");
            socket.write_all(response.as_bytes()).await.unwrap();
            String::from_utf8_lossy(&buf).into_owned()
        });
        (format!("http://{addr}"), handle)
    }

    #[test]
    fn test_pubsub_url_and_payload() {
        let mut config = NotifyConfig::default();
        config.pubsub_base_url = "https://ntfy.example/".to_string();
        let sink = PubSubSink::new(reqwest::Client::new(), &config, "/beach-report");
        assert_eq!(sink.url(), "https://ntfy.example/beach-report");

        let payload = serde_json::to_value(pubsub_payload(&dispatch(Trigger::Manual))).unwrap();
        assert_eq!(payload, json!({"message": "Portland\nWind: 20 km/h NE"}));
    }

    #[test]
    fn test_webhook_embed_payload() {
        let mut config = NotifyConfig::default();
        config.webhook_thumbnail_url = Some("https://img.example/wave.png".to_string());
        let sink = WebhookSink::new(reqwest::Client::new(), &config, "https://hook.example/x");

        let payload = serde_json::to_value(sink.payload(&dispatch(Trigger::Manual))).unwrap();
        assert_eq!(payload["username"], "Surf Watch");
        assert!(payload.get("avatar_url").is_none());

        let embed = &payload["embeds"][0];
        assert_eq!(embed["title"], "Conditions at Portland, Maine");
        assert_eq!(embed["description"], "Portland\nWind: 20 km/h NE");
        assert_eq!(embed["timestamp"], "2025-07-24T13:00:00Z");
        assert_eq!(embed["color"], 0x1E90FF);
        assert_eq!(embed["thumbnail"]["url"], "https://img.example/wave.png");

        let names: Vec<_> = embed["fields"]
            .as_array()
            .unwrap()
            .iter()
            .map(|f| f["name"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(names, ["Location", "Timestamp", "Service"]);
        assert_eq!(embed["fields"][2]["value"], SERVICE_LABEL);
    }

    #[test]
    fn test_webhook_scheduled_payload_is_plain_content() {
        let sink = WebhookSink::new(
            reqwest::Client::new(),
            &NotifyConfig::default(),
            "https://hook.example/x",
        );
        let payload = serde_json::to_value(sink.payload(&dispatch(Trigger::Scheduled))).unwrap();
        assert_eq!(payload, json!({"content": "Portland\nWind: 20 km/h NE"}));
    }

    #[test]
    fn test_from_settings_validation() {
        let config = NotifyConfig::default();
        let http = reqwest::Client::new();

        let disabled = PubSubSettings {
            enabled: false,
            topic: "t".to_string(),
            schedule: NotificationSchedule::default(),
        };
        assert!(matches!(
            PubSubSink::from_settings(http.clone(), &config, &disabled),
            Err(NotifyError::Disabled(_))
        ));

        let no_url = WebhookSettings {
            enabled: true,
            url: "  ".to_string(),
            schedule: NotificationSchedule::default(),
        };
        assert!(matches!(
            WebhookSink::from_settings(http, &config, &no_url),
            Err(NotifyError::MissingDestination(_))
        ));
    }

    #[tokio::test]
    async fn test_pubsub_sends_headers_and_body() {
        let (base, server) = serve_once("200 OK").await;
        let mut config = NotifyConfig::default();
        config.pubsub_base_url = base;
        let sink = PubSubSink::new(reqwest::Client::new(), &config, "beach");

        dispatch_manual(&sink, &dispatch(Trigger::Manual)).await.unwrap();

        let request = server.await.unwrap();
        let lower = request.to_ascii_lowercase();
        assert!(request.starts_with("POST /beach "), "{request}");
        assert!(lower.contains("title: surf watch"));
        assert!(lower.contains("priority: default"));
        assert!(lower.contains("tags: ocean,wind"));
        assert!(request.contains(r#"{"message":"Portland\nWind: 20 km/h NE"}"#));
    }

    #[tokio::test]
    async fn test_webhook_non_success_status_is_reported() {
        let (url, server) = serve_once("500 Internal Server Error").await;
        let sink = WebhookSink::new(reqwest::Client::new(), &NotifyConfig::default(), &url);

        let err = dispatch_manual(&sink, &dispatch(Trigger::Manual))
            .await
            .unwrap_err();
        assert!(matches!(err, NotifyError::Status { status: 500, .. }), "{err}");

        let request = server.await.unwrap().to_ascii_lowercase();
        assert!(request.contains("user-agent: surf-watch/"));
    }

    #[tokio::test]
    async fn test_network_failure_is_distinguished() {
        // Bind then drop to get a port nothing listens on
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let sink = WebhookSink::new(
            reqwest::Client::new(),
            &NotifyConfig::default(),
            &format!("http://{addr}/hook"),
        );
        let err = sink.send(&dispatch(Trigger::Manual)).await.unwrap_err();
        assert!(matches!(err, NotifyError::Network { .. }), "{err}");

        // The scheduled path swallows the same failure
        assert!(!dispatch_scheduled(&sink, &dispatch(Trigger::Scheduled)).await);
    }
}
