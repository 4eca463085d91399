//! Outbound alert notifications.
//!
//! Delivery is best effort: every failure is logged and swallowed so a slow or
//! broken webhook never affects sampling.

use serde::Serialize;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Default bound on a single webhook request.
pub const DEFAULT_NOTIFY_TIMEOUT: Duration = Duration::from_secs(10);

/// Sends a text message on behalf of a host.
pub trait Notifier: Send + Sync + 'static {
    fn notify(&self, hostname: &str, text: &str) -> impl Future<Output = ()> + Send;
}

/// Writes notifications to the log when no webhook is configured.
#[derive(Debug, Clone, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    async fn notify(&self, hostname: &str, text: &str) {
        info!(host = %hostname, "{}", text);
    }
}

#[derive(Serialize)]
struct SlackMessage<'a> {
    text: &'a str,
}

/// Posts notifications to a Slack incoming webhook.
#[derive(Debug, Clone)]
pub struct SlackNotifier {
    client: reqwest::Client,
    url: String,
}

impl SlackNotifier {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }

    async fn post(&self, hostname: &str, text: &str) -> anyhow::Result<()> {
        let body = slack_payload(hostname, text)?;
        let response = self
            .client
            .post(&self.url)
            .form(&[("payload", body)])
            .send()
            .await?;
        let status = response.status();
        // Drain the body so the connection can be reused.
        let _ = response.bytes().await;
        if !status.is_success() {
            anyhow::bail!("webhook responded with {}", status);
        }
        Ok(())
    }
}

impl Notifier for SlackNotifier {
    async fn notify(&self, hostname: &str, text: &str) {
        match self.post(hostname, text).await {
            Ok(()) => debug!("Notification delivered to webhook"),
            Err(e) => warn!("Failed to post webhook notification: {}: {}", e, text),
        }
    }
}

/// JSON body of a webhook message.
pub fn slack_payload(hostname: &str, text: &str) -> Result<String, serde_json::Error> {
    let text = format!("report from host {}\n{}", hostname, text);
    serde_json::to_string(&SlackMessage { text: &text })
}

/// Notifier chosen from configuration.
#[derive(Debug, Clone)]
pub enum AnyNotifier {
    Log(LogNotifier),
    Slack(SlackNotifier),
}

impl AnyNotifier {
    /// Uses the webhook when a non-empty URL is configured, the log otherwise.
    pub fn from_url(url: Option<&str>, timeout: Duration) -> Result<Self, reqwest::Error> {
        match url.map(str::trim).filter(|u| !u.is_empty()) {
            Some(url) => Ok(AnyNotifier::Slack(SlackNotifier::new(url, timeout)?)),
            None => Ok(AnyNotifier::Log(LogNotifier)),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            AnyNotifier::Log(_) => "log",
            AnyNotifier::Slack(_) => "slack",
        }
    }
}

impl Notifier for AnyNotifier {
    async fn notify(&self, hostname: &str, text: &str) {
        match self {
            AnyNotifier::Log(n) => n.notify(hostname, text).await,
            AnyNotifier::Slack(n) => n.notify(hostname, text).await,
        }
    }
}
