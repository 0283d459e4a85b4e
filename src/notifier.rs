use anyhow::anyhow;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rand::Rng;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::warn;

use crate::domain::ActionOutcome;
use crate::error::ErrorCategory;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Author {
    User,
    Ai,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Info,
    Success,
    Warning,
    Error,
    /// Needs a human: chain and backend disagree.
    Critical,
}

/// One line of the user-facing feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub id: String,
    pub author: Author,
    pub level: Level,
    pub text: String,
    pub at: DateTime<Utc>,
}

impl Notification {
    pub fn ai(level: Level, text: impl Into<String>) -> Self {
        Self { id: new_id(), author: Author::Ai, level, text: text.into(), at: Utc::now() }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self { id: new_id(), author: Author::User, level: Level::Info, text: text.into(), at: Utc::now() }
    }

    pub fn from_outcome(outcome: &ActionOutcome) -> Self {
        let level = match outcome {
            ActionOutcome::Success(_) => Level::Success,
            ActionOutcome::Info(_) => Level::Info,
            ActionOutcome::Failure { error, .. } => match error.category() {
                ErrorCategory::Cancelled => Level::Warning,
                ErrorCategory::Confirmation => Level::Critical,
                _ => Level::Error,
            },
        };
        Self::ai(level, outcome.message())
    }
}

fn new_id() -> String {
    format!("{:016x}", rand::thread_rng().gen::<u64>())
}

/// Append-only destination for status messages.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn post(&self, note: Notification);
}

/// Posts to every inner sink in order.
#[derive(Clone, Default)]
pub struct Fanout {
    sinks: Vec<Arc<dyn NotificationSink>>,
}

impl Fanout {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, sink: Arc<dyn NotificationSink>) -> Self {
        self.sinks.push(sink);
        self
    }
}

#[async_trait]
impl NotificationSink for Fanout {
    async fn post(&self, note: Notification) {
        for sink in &self.sinks {
            sink.post(note.clone()).await;
        }
    }
}

/// Mirrors AI notifications to a Slack incoming webhook.
#[derive(Clone)]
pub struct SlackNotifier {
    webhook_url: String,
    http: Client,
}

#[derive(Serialize)]
struct SlackPayload<'a> {
    text: &'a str,
}

impl SlackNotifier {
    pub fn new(webhook_url: String) -> Self {
        Self { webhook_url, http: Client::new() }
    }

    pub async fn alert(&self, text: &str) -> anyhow::Result<()> {
        let resp = self
            .http
            .post(&self.webhook_url)
            .json(&SlackPayload { text })
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(anyhow!("slack webhook failed: {}", resp.status()));
        }

        Ok(())
    }
}

#[async_trait]
impl NotificationSink for SlackNotifier {
    async fn post(&self, note: Notification) {
        if note.author == Author::User {
            return;
        }
        let text = match note.level {
            Level::Critical => format!(":rotating_light: {}", note.text),
            _ => note.text,
        };
        // A dead webhook must not turn into an action failure.
        if let Err(e) = self.alert(&text).await {
            warn!(error = %e, "notifier.slack_failed");
        }
    }
}
