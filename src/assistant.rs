use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::domain::{ActionOutcome, Session};
use crate::error::{ActionError, ReportError};
use crate::notifier::{Level, Notification};
use crate::split::SplitExecutor;

const UNAVAILABLE: &str = "Sorry, I am having trouble connecting right now. Please try again later.";

/// Chat front door: user text goes to the AI parser, its reply goes to the
/// transcript, and `execute_split` / `generate_report` intents are carried out.
#[derive(Clone)]
pub struct Assistant {
    split: SplitExecutor,
    report_dir: PathBuf,
}

impl Assistant {
    pub fn new(split: SplitExecutor) -> Self {
        Self { split, report_dir: PathBuf::from(".") }
    }

    pub fn with_report_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.report_dir = dir.into();
        self
    }

    /// Downloads the weekly summary into the report directory and tells the
    /// transcript where it went, or why it could not be produced.
    pub async fn download_report(&self) -> Result<PathBuf, ReportError> {
        let sink = self.split.engine().sink();
        match save_report(self, &self.report_dir).await {
            Ok(path) => {
                info!(path = %path.display(), "assistant.report_saved");
                sink.post(Notification::ai(Level::Success, format!("Your weekly report is ready: {}", path.display())))
                    .await;
                Ok(path)
            }
            Err(e) => {
                warn!(error = %e, "assistant.report_failed");
                sink.post(Notification::ai(Level::Error, format!("Sorry, I couldn't generate the report right now: {e}")))
                    .await;
                Err(e)
            }
        }
    }

    pub async fn handle_message(&self, session: &Session, text: &str) -> Vec<ActionOutcome> {
        let text = text.trim();
        if text.is_empty() {
            return Vec::new();
        }
        let engine = self.split.engine();
        let sink = engine.sink();
        sink.post(Notification::user(text)).await;

        let parsed = match engine.backend().parse_intent(text, &session.wallet_address).await {
            Ok(p) => p,
            Err(e) => {
                warn!(error = %e, "assistant.parse_failed");
                sink.post(Notification::ai(Level::Error, UNAVAILABLE)).await;
                return Vec::new();
            }
        };
        if let Some(reply) = parsed.reply.filter(|r| !r.trim().is_empty()) {
            sink.post(Notification::ai(Level::Info, reply)).await;
        }

        let Some(intent) = parsed.intent else {
            return Vec::new();
        };
        match intent.action.as_str() {
            "execute_split" => {
                info!("assistant.execute_split");
                let suggested = intent.suggested_split.unwrap_or(Value::Null);
                self.split.execute_split(session, &suggested).await
            }
            "generate_report" => {
                // Outcome already posted to the transcript.
                let _ = self.download_report().await;
                Vec::new()
            }
            other => {
                debug!(action = other, "assistant.intent_ignored");
                Vec::new()
            }
        }
    }
}

async fn save_report(assistant: &Assistant, dir: &Path) -> Result<PathBuf, ReportError> {
    let pdf = assistant.split.engine().backend().download_report().await?;
    let name = format!("LyraAI_Weekly_Report_{}.pdf", chrono::Utc::now().format("%Y-%m-%d"));
    tokio::fs::create_dir_all(dir).await?;
    let path = dir.join(name);
    tokio::fs::write(&path, &pdf).await?;
    Ok(path)
}

/// Failures in `outcomes` that need a human.
pub fn escalations(outcomes: &[ActionOutcome]) -> Vec<&ActionError> {
    outcomes
        .iter()
        .filter_map(ActionOutcome::error)
        .filter(|e| e.needs_escalation())
        .collect()
}
