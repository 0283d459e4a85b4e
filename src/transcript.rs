use anyhow::Result;
use async_trait::async_trait;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::warn;

use crate::notifier::{Author, Notification, NotificationSink};

/// Chat transcript. Optionally persisted as one JSON object per line.
pub struct Transcript {
    entries: Mutex<Vec<Notification>>,
    path: Option<PathBuf>,
    tz: chrono_tz::Tz,
}

impl Transcript {
    pub fn in_memory(tz: chrono_tz::Tz) -> Self {
        Self { entries: Mutex::new(Vec::new()), path: None, tz }
    }

    /// Loads whatever is already at `path`; unreadable lines are skipped.
    pub fn open(path: impl AsRef<Path>, tz: chrono_tz::Tz) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let mut entries = Vec::new();
        if path.exists() {
            for (n, line) in fs::read_to_string(&path)?.lines().enumerate() {
                if line.trim().is_empty() {
                    continue;
                }
                match serde_json::from_str::<Notification>(line) {
                    Ok(e) => entries.push(e),
                    Err(e) => warn!(line = n + 1, error = %e, "transcript.skip_line"),
                }
            }
        }
        Ok(Self { entries: Mutex::new(entries), path: Some(path), tz })
    }

    pub fn entries(&self) -> Vec<Notification> {
        self.entries.lock().map(|e| e.clone()).unwrap_or_default()
    }

    pub fn texts(&self) -> Vec<String> {
        self.entries().into_iter().map(|e| e.text).collect()
    }

    pub fn render(&self, note: &Notification) -> String {
        let at = note.at.with_timezone(&self.tz).format("%H:%M:%S");
        let who = match note.author {
            Author::User => "you",
            Author::Ai => "lyra",
        };
        format!("[{at}] {who}: {}", note.text)
    }

    fn persist(&self, note: &Notification) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let mut f = OpenOptions::new().create(true).append(true).open(path)?;
        writeln!(f, "{}", serde_json::to_string(note)?)?;
        Ok(())
    }
}

#[async_trait]
impl NotificationSink for Transcript {
    async fn post(&self, note: Notification) {
        if let Err(e) = self.persist(&note) {
            warn!(error = %e, "transcript.persist_failed");
        }
        if let Ok(mut entries) = self.entries.lock() {
            entries.push(note);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notifier::Level;

    #[tokio::test]
    async fn persisted_entries_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chat.jsonl");

        let t = Transcript::open(&path, chrono_tz::UTC).unwrap();
        t.post(Notification::user("stake 30% of my surplus")).await;
        t.post(Notification::ai(Level::Success, "done")).await;

        let again = Transcript::open(&path, chrono_tz::UTC).unwrap();
        assert_eq!(again.texts(), vec!["stake 30% of my surplus", "done"]);
        assert_eq!(again.entries()[0].author, Author::User);
    }

    #[tokio::test]
    async fn garbage_lines_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chat.jsonl");
        fs::write(&path, "not json\n\n").unwrap();

        let t = Transcript::open(&path, chrono_tz::UTC).unwrap();
        assert!(t.entries().is_empty());
    }

    #[test]
    fn render_uses_configured_zone() {
        let t = Transcript::in_memory(chrono_tz::Africa::Lagos);
        let mut note = Notification::ai(Level::Info, "hi");
        note.at = "2026-01-01T10:00:00Z".parse().unwrap();
        assert_eq!(t.render(&note), "[11:00:00] lyra: hi");
    }
}
