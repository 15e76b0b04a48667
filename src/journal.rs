//! Run journal
//!
//! Appends one JSON line per orchestration event to
//! `<state dir>/deploycache/journal.log` when `general.journal` is enabled.

use crate::config::{Config, ConfigManager};
use chrono::Utc;
use std::path::PathBuf;
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tracing::warn;

/// File-based journal that appends JSON lines
pub struct RunJournal {
    enabled: bool,
    path: PathBuf,
    run_id: String,
}

impl RunJournal {
    /// Create a journal from config, with a fresh run id
    pub fn new(config: &Config) -> Self {
        Self {
            enabled: config.general.journal,
            path: ConfigManager::journal_path(),
            run_id: uuid::Uuid::new_v4().to_string(),
        }
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Log an event as a JSON line
    ///
    /// IO failures are logged and dropped; the journal never fails a run.
    pub async fn log(&self, event: &str, data: &serde_json::Value) {
        if !self.enabled {
            return;
        }

        let entry = serde_json::json!({
            "timestamp": Utc::now().to_rfc3339(),
            "run_id": self.run_id,
            "event": event,
            "data": data,
        });

        let mut line = match serde_json::to_string(&entry) {
            Ok(s) => s,
            Err(e) => {
                warn!("Failed to serialize journal event: {}", e);
                return;
            }
        };
        line.push('\n');

        if let Err(e) = self.append(&line).await {
            warn!("Failed to write run journal {}: {}", self.path.display(), e);
        }
    }

    async fn append(&self, line: &str) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;

        file.write_all(line.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn journal_in(dir: &TempDir, enabled: bool) -> RunJournal {
        RunJournal {
            enabled,
            path: dir.path().join("state").join("journal.log"),
            run_id: "run-1".to_string(),
        }
    }

    #[tokio::test]
    async fn writes_json_line_with_run_id() {
        let dir = TempDir::new().unwrap();
        let journal = journal_in(&dir, true);

        journal
            .log("run.started", &serde_json::json!({"deployment": "python"}))
            .await;

        let content = tokio::fs::read_to_string(&journal.path).await.unwrap();
        let parsed: serde_json::Value = serde_json::from_str(content.trim()).unwrap();
        assert_eq!(parsed["event"], "run.started");
        assert_eq!(parsed["run_id"], "run-1");
        assert_eq!(parsed["data"]["deployment"], "python");
        assert!(parsed["timestamp"].is_string());
    }

    #[tokio::test]
    async fn appends_one_line_per_event() {
        let dir = TempDir::new().unwrap();
        let journal = journal_in(&dir, true);

        journal.log("run.started", &serde_json::json!({})).await;
        journal.log("run.completed", &serde_json::json!({})).await;

        let content = tokio::fs::read_to_string(&journal.path).await.unwrap();
        assert_eq!(content.lines().count(), 2);
    }

    #[tokio::test]
    async fn disabled_journal_writes_nothing() {
        let dir = TempDir::new().unwrap();
        let journal = journal_in(&dir, false);

        journal.log("run.started", &serde_json::json!({})).await;

        assert!(!journal.path.exists());
    }

    #[test]
    fn run_ids_are_unique() {
        let config = Config::default();
        assert_ne!(
            RunJournal::new(&config).run_id(),
            RunJournal::new(&config).run_id()
        );
    }
}
