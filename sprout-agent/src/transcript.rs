//! Session transcripts
//!
//! Each agent session can be written once, as pretty JSON, to a file named
//! after the time the session started.

use crate::agent::{AgentResult, ToolInvocation};
use crate::provider::{ChatMessage, UsageTracker};
use chrono::NaiveDateTime;
use serde::Serialize;
use sprout_error::{Error, ErrorKind, Result};
use std::path::{Path, PathBuf};

#[derive(Debug, Serialize)]
pub struct Transcript<'a> {
    pub started_at: String,
    pub prompt: &'a str,
    pub summary: &'a str,
    pub terminated: bool,
    pub chat_history: &'a [ChatMessage],
    pub invocations: &'a [ToolInvocation],
    pub usage: &'a UsageTracker,
    #[serde(skip)]
    file_stem: String,
}

impl<'a> Transcript<'a> {
    pub fn new(prompt: &'a str, started_at: NaiveDateTime, result: &'a AgentResult) -> Self {
        Self {
            started_at: started_at.format("%Y-%m-%dT%H:%M:%S").to_string(),
            prompt,
            summary: &result.summary,
            terminated: result.terminated,
            chat_history: &result.chat_history,
            invocations: &result.invocations,
            usage: &result.usage,
            file_stem: format!("chat_{}", started_at.format("%Y%m%d_%H%M%S")),
        }
    }

    /// File name this transcript is saved under
    pub fn file_name(&self) -> String {
        format!("{}.json", self.file_stem)
    }

    /// Write the transcript into `dir`, creating it if needed.
    pub fn save(&self, dir: impl AsRef<Path>) -> Result<PathBuf> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir).map_err(|e| {
            Error::from(e)
                .with_operation("transcript::save")
                .with_context("dir", dir.display().to_string())
        })?;

        let path = dir.join(self.file_name());
        let content = serde_json::to_string_pretty(self).map_err(|e| {
            Error::new(ErrorKind::ParseFailed, "failed to serialize transcript")
                .with_operation("transcript::save")
                .set_source(e)
        })?;
        std::fs::write(&path, content).map_err(|e| {
            Error::from(e)
                .with_operation("transcript::save")
                .with_context("path", path.display().to_string())
        })?;
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use tempfile::TempDir;

    fn result() -> AgentResult {
        AgentResult {
            summary: "Plant is fine".into(),
            chat_history: vec![ChatMessage::user("Does my plant need water?")],
            invocations: vec![ToolInvocation {
                call_id: "call_0".into(),
                name: "get_soil_moisture".into(),
                ok: true,
                output: "WET".into(),
            }],
            usage: UsageTracker::new(),
            terminated: true,
            transcript_path: None,
        }
    }

    #[test]
    fn test_file_name_from_start_time() {
        let started = NaiveDate::from_ymd_opt(2024, 3, 10)
            .unwrap()
            .and_hms_opt(7, 5, 9)
            .unwrap();
        let result = result();
        let transcript = Transcript::new("q", started, &result);
        assert_eq!(transcript.file_name(), "chat_20240310_070509.json");
    }

    #[test]
    fn test_save_creates_dir_and_writes_json() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path().join("transcripts");
        let started = NaiveDate::from_ymd_opt(2024, 3, 10)
            .unwrap()
            .and_hms_opt(7, 5, 9)
            .unwrap();
        let result = result();

        let path = Transcript::new("Does my plant need water?", started, &result)
            .save(&dir)
            .unwrap();

        let saved: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap();
        assert_eq!(saved["started_at"], "2024-03-10T07:05:09");
        assert_eq!(saved["summary"], "Plant is fine");
        assert_eq!(saved["chat_history"][0]["role"], "user");
        assert_eq!(saved["invocations"][0]["output"], "WET");
        assert!(saved.get("file_stem").is_none());
    }
}
