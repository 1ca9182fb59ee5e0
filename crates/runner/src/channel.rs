//! File-backed event channel between the worker and the orchestrator
//!
//! The worker appends one JSON record per line. The orchestrator polls the
//! file and keeps a cursor of how many complete lines it has already handed
//! out, so every record is returned exactly once and in append order.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::error::VisregResult;

/// Append-only record stream backed by a single file
#[derive(Debug)]
pub struct EventChannel {
    path: PathBuf,

    /// Number of complete records already returned by `poll_new`
    cursor: usize,
}

impl EventChannel {
    /// Create a channel on a fresh, uniquely named temporary file
    pub fn temporary() -> VisregResult<Self> {
        let path = tempfile::Builder::new()
            .prefix("visreg-channel-")
            .suffix(".jsonl")
            .tempfile()?
            .into_temp_path()
            .keep()
            .map_err(|e| e.error)?;

        debug!("Opened event channel at {}", path.display());
        Ok(Self { path, cursor: 0 })
    }

    /// Open a channel at `location`, truncating anything already there
    pub fn open(location: impl Into<PathBuf>) -> VisregResult<Self> {
        let path = location.into();
        std::fs::write(&path, b"")?;

        Ok(Self { path, cursor: 0 })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Return the records appended since the previous poll
    ///
    /// Only newline-terminated records are returned. A trailing fragment the
    /// worker has not finished writing stays unread until its terminator
    /// shows up.
    pub async fn poll_new(&mut self) -> VisregResult<Vec<String>> {
        let content = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => Vec::new(),
            Err(e) => return Err(e.into()),
        };
        let content = String::from_utf8_lossy(&content);

        let mut records: Vec<&str> = content.split('\n').collect();
        records.pop();

        let fresh = records
            .get(self.cursor..)
            .unwrap_or_default()
            .iter()
            .map(|r| r.trim_end_matches('\r').to_string())
            .collect();

        self.cursor = self.cursor.max(records.len());
        Ok(fresh)
    }

    /// Delete the backing file
    pub fn close(self) -> VisregResult<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                warn!("Event channel {} was already removed", self.path.display());
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    fn append(path: &Path, data: &str) {
        let mut file = std::fs::OpenOptions::new().append(true).open(path).unwrap();
        file.write_all(data.as_bytes()).unwrap();
    }

    #[tokio::test]
    async fn test_poll_returns_only_new_records() {
        let tmp = TempDir::new().unwrap();
        let mut channel = EventChannel::open(tmp.path().join("channel.jsonl")).unwrap();

        append(channel.path(), "[\"onPass\"]\n[\"onFail\"]\n");
        assert_eq!(channel.poll_new().await.unwrap(), vec!["[\"onPass\"]", "[\"onFail\"]"]);
        assert_eq!(channel.cursor(), 2);

        append(channel.path(), "[\"onComplete\"]\n");
        assert_eq!(channel.poll_new().await.unwrap(), vec!["[\"onComplete\"]"]);
        assert_eq!(channel.cursor(), 3);
    }

    #[tokio::test]
    async fn test_repeated_poll_is_idempotent() {
        let tmp = TempDir::new().unwrap();
        let mut channel = EventChannel::open(tmp.path().join("channel.jsonl")).unwrap();

        append(channel.path(), "[\"onPass\"]\n");
        assert_eq!(channel.poll_new().await.unwrap().len(), 1);
        assert!(channel.poll_new().await.unwrap().is_empty());
        assert!(channel.poll_new().await.unwrap().is_empty());
        assert_eq!(channel.cursor(), 1);
    }

    #[tokio::test]
    async fn test_partial_record_waits_for_terminator() {
        let tmp = TempDir::new().unwrap();
        let mut channel = EventChannel::open(tmp.path().join("channel.jsonl")).unwrap();

        append(channel.path(), "[\"onPass\"]\n[\"onFa");
        assert_eq!(channel.poll_new().await.unwrap(), vec!["[\"onPass\"]"]);

        append(channel.path(), "il\"]\n");
        assert_eq!(channel.poll_new().await.unwrap(), vec!["[\"onFail\"]"]);
    }

    #[tokio::test]
    async fn test_blank_lines_are_records() {
        let tmp = TempDir::new().unwrap();
        let mut channel = EventChannel::open(tmp.path().join("channel.jsonl")).unwrap();

        append(channel.path(), "\n[\"onPass\"]\n");
        assert_eq!(channel.poll_new().await.unwrap(), vec!["", "[\"onPass\"]"]);
    }

    #[tokio::test]
    async fn test_missing_file_reads_empty() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("channel.jsonl");
        let mut channel = EventChannel::open(&path).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert!(channel.poll_new().await.unwrap().is_empty());
        assert_eq!(channel.cursor(), 0);
    }

    #[tokio::test]
    async fn test_temporary_channel_close_removes_file() {
        let channel = EventChannel::temporary().unwrap();
        let path = channel.path().to_path_buf();
        assert!(path.exists());

        channel.close().unwrap();
        assert!(!path.exists());
    }
}
