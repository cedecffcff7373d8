//! Result types handed back to callers of [`crate::OcrClient::process`].

use crate::task::TaskRecord;
use bytes::Bytes;
use serde::Serialize;
use std::path::PathBuf;

/// What happened to the optional archival upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ArchiveOutcome {
    /// Archival is not configured.
    Skipped,
    Stored { key: String },
    /// Upload failed; recognition went ahead regardless.
    Failed { key: String, error: String },
}

impl ArchiveOutcome {
    /// The failure text when the upload failed.
    pub fn warning(&self) -> Option<&str> {
        match self {
            ArchiveOutcome::Failed { error, .. } => Some(error),
            _ => None,
        }
    }
}

/// Timing and counters for one processed document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProcessStats {
    /// Status polls issued.
    pub polls: u32,
    pub artifact_bytes: usize,
    /// Wall-clock time for archival + submission.
    pub submit_duration_ms: u64,
    /// Wall-clock time spent between submission and a terminal status.
    pub wait_duration_ms: u64,
    pub download_duration_ms: u64,
    pub total_duration_ms: u64,
}

/// A finished recognition task and its artifact.
#[derive(Debug, Clone, Serialize)]
pub struct TaskResult {
    pub source: PathBuf,
    /// Last snapshot observed, with status `Completed`.
    pub task: TaskRecord,
    /// Raw bytes from `resultUrl`.
    #[serde(skip)]
    pub artifact: Bytes,
    pub archive: ArchiveOutcome,
    pub stats: ProcessStats,
}

impl TaskResult {
    /// The artifact as text, when it is valid UTF-8 (txt, xml, hOCR exports).
    pub fn artifact_text(&self) -> Option<&str> {
        std::str::from_utf8(&self.artifact).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::{TaskId, TaskStatus};

    fn result_with(artifact: &'static [u8]) -> TaskResult {
        TaskResult {
            source: PathBuf::from("scan.png"),
            task: TaskRecord::new(TaskId::new("t"), TaskStatus::Completed),
            artifact: Bytes::from_static(artifact),
            archive: ArchiveOutcome::Skipped,
            stats: ProcessStats::default(),
        }
    }

    #[test]
    fn artifact_text_for_utf8_only() {
        assert_eq!(result_with(b"Hello world").artifact_text(), Some("Hello world"));
        assert_eq!(result_with(b"\xff\xfe\x00").artifact_text(), None);
    }

    #[test]
    fn archive_warning_only_on_failure() {
        assert_eq!(ArchiveOutcome::Skipped.warning(), None);
        assert_eq!(ArchiveOutcome::Stored { key: "k".into() }.warning(), None);
        let failed = ArchiveOutcome::Failed {
            key: "k".into(),
            error: "access denied".into(),
        };
        assert_eq!(failed.warning(), Some("access denied"));
    }

    #[test]
    fn serialises_without_artifact_bytes() {
        let json = serde_json::to_value(result_with(b"secret text")).unwrap();
        assert!(json.get("artifact").is_none());
        assert_eq!(json["archive"]["outcome"], "skipped");
        assert_eq!(json["task"]["status"], "Completed");
    }
}
