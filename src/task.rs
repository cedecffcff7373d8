//! Task data model and the pure polling decision.
//!
//! A [`TaskRecord`] is an immutable snapshot of one remote recognition job.
//! Each status poll produces a new snapshot; nothing here is mutated in
//! place. [`next_action`] maps a status to what the orchestrator does next
//! and has no I/O, so the whole state machine can be checked by feeding it
//! status sequences.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Service-assigned task identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(String);

impl TaskId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True for the all-zero identifier (`00000000-0000-0000-0000-000000000000`
    /// or any other spelling made only of `0` and `-`).
    ///
    /// The service never assigns it to a real task; seeing it means the
    /// request was built wrong, so it must never be polled.
    pub fn is_sentinel(&self) -> bool {
        self.0.contains('0') && self.0.chars().all(|c| c == '0' || c == '-')
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lifecycle state reported by the service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskStatus {
    Queued,
    InProgress,
    Completed,
    ProcessingFailed,
    Deleted,
    NotEnoughCredits,
    /// A status string this library does not know, kept verbatim.
    Unknown(String),
}

impl TaskStatus {
    /// Parse the wire spelling. `Submitted` (created, not yet queued) counts as queued.
    pub fn parse(raw: &str) -> Self {
        match raw.trim() {
            "Submitted" | "Queued" => TaskStatus::Queued,
            "InProgress" => TaskStatus::InProgress,
            "Completed" => TaskStatus::Completed,
            "ProcessingFailed" => TaskStatus::ProcessingFailed,
            "Deleted" => TaskStatus::Deleted,
            "NotEnoughCredits" => TaskStatus::NotEnoughCredits,
            other => TaskStatus::Unknown(other.to_string()),
        }
    }

    /// True once no further polling may happen.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskStatus::Completed
                | TaskStatus::ProcessingFailed
                | TaskStatus::Deleted
                | TaskStatus::NotEnoughCredits
        )
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TaskStatus::Queued => "Queued",
            TaskStatus::InProgress => "InProgress",
            TaskStatus::Completed => "Completed",
            TaskStatus::ProcessingFailed => "ProcessingFailed",
            TaskStatus::Deleted => "Deleted",
            TaskStatus::NotEnoughCredits => "NotEnoughCredits",
            TaskStatus::Unknown(raw) => raw,
        };
        f.write_str(s)
    }
}

/// One snapshot of a remote task, as decoded from a service response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskRecord {
    pub id: TaskId,
    pub status: TaskStatus,
    /// Where the artifact can be fetched. Always set when `status` is Completed.
    pub result_url: Option<String>,
    /// Additional artifacts when several export formats were requested.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extra_result_urls: Vec<String>,
    /// Service explanation for a ProcessingFailed task.
    pub error_message: Option<String>,
    pub registration_time: Option<String>,
    pub status_change_time: Option<String>,
    pub files_count: Option<u32>,
    pub credits: Option<u32>,
    /// Service estimate in seconds.
    pub estimated_processing_time: Option<u64>,
    pub description: Option<String>,
}

impl TaskRecord {
    /// A bare record with only the required fields set.
    pub fn new(id: TaskId, status: TaskStatus) -> Self {
        Self {
            id,
            status,
            result_url: None,
            extra_result_urls: Vec::new(),
            error_message: None,
            registration_time: None,
            status_change_time: None,
            files_count: None,
            credits: None,
            estimated_processing_time: None,
            description: None,
        }
    }
}

/// Why a task ended without an artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureKind {
    ProcessingFailed,
    NotEnoughCredits,
    Deleted,
    UnrecognizedStatus(String),
}

/// What the orchestrator does after observing a status.
///
/// "Done" has no variant: it is the orchestrator's successful return after
/// the `Download` step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NextAction {
    /// Wait one interval and ask again.
    Poll,
    /// Fetch the artifact from `result_url`.
    Download,
    /// Stop with a typed failure.
    Fail(FailureKind),
}

/// Decide the next step of the state machine from the latest status.
pub fn next_action(status: &TaskStatus) -> NextAction {
    match status {
        TaskStatus::Queued | TaskStatus::InProgress => NextAction::Poll,
        TaskStatus::Completed => NextAction::Download,
        TaskStatus::ProcessingFailed => NextAction::Fail(FailureKind::ProcessingFailed),
        TaskStatus::NotEnoughCredits => NextAction::Fail(FailureKind::NotEnoughCredits),
        TaskStatus::Deleted => NextAction::Fail(FailureKind::Deleted),
        TaskStatus::Unknown(raw) => NextAction::Fail(FailureKind::UnrecognizedStatus(raw.clone())),
    }
}
