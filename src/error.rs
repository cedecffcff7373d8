//! Error types for the cloud-ocr library.
//!
//! [`OcrError`] is what every public entry point returns. It is the one
//! typed outcome a caller sees when a document does not make it to a
//! downloaded artifact.
//!
//! The three pipeline components keep their own narrower errors so that each
//! can be tested on its own:
//!
//! * [`DecodeError`] for the response decoder (malformed or unexpected XML,
//!   and well-formed service error responses).
//! * [`TransportError`] for the HTTP layer.
//! * [`ArchiveError`] for the object-storage collaborator. Archival is best
//!   effort, so this error only reaches a caller as an
//!   [`crate::output::ArchiveOutcome::Failed`] note, or from client
//!   construction when the storage client cannot be configured at all.

use crate::task::TaskId;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// All fatal errors returned by the cloud-ocr library.
#[derive(Debug, Error)]
pub enum OcrError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Source document was not found at the given path.
    #[error("Source file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// The path exists but is a directory or some other non-regular file.
    #[error("Source path '{path}' is not a regular file")]
    NotAFile { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    // ── Remote errors ─────────────────────────────────────────────────────
    /// The HTTP exchange itself failed.
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// The service answered with a body we could not interpret.
    #[error("Could not decode service response: {0}")]
    Decode(#[source] DecodeError),

    /// The service answered with a well-formed error response.
    #[error("Service error: {message}")]
    Service { message: String },

    /// The service handed back the all-zero task identifier.
    #[error("Invalid task id '{task_id}': refusing to poll the all-zero identifier")]
    InvalidTaskId { task_id: TaskId },

    // ── Terminal task states ──────────────────────────────────────────────
    /// The service could not recognise the document.
    #[error("Task {task_id} failed: {}", message.as_deref().unwrap_or("(no message from service)"))]
    ProcessingFailed {
        task_id: TaskId,
        message: Option<String>,
    },

    /// The account ran out of credits before the task could run.
    #[error("Task {task_id} was not processed: not enough credits")]
    NotEnoughCredits { task_id: TaskId },

    /// The task was deleted on the service side before it completed.
    #[error("Task {task_id} was deleted")]
    TaskDeleted { task_id: TaskId },

    /// The service reported a status this library does not know about.
    #[error("Task {task_id} reported unrecognised status '{status}'")]
    UnrecognizedStatus { task_id: TaskId, status: String },

    /// Fetching the finished artifact from `resultUrl` failed.
    #[error("Failed to download result of task {task_id} from '{url}': {source}")]
    Download {
        task_id: TaskId,
        url: String,
        #[source]
        source: TransportError,
    },

    // ── Lifecycle ─────────────────────────────────────────────────────────
    /// The caller cancelled the operation.
    #[error("Processing cancelled")]
    Cancelled,

    /// Polling exceeded the configured `max_wait`.
    #[error("Task {task_id} did not finish within {}s", elapsed.as_secs())]
    Timeout { task_id: TaskId, elapsed: Duration },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The archival collaborator could not be constructed.
    #[error("Archive setup failed: {0}")]
    Archive(#[source] ArchiveError),

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write the output artifact file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl OcrError {
    /// True for the local-input family; these never touch the network.
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            OcrError::FileNotFound { .. }
                | OcrError::NotAFile { .. }
                | OcrError::PermissionDenied { .. }
        )
    }
}

impl From<DecodeError> for OcrError {
    fn from(err: DecodeError) -> Self {
        match err {
            DecodeError::Service { message } => OcrError::Service { message },
            other => OcrError::Decode(other),
        }
    }
}

/// Failure to turn a response body into a [`crate::task::TaskRecord`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// The body is a well-formed error response; `message` is the service's text verbatim.
    #[error("{message}")]
    Service { message: String },

    /// The `response` container held neither a task nor an error.
    #[error("response contains neither a task nor an error element")]
    UnknownResponse,

    /// The root element is not the expected `response` container.
    #[error("expected a <response> root element, found <{found}>")]
    MissingContainer { found: String },

    /// More than one task element where exactly one was expected.
    #[error("expected exactly one <task> element, found {count}")]
    MultipleTasks { count: usize },

    /// A required task field is absent.
    #[error("task is missing required field '{field}'")]
    MissingField { field: &'static str },

    /// A field was given several times as nested elements.
    #[error("task field '{field}' appears more than once")]
    AmbiguousField { field: &'static str },

    /// A field is present but its value cannot be parsed.
    #[error("task field '{field}' has invalid value '{value}'")]
    InvalidField { field: &'static str, value: String },

    /// Not XML, or XML we cannot read.
    #[error("malformed response body: {detail}")]
    Malformed { detail: String },
}

/// HTTP-layer failure. The underlying cause is kept as the error source.
#[derive(Debug, Error)]
pub enum TransportError {
    /// DNS, connect, TLS, timeout or body-read failure.
    #[error("request to '{url}' failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// Non-2xx status with no body we could make sense of.
    #[error("HTTP {status} from '{url}'")]
    Status { status: u16, url: String },

    /// The request target could not be turned into a URL.
    #[error("invalid request URL '{url}': {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },
}

/// Object-storage failure while archiving the source document.
#[derive(Debug, Error)]
pub enum ArchiveError {
    /// Reading the local file for upload failed.
    #[error("could not read '{path}' for archival: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The S3 request failed.
    #[error("S3 operation failed: {0}")]
    S3(#[from] s3::error::S3Error),

    /// The store answered with a non-2xx status.
    #[error("object store returned HTTP {status} for key '{key}'")]
    Status { status: u16, key: String },

    /// Bucket, region or credentials could not be set up.
    #[error("storage configuration error: {0}")]
    Config(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn service_decode_error_becomes_service_error() {
        let err: OcrError = DecodeError::Service {
            message: "Invalid application password".into(),
        }
        .into();
        match err {
            OcrError::Service { message } => assert_eq!(message, "Invalid application password"),
            other => panic!("expected Service, got {other:?}"),
        }
    }

    #[test]
    fn other_decode_errors_stay_decode_errors() {
        let err: OcrError = DecodeError::UnknownResponse.into();
        assert!(matches!(err, OcrError::Decode(DecodeError::UnknownResponse)));
    }

    #[test]
    fn processing_failed_display_with_and_without_message() {
        let id = TaskId::new("abc");
        let with = OcrError::ProcessingFailed {
            task_id: id.clone(),
            message: Some("image too small".into()),
        };
        assert!(with.to_string().contains("image too small"));

        let without = OcrError::ProcessingFailed {
            task_id: id,
            message: None,
        };
        assert!(without.to_string().contains("no message"));
    }

    #[test]
    fn timeout_display() {
        let e = OcrError::Timeout {
            task_id: TaskId::new("t-1"),
            elapsed: Duration::from_secs(90),
        };
        assert!(e.to_string().contains("90s"), "got: {e}");
    }

    #[test]
    fn input_errors_are_classified() {
        assert!(OcrError::FileNotFound { path: "x".into() }.is_input_error());
        assert!(OcrError::NotAFile { path: "x".into() }.is_input_error());
        assert!(!OcrError::Cancelled.is_input_error());
    }
}
