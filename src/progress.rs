//! Progress-callback trait for task lifecycle events.
//!
//! Inject an [`Arc<dyn ProcessProgressCallback>`] via
//! [`crate::config::ClientConfigBuilder::progress_callback`] to observe each
//! document as it moves through submission, polling and download.
//!
//! # Example
//!
//! ```rust
//! use cloud_ocr::{ClientConfig, ProcessProgressCallback, TaskRecord};
//! use std::path::Path;
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct PollCounter {
//!     polls: AtomicUsize,
//! }
//!
//! impl ProcessProgressCallback for PollCounter {
//!     fn on_poll(&self, _source: &Path, task: &TaskRecord, attempt: u32) {
//!         self.polls.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("{} poll #{attempt}: {}", task.id, task.status);
//!     }
//! }
//!
//! let config = ClientConfig::builder()
//!     .progress_callback(Arc::new(PollCounter { polls: AtomicUsize::new(0) }))
//!     .build()
//!     .unwrap();
//! ```

use crate::task::TaskRecord;
use std::path::Path;
use std::sync::Arc;

/// Called by the orchestrator at each state transition.
///
/// Several documents may be processed concurrently by one client, so
/// implementations must be `Send + Sync` and every event carries the source
/// path it belongs to. All methods default to no-ops.
pub trait ProcessProgressCallback: Send + Sync {
    /// The service accepted the document and assigned a task.
    fn on_submitted(&self, source: &Path, task: &TaskRecord) {
        let _ = (source, task);
    }

    /// A status poll returned. `attempt` starts at 1.
    fn on_poll(&self, source: &Path, task: &TaskRecord, attempt: u32) {
        let _ = (source, task, attempt);
    }

    /// The task completed and the artifact download is starting.
    fn on_download_start(&self, source: &Path, task: &TaskRecord) {
        let _ = (source, task);
    }

    /// The artifact was downloaded.
    fn on_complete(&self, source: &Path, task: &TaskRecord, artifact_len: usize) {
        let _ = (source, task, artifact_len);
    }

    /// Processing ended with an error.
    fn on_failed(&self, source: &Path, error: &str) {
        let _ = (source, error);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl ProcessProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ClientConfig`].
pub type ProgressCallback = Arc<dyn ProcessProgressCallback>;
