//! The submit → poll → download state machine.
//!
//! ```text
//! Submitting ──▶ Polling ──▶ Downloading ──▶ Done
//!      │            │              │
//!      └────────────┴──────────────┴──▶ Failed
//! ```
//!
//! Every suspension point (submission, each interval wait, each poll, the
//! download) is raced against the caller's [`CancellationToken`], so a
//! cancelled call returns [`OcrError::Cancelled`] without issuing another
//! request. Waits use the tokio timer and never block a worker thread.

use crate::client::OcrClient;
use crate::config::ProcessingVariant;
use crate::error::{DecodeError, OcrError};
use crate::output::{ArchiveOutcome, ProcessStats, TaskResult};
use crate::pipeline::input::{self, SourceDocument};
use crate::progress::ProcessProgressCallback;
use crate::task::{next_action, FailureKind, NextAction, TaskId, TaskRecord};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::time::{sleep, sleep_until, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// One document to recognise.
#[derive(Debug, Clone)]
pub struct ProcessRequest {
    pub path: PathBuf,
    pub variant: ProcessingVariant,
    /// Extra query parameters; override client-wide `url_params` with the same key.
    pub params: BTreeMap<String, String>,
}

impl ProcessRequest {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            variant: ProcessingVariant::default(),
            params: BTreeMap::new(),
        }
    }

    pub fn variant(mut self, variant: ProcessingVariant) -> Self {
        self.variant = variant;
        self
    }

    pub fn param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }
}

impl OcrClient {
    /// Recognise one document and return its artifact.
    ///
    /// # Errors
    /// Input errors are returned before any network call. After submission
    /// every failure is fatal to the call: transport and decode errors during
    /// polling are not retried, since the task may already have moved on
    /// remotely. Archival failure is not an error; see
    /// [`TaskResult::archive`].
    pub async fn process(&self, request: ProcessRequest) -> Result<TaskResult, OcrError> {
        self.process_cancellable(request, &CancellationToken::new())
            .await
    }

    /// [`OcrClient::process`] that stops as soon as `cancel` fires.
    pub async fn process_cancellable(
        &self,
        request: ProcessRequest,
        cancel: &CancellationToken,
    ) -> Result<TaskResult, OcrError> {
        let source_path = request.path.clone();
        let result = self.run(request, cancel).await;
        if let Err(ref e) = result {
            warn!("Processing {} failed: {}", source_path.display(), e);
            self.notify(|cb| cb.on_failed(&source_path, &e.to_string()));
        }
        result
    }

    /// Process a document and write the artifact to `output_path`.
    ///
    /// Uses atomic write (temp file + rename) to prevent partial files.
    pub async fn process_to_file(
        &self,
        request: ProcessRequest,
        output_path: impl AsRef<Path>,
    ) -> Result<TaskResult, OcrError> {
        self.process_to_file_cancellable(request, output_path, &CancellationToken::new())
            .await
    }

    /// [`OcrClient::process_to_file`] that stops as soon as `cancel` fires.
    /// Nothing is written for a cancelled call.
    pub async fn process_to_file_cancellable(
        &self,
        request: ProcessRequest,
        output_path: impl AsRef<Path>,
        cancel: &CancellationToken,
    ) -> Result<TaskResult, OcrError> {
        let result = self.process_cancellable(request, cancel).await?;
        let path = output_path.as_ref();
        let write_err = |source| OcrError::OutputWriteFailed {
            path: path.to_path_buf(),
            source,
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(write_err)?;
        }

        let mut tmp_name = path.as_os_str().to_owned();
        tmp_name.push(".part");
        let tmp_path = PathBuf::from(tmp_name);

        let written = match tokio::fs::write(&tmp_path, &result.artifact).await {
            Ok(()) => tokio::fs::rename(&tmp_path, path).await,
            Err(e) => Err(e),
        };
        if let Err(e) = written {
            match tokio::fs::remove_file(&tmp_path).await {
                Err(cleanup) if cleanup.kind() != std::io::ErrorKind::NotFound => {
                    warn!("Could not remove {}: {}", tmp_path.display(), cleanup);
                }
                _ => {}
            }
            return Err(write_err(e));
        }

        Ok(result)
    }

    /// Synchronous wrapper around [`OcrClient::process`].
    ///
    /// Creates a temporary tokio runtime internally; do not call from async code.
    pub fn process_sync(&self, request: ProcessRequest) -> Result<TaskResult, OcrError> {
        tokio::runtime::Runtime::new()
            .map_err(|e| OcrError::Internal(format!("Failed to create tokio runtime: {}", e)))?
            .block_on(self.process(request))
    }

    async fn run(
        &self,
        request: ProcessRequest,
        cancel: &CancellationToken,
    ) -> Result<TaskResult, OcrError> {
        let total_start = Instant::now();
        info!("Processing {} via {}", request.path.display(), request.variant.method());

        // ── Submitting ───────────────────────────────────────────────────
        let source = input::load_source(&request.path).await?;
        if cancel.is_cancelled() {
            return Err(OcrError::Cancelled);
        }

        let params = self.effective_params(&request.params);
        let submit_start = Instant::now();
        let (archive, submitted) = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(OcrError::Cancelled),
            pair = futures::future::join(
                self.archive(&source),
                self.submit(source.bytes.clone(), request.variant, &params),
            ) => pair,
        };
        let task = submitted?;
        let submit_duration_ms = submit_start.elapsed().as_millis() as u64;

        if task.id.is_sentinel() {
            warn!("Service returned the all-zero task id; not polling");
            return Err(OcrError::InvalidTaskId { task_id: task.id });
        }
        info!(task_id = %task.id, status = %task.status, "Task submitted");
        self.notify(|cb| cb.on_submitted(&source.path, &task));

        // ── Polling ──────────────────────────────────────────────────────
        let wait_start = Instant::now();
        let (task, polls) = self.poll_until_terminal(&source.path, task, cancel).await?;
        let wait_duration_ms = wait_start.elapsed().as_millis() as u64;

        // ── Downloading ──────────────────────────────────────────────────
        self.notify(|cb| cb.on_download_start(&source.path, &task));
        let download_start = Instant::now();
        let artifact = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(OcrError::Cancelled),
            r = self.download(&task) => r?,
        };
        let download_duration_ms = download_start.elapsed().as_millis() as u64;
        self.notify(|cb| cb.on_complete(&source.path, &task, artifact.len()));

        let stats = ProcessStats {
            polls,
            artifact_bytes: artifact.len(),
            submit_duration_ms,
            wait_duration_ms,
            download_duration_ms,
            total_duration_ms: total_start.elapsed().as_millis() as u64,
        };
        info!(
            task_id = %task.id,
            polls,
            bytes = artifact.len(),
            "Task complete in {}ms",
            stats.total_duration_ms
        );

        Ok(TaskResult {
            source: source.path,
            task,
            artifact,
            archive,
            stats,
        })
    }

    /// Poll until `next_action` says Download, or fail on a terminal status.
    async fn poll_until_terminal(
        &self,
        source: &Path,
        mut task: TaskRecord,
        cancel: &CancellationToken,
    ) -> Result<(TaskRecord, u32), OcrError> {
        let started = Instant::now();
        let deadline = self.config.max_wait.map(|limit| started + limit);
        let mut polls = 0u32;

        loop {
            match next_action(&task.status) {
                NextAction::Download => return Ok((task, polls)),
                NextAction::Fail(kind) => return Err(failure_error(kind, task)),
                NextAction::Poll => {}
            }

            self.wait_interval(cancel, deadline, started, &task.id).await?;

            polls += 1;
            let polled = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(OcrError::Cancelled),
                r = self.task_status(&task.id) => r?,
            };
            // The id is fixed at submission; a status for another task is never ours.
            if polled.id != task.id {
                warn!(expected = %task.id, found = %polled.id, "Status response names another task");
                return Err(OcrError::Decode(DecodeError::InvalidField {
                    field: "id",
                    value: polled.id.to_string(),
                }));
            }
            task = polled;
            debug!(task_id = %task.id, status = %task.status, attempt = polls, "Polled task");
            self.notify(|cb| cb.on_poll(source, &task, polls));
        }
    }

    /// Sleep one poll interval, unless cancelled or the deadline comes first.
    async fn wait_interval(
        &self,
        cancel: &CancellationToken,
        deadline: Option<Instant>,
        started: Instant,
        task_id: &TaskId,
    ) -> Result<(), OcrError> {
        let next_poll = Instant::now() + self.config.poll_interval;
        match deadline {
            Some(deadline) if next_poll > deadline => {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => Err(OcrError::Cancelled),
                    _ = sleep_until(deadline) => Err(OcrError::Timeout {
                        task_id: task_id.clone(),
                        elapsed: started.elapsed(),
                    }),
                }
            }
            _ => {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => Err(OcrError::Cancelled),
                    _ = sleep(self.config.poll_interval) => Ok(()),
                }
            }
        }
    }

    /// Best-effort archival. Never fails the caller.
    async fn archive(&self, source: &SourceDocument) -> ArchiveOutcome {
        let Some(archiver) = &self.archiver else {
            return ArchiveOutcome::Skipped;
        };
        let key = match &self.config.archive {
            Some(archive) => archive.key_for(&source.file_name),
            None => source.file_name.clone(),
        };

        match archiver.store(&source.path, &key).await {
            Ok(()) => {
                info!(key = %key, "Source archived");
                ArchiveOutcome::Stored { key }
            }
            Err(e) => {
                warn!(key = %key, error = %e, "Archival failed; continuing with recognition");
                ArchiveOutcome::Failed {
                    key,
                    error: e.to_string(),
                }
            }
        }
    }

    fn effective_params(&self, overrides: &BTreeMap<String, String>) -> BTreeMap<String, String> {
        let mut params = self.config.url_params.clone();
        params.extend(overrides.iter().map(|(k, v)| (k.clone(), v.clone())));
        params
    }

    fn notify(&self, event: impl FnOnce(&dyn ProcessProgressCallback)) {
        if let Some(cb) = &self.config.progress_callback {
            event(cb.as_ref());
        }
    }
}

fn failure_error(kind: FailureKind, task: TaskRecord) -> OcrError {
    let task_id = task.id;
    match kind {
        FailureKind::ProcessingFailed => OcrError::ProcessingFailed {
            task_id,
            message: task.error_message,
        },
        FailureKind::NotEnoughCredits => OcrError::NotEnoughCredits { task_id },
        FailureKind::Deleted => OcrError::TaskDeleted { task_id },
        FailureKind::UnrecognizedStatus(status) => {
            OcrError::UnrecognizedStatus { task_id, status }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::TaskStatus;

    #[test]
    fn request_builder_sets_fields() {
        let req = ProcessRequest::new("card.png")
            .variant(ProcessingVariant::BusinessCard)
            .param("exportFormat", "vCard");
        assert_eq!(req.path, PathBuf::from("card.png"));
        assert_eq!(req.variant, ProcessingVariant::BusinessCard);
        assert_eq!(req.params["exportFormat"], "vCard");
    }

    #[test]
    fn failure_errors_carry_service_details() {
        let mut task = TaskRecord::new(TaskId::new("t9"), TaskStatus::ProcessingFailed);
        task.error_message = Some("Unsupported image format".into());
        match failure_error(FailureKind::ProcessingFailed, task) {
            OcrError::ProcessingFailed { task_id, message } => {
                assert_eq!(task_id.as_str(), "t9");
                assert_eq!(message.as_deref(), Some("Unsupported image format"));
            }
            other => panic!("unexpected {other:?}"),
        }

        let task = TaskRecord::new(TaskId::new("t9"), TaskStatus::NotEnoughCredits);
        assert!(matches!(
            failure_error(FailureKind::NotEnoughCredits, task),
            OcrError::NotEnoughCredits { .. }
        ));
    }
}
