//! # cloud-ocr
//!
//! Client for a cloud OCR service that works through asynchronous tasks:
//! submit a document, poll the task until it settles, download the result.
//!
//! ## Why this crate?
//!
//! The service never answers a submission with the recognised text. It hands
//! back a task record and expects the caller to poll, honour a minimum
//! interval, recognise terminal failures (bad input, no credits, deleted
//! task) and fetch the artifact from a separate URL. Getting that loop right
//! every time is tedious. This crate does it once, with typed errors for
//! every way it can end, cancellation at every wait, and no blocking sleeps.
//!
//! ## Pipeline Overview
//!
//! ```text
//! local file
//!  │
//!  ├─ 1. Input     validate the path, read the bytes
//!  ├─ 2. Archive   optional best-effort upload of the source to S3
//!  ├─ 3. Submit    POST /process{Variant}?params  → task record
//!  ├─ 4. Poll      GET /getTaskStatus?taskId=…    every poll_interval
//!  ├─ 5. Download  GET resultUrl (no service credentials)
//!  └─ 6. Output    artifact bytes + final task record + stats
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use cloud_ocr::{ClientConfig, OcrClient, ProcessRequest};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ClientConfig::builder()
//!         .url_param("language", "English")
//!         .url_param("exportFormat", "txt")
//!         .build()?;
//!     let client = OcrClient::new("my-app", "my-password", config)?;
//!
//!     let result = client.process(ProcessRequest::new("scan.png")).await?;
//!     println!("{}", result.artifact_text().unwrap_or_default());
//!     eprintln!("{} polls, {}ms", result.stats.polls, result.stats.total_duration_ms);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `cloud-ocr` binary (clap + anyhow + indicatif + tracing-subscriber) |
//!
//! Disable `cli` when using only the library to avoid pulling in CLI-only deps:
//! ```toml
//! cloud-ocr = { version = "0.5", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod client;
pub mod config;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod process;
pub mod progress;
pub mod task;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use client::OcrClient;
pub use config::{
    ArchiveConfig, ClientConfig, ClientConfigBuilder, ProcessingVariant, ServiceCredentials,
};
pub use error::{ArchiveError, DecodeError, OcrError, TransportError};
pub use output::{ArchiveOutcome, ProcessStats, TaskResult};
pub use pipeline::archive::{Archiver, S3Archiver};
pub use pipeline::decode::{ResponseDecoder, XmlDecoder};
pub use pipeline::transport::{HttpTransport, Method, RawResponse, Transport, TransportRequest};
pub use process::ProcessRequest;
pub use progress::{NoopProgressCallback, ProcessProgressCallback, ProgressCallback};
pub use task::{next_action, FailureKind, NextAction, TaskId, TaskRecord, TaskStatus};
pub use tokio_util::sync::CancellationToken;
