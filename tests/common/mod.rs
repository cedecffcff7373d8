//! Shared fixtures for the integration tests: a scripted transport, in-memory
//! archivers and canned service responses.

#![allow(dead_code)]

use async_trait::async_trait;
use bytes::Bytes;
use cloud_ocr::{
    ArchiveError, Archiver, ClientConfig, Method, OcrClient, RawResponse, Transport,
    TransportError, TransportRequest, XmlDecoder,
};
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use tokio::time::Instant;

pub const TASK_ID: &str = "3f9a1c2e-77b0-4c1d-9a7e-2b8d6c5e4f10";
pub const SENTINEL_ID: &str = "00000000-0000-0000-0000-000000000000";
pub const RESULT_URL: &str = "https://blob.example.net/results/3f9a?sig=abc";
pub const POLL_INTERVAL: Duration = Duration::from_secs(5);

// ── Canned responses ─────────────────────────────────────────────────────────

pub fn task_xml(id: &str, status: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="utf-8"?>
<response>
  <task id="{id}" registrationTime="2026-10-16T12:00:00Z" statusChangeTime="2026-10-16T12:00:01Z"
        status="{status}" filesCount="1" credits="0" estimatedProcessingTime="5"/>
</response>"#
    )
}

pub fn completed_xml(id: &str) -> String {
    format!(
        r#"<response><task id="{id}" status="Completed" filesCount="1" credits="1"
            resultUrl="{}"/></response>"#,
        RESULT_URL.replace('&', "&amp;")
    )
}

pub fn failed_xml(id: &str, message: &str) -> String {
    format!(r#"<response><task id="{id}" status="ProcessingFailed" error="{message}"/></response>"#)
}

pub fn error_xml(message: &str) -> String {
    format!("<response><error><message language=\"english\">{message}</message></error></response>")
}

// ── Scripted transport ───────────────────────────────────────────────────────

/// One scripted answer.
#[derive(Debug, Clone)]
pub enum Reply {
    Ok(u16, Bytes),
    /// Connection-level failure.
    Fail,
}

impl Reply {
    pub fn xml(body: impl Into<String>) -> Self {
        Reply::Ok(200, Bytes::from(body.into()))
    }

    pub fn status(status: u16, body: impl Into<String>) -> Self {
        Reply::Ok(status, Bytes::from(body.into()))
    }
}

/// A request the transport saw, with the (paused-clock) time it arrived.
#[derive(Debug, Clone)]
pub struct Call {
    pub method: Method,
    pub target: String,
    pub at: Instant,
}

/// Answers submissions, status polls and downloads from three scripts.
///
/// The last status reply is repeated once the script runs out, which lets a
/// test model a task that never finishes.
#[derive(Default)]
pub struct ScriptedTransport {
    submit: Mutex<VecDeque<Reply>>,
    status: Mutex<VecDeque<Reply>>,
    download: Mutex<VecDeque<Reply>>,
    calls: Mutex<Vec<Call>>,
}

impl ScriptedTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn on_submit(self: &Arc<Self>, reply: Reply) -> Arc<Self> {
        self.submit.lock().unwrap().push_back(reply);
        Arc::clone(self)
    }

    pub fn on_status(self: &Arc<Self>, reply: Reply) -> Arc<Self> {
        self.status.lock().unwrap().push_back(reply);
        Arc::clone(self)
    }

    pub fn on_download(self: &Arc<Self>, reply: Reply) -> Arc<Self> {
        self.download.lock().unwrap().push_back(reply);
        Arc::clone(self)
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn submits(&self) -> Vec<Call> {
        self.filtered(|c| c.method == Method::Post)
    }

    pub fn polls(&self) -> Vec<Call> {
        self.filtered(|c| c.method == Method::Get && c.target.starts_with("/getTaskStatus"))
    }

    pub fn downloads(&self) -> Vec<Call> {
        self.filtered(|c| c.method == Method::Get && !c.target.starts_with("/getTaskStatus"))
    }

    fn filtered(&self, keep: impl Fn(&Call) -> bool) -> Vec<Call> {
        self.calls().into_iter().filter(|c| keep(c)).collect()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn request(&self, request: TransportRequest) -> Result<RawResponse, TransportError> {
        self.calls.lock().unwrap().push(Call {
            method: request.method,
            target: request.target.clone(),
            at: Instant::now(),
        });

        let reply = match request.method {
            Method::Post => self.submit.lock().unwrap().pop_front(),
            Method::Get if request.target.starts_with("/getTaskStatus") => {
                let mut script = self.status.lock().unwrap();
                if script.len() > 1 {
                    script.pop_front()
                } else {
                    script.front().cloned()
                }
            }
            Method::Get => self.download.lock().unwrap().pop_front(),
        };

        match reply {
            Some(Reply::Ok(status, body)) => Ok(RawResponse {
                status,
                url: request.target,
                body,
            }),
            Some(Reply::Fail) | None => Err(TransportError::Status {
                status: 503,
                url: request.target,
            }),
        }
    }
}

// ── Archivers ────────────────────────────────────────────────────────────────

/// Remembers every key it was asked to store.
#[derive(Default)]
pub struct RecordingArchiver {
    pub stored: Mutex<Vec<(PathBuf, String)>>,
}

#[async_trait]
impl Archiver for RecordingArchiver {
    async fn store(&self, local_path: &Path, destination_key: &str) -> Result<(), ArchiveError> {
        self.stored
            .lock()
            .unwrap()
            .push((local_path.to_path_buf(), destination_key.to_string()));
        Ok(())
    }
}

/// Always refuses the upload.
pub struct FailingArchiver;

#[async_trait]
impl Archiver for FailingArchiver {
    async fn store(&self, _local_path: &Path, destination_key: &str) -> Result<(), ArchiveError> {
        Err(ArchiveError::Status {
            status: 403,
            key: destination_key.to_string(),
        })
    }
}

// ── Builders ─────────────────────────────────────────────────────────────────

pub fn config() -> ClientConfig {
    ClientConfig::builder()
        .poll_interval(POLL_INTERVAL)
        .max_wait(None)
        .url_param("language", "English")
        .build()
        .unwrap()
}

pub fn client(transport: Arc<ScriptedTransport>) -> OcrClient {
    client_with(config(), transport, None)
}

pub fn client_with(
    config: ClientConfig,
    transport: Arc<ScriptedTransport>,
    archiver: Option<Arc<dyn Archiver>>,
) -> OcrClient {
    OcrClient::from_parts(config, transport, Arc::new(XmlDecoder), archiver)
}

/// A small source document in a fresh temporary directory.
pub fn source_file(name: &str) -> (TempDir, PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join(name);
    std::fs::write(&path, b"\x89PNG\r\n\x1a\nfake image bytes").unwrap();
    (dir, path)
}
