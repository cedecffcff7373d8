//! The client object and its single-request operations.
//!
//! [`OcrClient`] owns its collaborators explicitly: a [`Transport`], a
//! [`ResponseDecoder`] and an optional [`Archiver`], all behind `Arc` so the
//! client is cheap to clone and safe to share between concurrent
//! [`OcrClient::process`](crate::OcrClient::process) calls. Nothing here is
//! process-global.

use crate::config::{ClientConfig, ProcessingVariant, ServiceCredentials};
use crate::error::{DecodeError, OcrError, TransportError};
use crate::pipeline::archive::{Archiver, S3Archiver};
use crate::pipeline::decode::{ResponseDecoder, XmlDecoder};
use crate::pipeline::transport::{HttpTransport, RawResponse, Transport, TransportRequest};
use crate::task::{TaskId, TaskRecord};
use bytes::Bytes;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};
use url::form_urlencoded;

/// Handle to the recognition service.
///
/// # Example
/// ```rust,no_run
/// use cloud_ocr::{ClientConfig, OcrClient, ProcessRequest, ProcessingVariant};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let config = ClientConfig::builder()
///     .url_param("language", "English")
///     .url_param("exportFormat", "txt")
///     .build()?;
/// let client = OcrClient::new("my-app", "my-password", config)?;
///
/// let result = client
///     .process(ProcessRequest::new("receipt.jpg").variant(ProcessingVariant::Receipt))
///     .await?;
/// println!("{}", result.artifact_text().unwrap_or_default());
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct OcrClient {
    pub(crate) config: Arc<ClientConfig>,
    pub(crate) transport: Arc<dyn Transport>,
    pub(crate) decoder: Arc<dyn ResponseDecoder>,
    pub(crate) archiver: Option<Arc<dyn Archiver>>,
}

impl fmt::Debug for OcrClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OcrClient")
            .field("config", &self.config)
            .field("archiver", &self.archiver.as_ref().map(|_| "<dyn Archiver>"))
            .finish()
    }
}

impl OcrClient {
    /// Build a client with the HTTP transport, the XML decoder and, when
    /// `upload_to_archive` is set, the S3 archiver.
    pub fn new(
        application_id: impl Into<String>,
        application_password: impl Into<String>,
        config: ClientConfig,
    ) -> Result<Self, OcrError> {
        config.validate()?;
        let credentials = ServiceCredentials::new(application_id, application_password);
        let transport = HttpTransport::new(&credentials, &config)?;

        let archiver: Option<Arc<dyn Archiver>> = match (&config.archive, config.upload_to_archive)
        {
            (Some(archive), true) => Some(Arc::new(
                S3Archiver::from_config(archive).map_err(OcrError::Archive)?,
            )),
            _ => None,
        };

        info!(base_url = %config.base_url, archive = archiver.is_some(), "Client ready");
        Ok(Self::from_parts(
            config,
            Arc::new(transport),
            Arc::new(XmlDecoder),
            archiver,
        ))
    }

    /// Assemble a client from explicit collaborators.
    ///
    /// An archiver passed here is used whether or not `upload_to_archive` is set.
    pub fn from_parts(
        config: ClientConfig,
        transport: Arc<dyn Transport>,
        decoder: Arc<dyn ResponseDecoder>,
        archiver: Option<Arc<dyn Archiver>>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            transport,
            decoder,
            archiver,
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// POST document bytes to `/process{Variant}` and decode the new task.
    pub async fn submit(
        &self,
        document: Bytes,
        variant: ProcessingVariant,
        params: &BTreeMap<String, String>,
    ) -> Result<TaskRecord, OcrError> {
        let path = submission_path(variant, params);
        debug!(path = %path, bytes = document.len(), "Submitting document");
        let response = self
            .transport
            .request(TransportRequest::post(path, document))
            .await?;
        self.interpret(response)
    }

    /// One `getTaskStatus` call. Refuses the all-zero identifier.
    pub async fn task_status(&self, task_id: &TaskId) -> Result<TaskRecord, OcrError> {
        if task_id.is_sentinel() {
            return Err(OcrError::InvalidTaskId {
                task_id: task_id.clone(),
            });
        }
        let response = self
            .transport
            .request(TransportRequest::get(status_path(task_id)))
            .await?;
        self.interpret(response)
    }

    /// Fetch the artifact of a completed task.
    pub async fn download(&self, task: &TaskRecord) -> Result<Bytes, OcrError> {
        let url = task
            .result_url
            .clone()
            .ok_or(OcrError::Decode(DecodeError::MissingField { field: "resultUrl" }))?;

        let response = self
            .transport
            .request(TransportRequest::get(url.clone()))
            .await
            .map_err(|source| OcrError::Download {
                task_id: task.id.clone(),
                url: url.clone(),
                source,
            })?;

        if !response.is_success() {
            return Err(OcrError::Download {
                task_id: task.id.clone(),
                url,
                source: TransportError::Status {
                    status: response.status,
                    url: response.url,
                },
            });
        }
        Ok(response.body)
    }

    /// Decode a service answer. A non-2xx answer only passes through when it
    /// carries a service error; anything else is a transport failure.
    fn interpret(&self, response: RawResponse) -> Result<TaskRecord, OcrError> {
        match self.decoder.decode(&response.body) {
            Ok(task) if response.is_success() => Ok(task),
            Err(DecodeError::Service { message }) => Err(OcrError::Service { message }),
            Err(err) if response.is_success() => Err(err.into()),
            _ => Err(TransportError::Status {
                status: response.status,
                url: response.url,
            }
            .into()),
        }
    }
}

/// `/process{Variant}` plus the URL-encoded parameters, ordered by key.
pub fn submission_path(variant: ProcessingVariant, params: &BTreeMap<String, String>) -> String {
    let mut path = format!("/{}", variant.method());
    if !params.is_empty() {
        let query = form_urlencoded::Serializer::new(String::new())
            .extend_pairs(params.iter())
            .finish();
        path.push('?');
        path.push_str(&query);
    }
    path
}

/// `/getTaskStatus?taskId=<id>`.
pub fn status_path(task_id: &TaskId) -> String {
    let query = form_urlencoded::Serializer::new(String::new())
        .append_pair("taskId", task_id.as_str())
        .finish();
    format!("/getTaskStatus?{query}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn submission_path_without_params() {
        assert_eq!(
            submission_path(ProcessingVariant::Image, &BTreeMap::new()),
            "/processImage"
        );
    }

    #[test]
    fn submission_path_encodes_params() {
        let mut params = BTreeMap::new();
        params.insert("language".to_string(), "English,German".to_string());
        params.insert("exportFormat".to_string(), "txt".to_string());
        params.insert("description".to_string(), "march invoices".to_string());
        assert_eq!(
            submission_path(ProcessingVariant::Receipt, &params),
            "/processReceipt?description=march+invoices&exportFormat=txt&language=English%2CGerman"
        );
    }

    #[test]
    fn status_path_encodes_id() {
        assert_eq!(
            status_path(&TaskId::new("a1b2-c3")),
            "/getTaskStatus?taskId=a1b2-c3"
        );
        assert_eq!(
            status_path(&TaskId::new("a b&c")),
            "/getTaskStatus?taskId=a+b%26c"
        );
    }
}
