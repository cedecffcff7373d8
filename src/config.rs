//! Configuration types for submitting documents to the recognition service.
//!
//! Client-wide behaviour is controlled through [`ClientConfig`], built via its
//! [`ClientConfigBuilder`]. The service credentials live apart in
//! [`ServiceCredentials`] because they are secret and never change for the
//! life of a client, while the rest of the config is freely cloned, logged
//! and overridden per deployment.

use crate::error::OcrError;
use crate::progress::ProgressCallback;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

/// Production endpoint of the recognition service.
pub const DEFAULT_BASE_URL: &str = "https://cloud.ocrsdk.com";

/// The service rejects status polls spaced closer than this.
pub const MIN_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Identifying user agent sent with every request.
pub const DEFAULT_USER_AGENT: &str = concat!("cloud-ocr/", env!("CARGO_PKG_VERSION"));

/// Application id and password used for HTTP Basic authentication.
#[derive(Clone)]
pub struct ServiceCredentials {
    pub application_id: String,
    pub password: String,
}

impl ServiceCredentials {
    pub fn new(application_id: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            application_id: application_id.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for ServiceCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceCredentials")
            .field("application_id", &self.application_id)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Where source documents are archived before submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveConfig {
    /// Destination bucket.
    pub bucket: String,
    /// Key prefix prepended to the file name, e.g. `"incoming/"`.
    #[serde(default)]
    pub prefix: Option<String>,
    /// Region name. Falls back to `AWS_REGION`, then `us-east-1`.
    #[serde(default)]
    pub region: Option<String>,
    /// Custom endpoint for S3-compatible stores (MinIO, R2, ...).
    #[serde(default)]
    pub endpoint: Option<String>,
}

impl ArchiveConfig {
    pub fn new(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            prefix: None,
            region: None,
            endpoint: None,
        }
    }

    /// Object key for a source file name.
    pub fn key_for(&self, file_name: &str) -> String {
        match self.prefix.as_deref() {
            Some(prefix) if !prefix.is_empty() => {
                format!("{}/{}", prefix.trim_end_matches('/'), file_name)
            }
            _ => file_name.to_string(),
        }
    }
}

/// Client-wide configuration.
///
/// Built via [`ClientConfig::builder()`] or using [`ClientConfig::default()`].
///
/// # Example
/// ```rust
/// use cloud_ocr::ClientConfig;
/// use std::time::Duration;
///
/// let config = ClientConfig::builder()
///     .poll_interval(Duration::from_secs(3))
///     .url_param("language", "English")
///     .url_param("exportFormat", "txt")
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct ClientConfig {
    /// Service endpoint. Default: [`DEFAULT_BASE_URL`].
    pub base_url: String,

    /// Fixed delay before the first status poll and between polls. Default: 5 s.
    ///
    /// The builder never goes below [`MIN_POLL_INTERVAL`].
    pub poll_interval: Duration,

    /// Upper bound on time spent polling one task. `None` polls until a
    /// terminal status. Default: 10 minutes.
    pub max_wait: Option<Duration>,

    /// Per-HTTP-request timeout in seconds. Default: 120.
    pub request_timeout_secs: u64,

    /// User agent sent with each request. Default: [`DEFAULT_USER_AGENT`].
    pub user_agent: String,

    /// Query parameters added to every submission (language, export format, ...).
    pub url_params: BTreeMap<String, String>,

    /// Archive each source document before submitting it. Default: false.
    pub upload_to_archive: bool,

    /// Archive destination; required when `upload_to_archive` is set.
    pub archive: Option<ArchiveConfig>,

    /// Optional progress sink.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            poll_interval: Duration::from_secs(5),
            max_wait: Some(Duration::from_secs(600)),
            request_timeout_secs: 120,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            url_params: BTreeMap::new(),
            upload_to_archive: false,
            archive: None,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("base_url", &self.base_url)
            .field("poll_interval", &self.poll_interval)
            .field("max_wait", &self.max_wait)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("user_agent", &self.user_agent)
            .field("url_params", &self.url_params)
            .field("upload_to_archive", &self.upload_to_archive)
            .field("archive", &self.archive)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn ProcessProgressCallback>"),
            )
            .finish()
    }
}

impl ClientConfig {
    /// Create a new builder for `ClientConfig`.
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder {
            config: Self::default(),
        }
    }

    /// Check the invariants the builder enforces. Also used by
    /// [`crate::OcrClient::new`] for configs assembled by hand.
    pub fn validate(&self) -> Result<(), OcrError> {
        let base = url::Url::parse(&self.base_url).map_err(|e| {
            OcrError::InvalidConfig(format!("base URL '{}' is invalid: {}", self.base_url, e))
        })?;
        if !matches!(base.scheme(), "http" | "https") {
            return Err(OcrError::InvalidConfig(format!(
                "base URL must be http or https, got '{}'",
                self.base_url
            )));
        }
        if self.poll_interval.is_zero() {
            return Err(OcrError::InvalidConfig(
                "poll interval must be greater than zero".into(),
            ));
        }
        if self.url_params.keys().any(|k| k.trim().is_empty()) {
            return Err(OcrError::InvalidConfig(
                "URL parameter names must not be empty".into(),
            ));
        }
        if self.upload_to_archive {
            match &self.archive {
                Some(a) if !a.bucket.trim().is_empty() => {}
                _ => {
                    return Err(OcrError::InvalidConfig(
                        "upload_to_archive requires an archive bucket".into(),
                    ))
                }
            }
        }
        Ok(())
    }
}

/// Builder for [`ClientConfig`].
#[derive(Debug)]
pub struct ClientConfigBuilder {
    config: ClientConfig,
}

impl ClientConfigBuilder {
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.config.base_url = url.into();
        self
    }

    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.config.poll_interval = interval.max(MIN_POLL_INTERVAL);
        self
    }

    pub fn max_wait(mut self, limit: Option<Duration>) -> Self {
        self.config.max_wait = limit;
        self
    }

    pub fn request_timeout_secs(mut self, secs: u64) -> Self {
        self.config.request_timeout_secs = secs.max(1);
        self
    }

    pub fn user_agent(mut self, ua: impl Into<String>) -> Self {
        self.config.user_agent = ua.into();
        self
    }

    pub fn url_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.config.url_params.insert(key.into(), value.into());
        self
    }

    pub fn url_params<I, K, V>(mut self, params: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.config
            .url_params
            .extend(params.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    pub fn upload_to_archive(mut self, v: bool) -> Self {
        self.config.upload_to_archive = v;
        self
    }

    /// Set the archive destination. Does not by itself enable archival.
    pub fn archive(mut self, archive: ArchiveConfig) -> Self {
        self.config.archive = Some(archive);
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ClientConfig, OcrError> {
        self.config.validate()?;
        Ok(self.config)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// Which recognition endpoint a document is sent to.
///
/// Each variant maps to one `/process{Variant}` method of the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ProcessingVariant {
    /// Full-page text recognition (default).
    #[default]
    Image,
    BusinessCard,
    TextField,
    BarcodeField,
    CheckmarkField,
    Fields,
    /// Machine-readable zone of passports and ID cards.
    Mrz,
    Receipt,
}

impl ProcessingVariant {
    /// Service method name, e.g. `processImage`.
    pub fn method(&self) -> &'static str {
        match self {
            ProcessingVariant::Image => "processImage",
            ProcessingVariant::BusinessCard => "processBusinessCard",
            ProcessingVariant::TextField => "processTextField",
            ProcessingVariant::BarcodeField => "processBarcodeField",
            ProcessingVariant::CheckmarkField => "processCheckmarkField",
            ProcessingVariant::Fields => "processFields",
            ProcessingVariant::Mrz => "processMRZ",
            ProcessingVariant::Receipt => "processReceipt",
        }
    }
}

impl fmt::Display for ProcessingVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.method().trim_start_matches("process"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = ClientConfig::builder().build().expect("defaults should validate");
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.poll_interval, Duration::from_secs(5));
        assert!(!config.upload_to_archive);
        assert!(config.user_agent.starts_with("cloud-ocr/"));
    }

    #[test]
    fn poll_interval_is_clamped_to_service_minimum() {
        let config = ClientConfig::builder()
            .poll_interval(Duration::from_millis(100))
            .build()
            .unwrap();
        assert_eq!(config.poll_interval, MIN_POLL_INTERVAL);
    }

    #[test]
    fn archive_requires_bucket() {
        let err = ClientConfig::builder()
            .upload_to_archive(true)
            .build()
            .unwrap_err();
        assert!(matches!(err, OcrError::InvalidConfig(_)));

        let ok = ClientConfig::builder()
            .upload_to_archive(true)
            .archive(ArchiveConfig::new("scans"))
            .build();
        assert!(ok.is_ok());
    }

    #[test]
    fn rejects_non_http_base_url() {
        let err = ClientConfig::builder()
            .base_url("ftp://cloud.example.com")
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("http"), "got: {err}");
    }

    #[test]
    fn url_params_accumulate() {
        let config = ClientConfig::builder()
            .url_param("language", "English")
            .url_params([("exportFormat", "xml"), ("language", "German")])
            .build()
            .unwrap();
        assert_eq!(config.url_params.len(), 2);
        assert_eq!(config.url_params["language"], "German");
    }

    #[test]
    fn archive_key_with_and_without_prefix() {
        let mut archive = ArchiveConfig::new("scans");
        assert_eq!(archive.key_for("page.png"), "page.png");
        archive.prefix = Some("incoming/".into());
        assert_eq!(archive.key_for("page.png"), "incoming/page.png");
    }

    #[test]
    fn variant_method_names() {
        assert_eq!(ProcessingVariant::default().method(), "processImage");
        assert_eq!(ProcessingVariant::Mrz.method(), "processMRZ");
        assert_eq!(ProcessingVariant::Receipt.to_string(), "Receipt");
    }

    #[test]
    fn multi_image_document_is_not_a_variant() {
        assert!(serde_json::from_str::<ProcessingVariant>(r#""Document""#).is_err());
        assert_eq!(
            serde_json::from_str::<ProcessingVariant>(r#""BusinessCard""#).unwrap(),
            ProcessingVariant::BusinessCard
        );
    }

    #[test]
    fn credentials_debug_redacts_password() {
        let creds = ServiceCredentials::new("my-app", "s3cret");
        let dbg = format!("{creds:?}");
        assert!(dbg.contains("my-app"));
        assert!(!dbg.contains("s3cret"));
    }
}
