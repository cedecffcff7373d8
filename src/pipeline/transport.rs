//! HTTP transport: authenticated requests against the recognition service.
//!
//! The transport knows nothing about tasks or XML. It turns a
//! [`TransportRequest`] into bytes and a status code, and it never retries.
//! Retry and polling policy belong to the orchestrator.
//!
//! The `Authorization` header is computed once from the credentials and only
//! attached to requests on the service origin. Result URLs usually point at
//! pre-signed blob storage, which rejects foreign credentials.

use crate::config::{ClientConfig, ServiceCredentials};
use crate::error::{OcrError, TransportError};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use bytes::Bytes;
use reqwest::header::{HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

/// HTTP verb used for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

/// One request to issue.
#[derive(Debug, Clone)]
pub struct TransportRequest {
    pub method: Method,
    /// Path relative to the base URL (`/getTaskStatus?taskId=..`) or an absolute URL.
    pub target: String,
    pub body: Option<Bytes>,
}

impl TransportRequest {
    pub fn get(target: impl Into<String>) -> Self {
        Self {
            method: Method::Get,
            target: target.into(),
            body: None,
        }
    }

    pub fn post(target: impl Into<String>, body: Bytes) -> Self {
        Self {
            method: Method::Post,
            target: target.into(),
            body: Some(body),
        }
    }
}

/// Raw answer. Non-2xx answers with a body are returned here so the caller
/// can look for a service error inside.
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: u16,
    pub url: String,
    pub body: Bytes,
}

impl RawResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Issues requests for the orchestrator. Injected into [`crate::OcrClient`].
#[async_trait]
pub trait Transport: Send + Sync {
    async fn request(&self, request: TransportRequest) -> Result<RawResponse, TransportError>;
}

/// Check if the target string is already an absolute URL.
pub fn is_url(target: &str) -> bool {
    target.starts_with("http://") || target.starts_with("https://")
}

/// reqwest-backed transport.
#[derive(Clone)]
pub struct HttpTransport {
    http: reqwest::Client,
    base_url: Url,
    auth_header: HeaderValue,
}

impl HttpTransport {
    pub fn new(credentials: &ServiceCredentials, config: &ClientConfig) -> Result<Self, OcrError> {
        let http = reqwest::Client::builder()
            .user_agent(config.user_agent.as_str())
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| OcrError::Internal(format!("Failed to build HTTP client: {e}")))?;

        let base_url = Url::parse(&config.base_url).map_err(|e| {
            OcrError::InvalidConfig(format!("base URL '{}' is invalid: {}", config.base_url, e))
        })?;

        Ok(Self {
            http,
            base_url,
            auth_header: basic_auth_header(credentials)?,
        })
    }

    /// Resolve a request target against the base URL.
    fn resolve(&self, target: &str) -> Result<Url, TransportError> {
        let raw = if is_url(target) {
            target.to_string()
        } else {
            format!(
                "{}/{}",
                self.base_url.as_str().trim_end_matches('/'),
                target.trim_start_matches('/')
            )
        };
        Url::parse(&raw).map_err(|source| TransportError::InvalidUrl { url: raw, source })
    }

    fn is_service_origin(&self, url: &Url) -> bool {
        url.origin() == self.base_url.origin()
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn request(&self, request: TransportRequest) -> Result<RawResponse, TransportError> {
        let url = self.resolve(&request.target)?;
        let url_str = url.to_string();
        let authenticated = self.is_service_origin(&url);

        let mut builder = match request.method {
            Method::Get => self.http.get(url),
            Method::Post => self
                .http
                .post(url)
                .header(CONTENT_TYPE, "application/octet-stream"),
        };
        if authenticated {
            builder = builder.header(AUTHORIZATION, self.auth_header.clone());
        }
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        debug!(method = ?request.method, url = %url_str, authenticated, "Sending request");

        let response = builder.send().await.map_err(|source| TransportError::Request {
            url: url_str.clone(),
            source,
        })?;
        let status = response.status().as_u16();
        let body = response
            .bytes()
            .await
            .map_err(|source| TransportError::Request {
                url: url_str.clone(),
                source,
            })?;

        if !(200..300).contains(&status) {
            warn!(status, url = %url_str, body_len = body.len(), "Non-success response");
            if body.is_empty() {
                return Err(TransportError::Status {
                    status,
                    url: url_str,
                });
            }
        }

        Ok(RawResponse {
            status,
            url: url_str,
            body,
        })
    }
}

/// `Basic base64(id:password)`, marked sensitive so it never shows up in logs.
fn basic_auth_header(credentials: &ServiceCredentials) -> Result<HeaderValue, OcrError> {
    let token = STANDARD.encode(format!(
        "{}:{}",
        credentials.application_id, credentials.password
    ));
    let mut value = HeaderValue::from_str(&format!("Basic {token}"))
        .map_err(|e| OcrError::InvalidConfig(format!("credentials cannot form a header: {e}")))?;
    value.set_sensitive(true);
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transport(base: &str) -> HttpTransport {
        let mut config = ClientConfig::default();
        config.base_url = base.to_string();
        HttpTransport::new(&ServiceCredentials::new("app", "pw"), &config).unwrap()
    }

    #[test]
    fn test_is_url() {
        assert!(is_url("https://blob.example.net/result.txt"));
        assert!(is_url("http://localhost:8080/x"));
        assert!(!is_url("/processImage"));
        assert!(!is_url("getTaskStatus?taskId=1"));
        assert!(!is_url(""));
    }

    #[test]
    fn relative_targets_join_base_url() {
        let t = transport("https://cloud.example.com/");
        let url = t.resolve("/getTaskStatus?taskId=abc").unwrap();
        assert_eq!(url.as_str(), "https://cloud.example.com/getTaskStatus?taskId=abc");
    }

    #[test]
    fn base_path_prefix_is_kept() {
        let t = transport("https://gateway.example.com/ocr/v1");
        let url = t.resolve("/processImage?language=English").unwrap();
        assert_eq!(
            url.as_str(),
            "https://gateway.example.com/ocr/v1/processImage?language=English"
        );
    }

    #[test]
    fn absolute_targets_are_used_verbatim() {
        let t = transport("https://cloud.example.com");
        let url = t.resolve("https://blob.example.net/r/1.txt?sig=x").unwrap();
        assert_eq!(url.as_str(), "https://blob.example.net/r/1.txt?sig=x");
        assert!(!t.is_service_origin(&url));
        assert!(t.is_service_origin(&t.resolve("/processImage").unwrap()));
    }

    #[test]
    fn basic_auth_header_encodes_credentials() {
        let header = basic_auth_header(&ServiceCredentials::new("app", "pw")).unwrap();
        // base64("app:pw")
        assert_eq!(header.to_str().unwrap(), "Basic YXBwOnB3");
        assert!(header.is_sensitive());
    }

    #[test]
    fn raw_response_success_range() {
        let ok = RawResponse {
            status: 204,
            url: String::new(),
            body: Bytes::new(),
        };
        assert!(ok.is_success());
        let bad = RawResponse { status: 401, ..ok };
        assert!(!bad.is_success());
    }
}
