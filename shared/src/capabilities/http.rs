use std::fmt;
use std::time::Duration;

use bytes::{BufMut, Bytes, BytesMut};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use crate::{AppError, ErrorKind};

pub const MAX_URL_LENGTH: usize = 2048;
pub const MAX_REQUEST_BODY_SIZE: usize = 64 * 1024 * 1024;
pub const MAX_TIMEOUT: Duration = Duration::from_secs(300);
pub const MAX_HEADER_NAME_LENGTH: usize = 256;
pub const MAX_HEADER_VALUE_LENGTH: usize = 8192;
pub const MAX_HEADERS_COUNT: usize = 100;

#[derive(Clone, PartialEq, Eq, Default)]
pub struct HttpHeaders {
    headers: Vec<(String, String)>,
}

impl HttpHeaders {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces any existing header of the same name, case-insensitively.
    pub fn insert(
        &mut self,
        name: impl Into<String>,
        value: impl Into<String>,
    ) -> Result<(), HttpError> {
        let name = name.into();
        let value = value.into();

        Self::validate_header_name(&name)?;
        Self::validate_header_value(&name, &value)?;

        self.headers.retain(|(n, _)| !n.eq_ignore_ascii_case(&name));
        if self.headers.len() >= MAX_HEADERS_COUNT {
            return Err(HttpError::TooManyHeaders {
                count: self.headers.len(),
                max: MAX_HEADERS_COUNT,
            });
        }
        self.headers.push((name, value));
        Ok(())
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.headers.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.headers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.headers.is_empty()
    }

    fn validate_header_name(name: &str) -> Result<(), HttpError> {
        if name.is_empty() {
            return Err(HttpError::InvalidHeader {
                name: String::new(),
                reason: "header name cannot be empty".to_string(),
            });
        }

        if name.len() > MAX_HEADER_NAME_LENGTH {
            return Err(HttpError::InvalidHeader {
                name: name.chars().take(50).collect(),
                reason: format!(
                    "header name exceeds maximum length of {MAX_HEADER_NAME_LENGTH} bytes"
                ),
            });
        }

        if let Some(c) = name
            .chars()
            .find(|c| !c.is_ascii_alphanumeric() && *c != '-' && *c != '_')
        {
            return Err(HttpError::InvalidHeader {
                name: name.to_string(),
                reason: format!("invalid character '{c}' in header name"),
            });
        }

        let lower = name.to_ascii_lowercase();
        if lower == "host" || lower == "content-length" || lower == "transfer-encoding" {
            return Err(HttpError::InvalidHeader {
                name: name.to_string(),
                reason: "this header is managed automatically".to_string(),
            });
        }

        Ok(())
    }

    fn validate_header_value(name: &str, value: &str) -> Result<(), HttpError> {
        if value.len() > MAX_HEADER_VALUE_LENGTH {
            return Err(HttpError::InvalidHeader {
                name: name.to_string(),
                reason: format!(
                    "header value exceeds maximum length of {MAX_HEADER_VALUE_LENGTH} bytes"
                ),
            });
        }

        if value.chars().any(|c| c == '\r' || c == '\n' || c == '\0') {
            return Err(HttpError::InvalidHeader {
                name: name.to_string(),
                reason: "header value contains invalid characters (CR, LF, or NULL)".to_string(),
            });
        }

        Ok(())
    }
}

// Authorization values stay out of logs.
impl fmt::Debug for HttpHeaders {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.headers.iter().map(|(n, v)| {
                if n.eq_ignore_ascii_case("authorization") {
                    (n.as_str(), "[REDACTED]")
                } else {
                    (n.as_str(), v.as_str())
                }
            }))
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl HttpMethod {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
        }
    }

    #[must_use]
    pub const fn has_request_body(self) -> bool {
        matches!(self, Self::Post | Self::Put | Self::Patch)
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct HttpRequest {
    method: HttpMethod,
    url: Url,
    headers: HttpHeaders,
    body: Option<Bytes>,
    timeout: Duration,
    request_id: String,
}

impl HttpRequest {
    pub fn new(method: HttpMethod, url: Url) -> Result<Self, HttpError> {
        if url.as_str().len() > MAX_URL_LENGTH {
            return Err(HttpError::InvalidUrl {
                url: url.as_str().chars().take(100).collect(),
                reason: format!("URL exceeds maximum length of {MAX_URL_LENGTH} bytes"),
            });
        }
        if !matches!(url.scheme(), "http" | "https") {
            return Err(HttpError::InvalidUrl {
                url: url.to_string(),
                reason: format!(
                    "invalid scheme '{}', only 'http' and 'https' are allowed",
                    url.scheme()
                ),
            });
        }

        let mut headers = HttpHeaders::new();
        headers.insert("Accept", "application/json")?;

        Ok(Self {
            method,
            url,
            headers,
            body: None,
            timeout: crate::DEFAULT_REQUEST_TIMEOUT,
            request_id: uuid::Uuid::new_v4().to_string(),
        })
    }

    pub fn with_header(
        mut self,
        name: impl Into<String>,
        value: impl Into<String>,
    ) -> Result<Self, HttpError> {
        self.headers.insert(name, value)?;
        Ok(self)
    }

    pub fn with_bearer(self, token: &SecretString) -> Result<Self, HttpError> {
        self.with_header("Authorization", format!("Bearer {}", token.expose_secret()))
    }

    pub fn with_body(
        mut self,
        body: impl Into<Bytes>,
        content_type: &str,
    ) -> Result<Self, HttpError> {
        if !self.method.has_request_body() {
            return Err(HttpError::InvalidRequest {
                reason: format!("{} requests cannot have a body", self.method),
            });
        }

        let body = body.into();
        if body.len() > MAX_REQUEST_BODY_SIZE {
            return Err(HttpError::BodyTooLarge {
                size: body.len(),
                max: MAX_REQUEST_BODY_SIZE,
            });
        }

        self.headers.insert("Content-Type", content_type)?;
        self.body = Some(body);
        Ok(self)
    }

    pub fn with_json<T: Serialize>(self, value: &T) -> Result<Self, HttpError> {
        let body = serde_json::to_vec(value).map_err(|e| HttpError::Serialization {
            message: e.to_string(),
        })?;
        self.with_body(body, "application/json")
    }

    pub fn with_multipart(self, form: MultipartForm) -> Result<Self, HttpError> {
        let content_type = form.content_type();
        self.with_body(form.into_body(), &content_type)
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Result<Self, HttpError> {
        if timeout.is_zero() {
            return Err(HttpError::InvalidRequest {
                reason: "timeout cannot be zero".to_string(),
            });
        }
        if timeout > MAX_TIMEOUT {
            return Err(HttpError::InvalidRequest {
                reason: format!("timeout exceeds maximum of {}s", MAX_TIMEOUT.as_secs()),
            });
        }
        self.timeout = timeout;
        Ok(self)
    }

    #[must_use]
    pub const fn method(&self) -> HttpMethod {
        self.method
    }

    #[must_use]
    pub const fn url(&self) -> &Url {
        &self.url
    }

    #[must_use]
    pub const fn headers(&self) -> &HttpHeaders {
        &self.headers
    }

    #[must_use]
    pub fn body(&self) -> Option<&[u8]> {
        self.body.as_deref()
    }

    #[must_use]
    pub const fn timeout(&self) -> Duration {
        self.timeout
    }

    #[must_use]
    pub fn request_id(&self) -> &str {
        &self.request_id
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    status: u16,
    headers: HttpHeaders,
    body: Bytes,
}

impl HttpResponse {
    pub fn new(status: u16, headers: HttpHeaders, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            headers,
            body: body.into(),
        }
    }

    pub fn json_body(status: u16, value: &serde_json::Value) -> Self {
        let mut headers = HttpHeaders::new();
        // Static header, always valid.
        let _ = headers.insert("Content-Type", "application/json");
        Self::new(status, headers, value.to_string())
    }

    #[must_use]
    pub const fn status(&self) -> u16 {
        self.status
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)
    }

    #[must_use]
    pub fn body(&self) -> &[u8] {
        &self.body
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum HttpError {
    #[error("invalid URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("invalid header '{name}': {reason}")]
    InvalidHeader { name: String, reason: String },

    #[error("too many headers: {count} exceeds maximum of {max}")]
    TooManyHeaders { count: usize, max: usize },

    #[error("request body too large: {size} bytes exceeds maximum of {max} bytes")]
    BodyTooLarge { size: usize, max: usize },

    #[error("invalid request: {reason}")]
    InvalidRequest { reason: String },

    #[error("serialization error: {message}")]
    Serialization { message: String },

    #[error("connection failed: {message}")]
    Connection { message: String },

    #[error("timeout after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("invalid response: {reason}")]
    InvalidResponse { reason: String },
}

impl HttpError {
    pub(crate) fn timeout(after: Duration) -> Self {
        Self::Timeout {
            timeout_ms: u64::try_from(after.as_millis()).unwrap_or(u64::MAX),
        }
    }
}

impl From<HttpError> for AppError {
    fn from(e: HttpError) -> Self {
        let internal = e.to_string();
        let error = match e {
            HttpError::Connection { .. } | HttpError::Timeout { .. } => {
                AppError::new(ErrorKind::Network, "Unable to reach the server")
            }
            HttpError::InvalidUrl { .. } => {
                AppError::new(ErrorKind::Configuration, "The server address is invalid")
            }
            HttpError::BodyTooLarge { .. } => {
                AppError::new(ErrorKind::Validation, "The upload is too large")
                    .with_field("file", "The upload is too large")
            }
            HttpError::InvalidResponse { .. } => {
                AppError::new(ErrorKind::Unknown, "Unexpected response from server")
            }
            HttpError::InvalidHeader { .. }
            | HttpError::TooManyHeaders { .. }
            | HttpError::InvalidRequest { .. }
            | HttpError::Serialization { .. } => {
                AppError::new(ErrorKind::Unknown, "Could not build the request")
            }
        };
        error.with_internal(internal)
    }
}

/// Executes one request. Non-2xx statuses are returned as responses;
/// only transport-level failures are errors.
#[async_trait::async_trait]
pub trait HttpTransport: Send + Sync {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, HttpError>;
}

#[cfg(feature = "reqwest-transport")]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

#[cfg(feature = "reqwest-transport")]
impl ReqwestTransport {
    pub fn new() -> Result<Self, HttpError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("ajali-core/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| HttpError::InvalidRequest {
                reason: format!("failed to build HTTP client: {e}"),
            })?;
        Ok(Self { client })
    }

    fn method(method: HttpMethod) -> reqwest::Method {
        match method {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
            HttpMethod::Put => reqwest::Method::PUT,
            HttpMethod::Patch => reqwest::Method::PATCH,
            HttpMethod::Delete => reqwest::Method::DELETE,
        }
    }
}

#[cfg(feature = "reqwest-transport")]
#[async_trait::async_trait]
impl HttpTransport for ReqwestTransport {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, HttpError> {
        let started = std::time::Instant::now();
        let timeout = request.timeout();
        let mut builder = self
            .client
            .request(Self::method(request.method()), request.url().clone())
            .timeout(timeout);
        for (name, value) in request.headers().iter() {
            builder = builder.header(name, value);
        }
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                HttpError::timeout(timeout)
            } else {
                HttpError::Connection {
                    message: e.to_string(),
                }
            }
        })?;

        let status = response.status().as_u16();
        let mut headers = HttpHeaders::new();
        for (name, value) in response.headers() {
            if let Ok(value) = value.to_str() {
                // Response headers the request validator rejects are not needed.
                let _ = headers.insert(name.as_str(), value);
            }
        }
        let body = response.bytes().await.map_err(|e| {
            if e.is_timeout() {
                HttpError::timeout(timeout)
            } else {
                HttpError::Connection {
                    message: e.to_string(),
                }
            }
        })?;

        tracing::trace!(
            request_id = %request.request_id,
            status,
            elapsed_ms = started.elapsed().as_millis(),
            "http exchange complete"
        );
        Ok(HttpResponse::new(status, headers, body))
    }
}

// --- Multipart ---

enum Part {
    Text {
        name: String,
        value: String,
    },
    File {
        name: String,
        filename: String,
        content_type: String,
        bytes: Bytes,
    },
}

/// `multipart/form-data` body builder.
pub struct MultipartForm {
    boundary: String,
    parts: Vec<Part>,
}

impl Default for MultipartForm {
    fn default() -> Self {
        Self::new()
    }
}

impl MultipartForm {
    #[must_use]
    pub fn new() -> Self {
        Self {
            boundary: format!("ajali-{}", uuid::Uuid::new_v4().simple()),
            parts: Vec::new(),
        }
    }

    #[must_use]
    pub fn text(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.parts.push(Part::Text {
            name: name.into(),
            value: value.into(),
        });
        self
    }

    #[must_use]
    pub fn file(
        mut self,
        name: impl Into<String>,
        filename: impl Into<String>,
        content_type: impl Into<String>,
        bytes: Bytes,
    ) -> Self {
        self.parts.push(Part::File {
            name: name.into(),
            filename: filename.into(),
            content_type: content_type.into(),
            bytes,
        });
        self
    }

    #[must_use]
    pub fn boundary(&self) -> &str {
        &self.boundary
    }

    #[must_use]
    pub fn content_type(&self) -> String {
        format!("multipart/form-data; boundary={}", self.boundary)
    }

    #[must_use]
    pub fn into_body(self) -> Bytes {
        let mut out = BytesMut::new();
        for part in self.parts {
            out.put_slice(format!("--{}\r\n", self.boundary).as_bytes());
            match part {
                Part::Text { name, value } => {
                    out.put_slice(
                        format!(
                            "Content-Disposition: form-data; name=\"{}\"\r\n\r\n",
                            quote(&name)
                        )
                        .as_bytes(),
                    );
                    out.put_slice(value.as_bytes());
                }
                Part::File {
                    name,
                    filename,
                    content_type,
                    bytes,
                } => {
                    out.put_slice(
                        format!(
                            "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: {}\r\n\r\n",
                            quote(&name),
                            quote(&filename),
                            content_type.replace(['\r', '\n'], "")
                        )
                        .as_bytes(),
                    );
                    out.put_slice(&bytes);
                }
            }
            out.put_slice(b"\r\n");
        }
        out.put_slice(format!("--{}--\r\n", self.boundary).as_bytes());
        out.freeze()
    }
}

fn quote(value: &str) -> String {
    value
        .replace('"', "%22")
        .replace('\r', "%0D")
        .replace('\n', "%0A")
}
