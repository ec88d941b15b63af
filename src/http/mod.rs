//! Minimal HTTP surface used by vendor adapters.
//!
//! Adapters never talk to `reqwest` directly; they go through [`HttpTransport`] so
//! tests can substitute an in-memory transport.

use std::collections::HashMap;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_core::Stream;
use futures_util::StreamExt;
use serde::Serialize;

use crate::error::EllError;

pub mod reqwest;

/// HTTP methods understood by the transport abstraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
}

/// Request handed to an [`HttpTransport`].
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: HashMap<String, String>,
    pub body: Option<Vec<u8>>,
    pub timeout: Option<Duration>,
}

impl HttpRequest {
    /// Builds a POST request carrying a JSON body.
    ///
    /// # Examples
    ///
    /// ```
    /// use ell_core::http::{HttpMethod, HttpRequest};
    ///
    /// let request = HttpRequest::post_json("https://example.com", br"{}".to_vec());
    /// assert_eq!(request.method, HttpMethod::Post);
    /// assert_eq!(request.headers.get("Content-Type"), Some(&"application/json".to_string()));
    /// ```
    pub fn post_json(url: impl Into<String>, body: Vec<u8>) -> Self {
        Self {
            method: HttpMethod::Post,
            url: url.into(),
            headers: HashMap::from([("Content-Type".to_string(), "application/json".to_string())]),
            body: Some(body),
            timeout: None,
        }
    }

    /// Merges `headers` into the request, overriding entries with the same name.
    pub fn with_headers(mut self, headers: HashMap<String, String>) -> Self {
        self.headers.extend(headers);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// Fully buffered HTTP response.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: HashMap<String, String>,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Decodes the body as UTF-8.
    ///
    /// # Errors
    ///
    /// Returns [`EllError::Transport`] when the body is not valid UTF-8.
    pub fn into_string(self) -> Result<String, EllError> {
        String::from_utf8(self.body).map_err(|err| EllError::transport(err.to_string()))
    }
}

/// Response whose body is still being received.
pub struct HttpStreamResponse {
    pub status: u16,
    pub headers: HashMap<String, String>,
    pub body: HttpBodyStream,
}

impl HttpStreamResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Raw body chunks as they arrive from the network.
pub type HttpBodyStream = Pin<Box<dyn Stream<Item = Result<Vec<u8>, EllError>> + Send>>;

/// Decouples adapters from the concrete HTTP client.
///
/// # Examples
///
/// ```
/// # use async_trait::async_trait;
/// # use ell_core::http::{HttpTransport, HttpRequest, HttpResponse, HttpStreamResponse};
/// # use ell_core::error::EllError;
/// # use futures_util::stream;
/// struct MemoryTransport;
///
/// #[async_trait]
/// impl HttpTransport for MemoryTransport {
///     async fn send(&self, request: HttpRequest) -> Result<HttpResponse, EllError> {
///         Ok(HttpResponse { status: 200, headers: request.headers, body: b"ok".to_vec() })
///     }
///     async fn send_stream(&self, request: HttpRequest) -> Result<HttpStreamResponse, EllError> {
///         Ok(HttpStreamResponse { status: 200, headers: request.headers, body: Box::pin(stream::empty()) })
///     }
/// }
///
/// # tokio::runtime::Runtime::new().unwrap().block_on(async {
/// let response = MemoryTransport
///     .send(HttpRequest::post_json("https://example.com", br"{}".to_vec()))
///     .await
///     .unwrap();
/// assert!(response.is_success());
/// # });
/// ```
#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// Sends a request and resolves once the whole body has been read.
    ///
    /// # Errors
    ///
    /// Implementations map network failures to [`EllError::Transport`]. Non-2xx statuses
    /// are returned as responses, not errors.
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, EllError>;

    /// Sends a request and returns as soon as the headers are available.
    ///
    /// # Errors
    ///
    /// Same contract as [`HttpTransport::send`].
    async fn send_stream(&self, request: HttpRequest) -> Result<HttpStreamResponse, EllError>;
}

/// Thread-safe handle to a transport implementation.
pub type DynHttpTransport = Arc<dyn HttpTransport>;

fn encode_body<T: Serialize>(body: &T) -> Result<Vec<u8>, EllError> {
    serde_json::to_vec(body)
        .map_err(|err| EllError::invalid_request(format!("failed to serialize request: {err}")))
}

/// Serializes `body` to JSON and POSTs it with the given headers.
///
/// # Errors
///
/// Returns [`EllError::InvalidRequest`] if serialization fails, otherwise forwards the
/// transport error.
pub async fn post_json_with_headers<T: Serialize>(
    transport: &dyn HttpTransport,
    url: impl Into<String>,
    headers: HashMap<String, String>,
    body: &T,
) -> Result<HttpResponse, EllError> {
    let request = HttpRequest::post_json(url, encode_body(body)?).with_headers(headers);
    transport.send(request).await
}

/// Streaming counterpart of [`post_json_with_headers`].
///
/// # Errors
///
/// Same as [`post_json_with_headers`].
pub async fn post_json_stream_with_headers<T: Serialize>(
    transport: &dyn HttpTransport,
    url: impl Into<String>,
    headers: HashMap<String, String>,
    body: &T,
) -> Result<HttpStreamResponse, EllError> {
    let request = HttpRequest::post_json(url, encode_body(body)?).with_headers(headers);
    transport.send_stream(request).await
}

/// Drains a body stream into a string, used to read error payloads of streamed calls.
pub async fn collect_body_text(mut body: HttpBodyStream) -> Result<String, EllError> {
    let mut bytes = Vec::new();
    while let Some(chunk) = body.next().await {
        bytes.extend_from_slice(&chunk?);
    }
    String::from_utf8(bytes)
        .map_err(|err| EllError::transport(format!("failed to decode stream body: {err}")))
}
