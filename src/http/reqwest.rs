use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, Method};

use crate::error::EllError;

use super::{
    DynHttpTransport, HttpBodyStream, HttpMethod, HttpRequest, HttpResponse, HttpStreamResponse,
    HttpTransport,
};

/// [`HttpTransport`] backed by a shared `reqwest::Client`.
#[derive(Clone)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Builds a client with default TLS settings and an optional overall timeout.
    pub fn with_timeout(timeout: Option<Duration>) -> Result<Self, EllError> {
        let mut builder = Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        builder
            .build()
            .map(Self::new)
            .map_err(|err| EllError::transport(format!("failed to create reqwest client: {err}")))
    }

    pub fn default_client() -> Result<Self, EllError> {
        Self::with_timeout(None)
    }

    fn method(method: HttpMethod) -> Method {
        match method {
            HttpMethod::Get => Method::GET,
            HttpMethod::Post => Method::POST,
        }
    }

    fn build_request(&self, mut request: HttpRequest) -> Result<reqwest::RequestBuilder, EllError> {
        let mut builder = self
            .client
            .request(Self::method(request.method), &request.url);

        if let Some(timeout) = request.timeout {
            builder = builder.timeout(timeout);
        }

        for (name, value) in request.headers.drain() {
            let header_name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|err| EllError::transport(format!("invalid header name: {err}")))?;
            let header_value = HeaderValue::from_str(&value).map_err(|err| {
                EllError::transport(format!("invalid header value for {header_name}: {err}"))
            })?;
            builder = builder.header(header_name, header_value);
        }

        if let Some(body) = request.body.take() {
            builder = builder.body(body);
        }

        Ok(builder)
    }

    async fn dispatch(&self, request: HttpRequest) -> Result<reqwest::Response, EllError> {
        self.build_request(request)?
            .send()
            .await
            .map_err(|err| EllError::transport(err.to_string()))
    }
}

fn headers_to_map(headers: &HeaderMap) -> HashMap<String, String> {
    headers
        .iter()
        .map(|(name, value)| {
            (
                name.as_str().to_string(),
                value.to_str().unwrap_or_default().to_string(),
            )
        })
        .collect()
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, EllError> {
        let response = self.dispatch(request).await?;
        let status = response.status().as_u16();
        let headers = headers_to_map(response.headers());
        let body = response
            .bytes()
            .await
            .map_err(|err| EllError::transport(err.to_string()))?
            .to_vec();

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }

    async fn send_stream(&self, request: HttpRequest) -> Result<HttpStreamResponse, EllError> {
        let response = self.dispatch(request).await?;
        let status = response.status().as_u16();
        let headers = headers_to_map(response.headers());
        let body: HttpBodyStream = Box::pin(response.bytes_stream().map(|chunk| {
            chunk
                .map(|bytes| bytes.to_vec())
                .map_err(|err| EllError::transport(err.to_string()))
        }));

        Ok(HttpStreamResponse {
            status,
            headers,
            body,
        })
    }
}

/// Shared transport with default settings.
pub fn default_dyn_transport() -> Result<DynHttpTransport, EllError> {
    Ok(Arc::new(ReqwestTransport::default_client()?))
}
