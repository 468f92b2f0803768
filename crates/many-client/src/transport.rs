//! Request/response exchange with a MANY server.

use std::sync::Arc;
#[cfg(feature = "http")]
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
#[cfg(feature = "http")]
use tracing::{debug, warn};

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("http error: {0}")]
    Http(String),

    #[error("operation timed out")]
    Timeout,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("other error: {0}")]
    Other(String),
}

/// One request body out, one response body back.
///
/// An empty response body is a valid answer and is returned as-is.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn exchange(&self, body: Bytes) -> Result<Bytes, TransportError>;
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for Arc<T> {
    async fn exchange(&self, body: Bytes) -> Result<Bytes, TransportError> {
        (**self).exchange(body).await
    }
}

/// HTTP client configuration
#[cfg(feature = "http")]
#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    pub connect_timeout: Duration,
    /// Whole-request timeout. `None` waits indefinitely.
    pub request_timeout: Option<Duration>,
    pub proxy_url: Option<String>,
}

#[cfg(feature = "http")]
impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            request_timeout: Some(Duration::from_secs(30)),
            proxy_url: None,
        }
    }
}

/// Single-POST transport. No retries.
#[cfg(feature = "http")]
#[derive(Clone)]
pub struct HttpTransport {
    url: String,
    client: reqwest::Client,
}

#[cfg(feature = "http")]
impl HttpTransport {
    pub fn new(url: impl Into<String>) -> Result<Self, TransportError> {
        Self::with_config(url, &HttpClientConfig::default())
    }

    pub fn with_config(url: impl Into<String>, config: &HttpClientConfig) -> Result<Self, TransportError> {
        let mut builder = reqwest::Client::builder()
            .use_rustls_tls()
            .connect_timeout(config.connect_timeout);
        if let Some(timeout) = config.request_timeout {
            builder = builder.timeout(timeout);
        }
        if let Some(proxy) = &config.proxy_url {
            let proxy = reqwest::Proxy::all(proxy).map_err(|e| TransportError::Http(e.to_string()))?;
            builder = builder.proxy(proxy);
        }
        let client = builder.build().map_err(|e| TransportError::Http(e.to_string()))?;
        Ok(Self {
            url: url.into(),
            client,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[cfg(feature = "http")]
fn map_reqwest(e: reqwest::Error) -> TransportError {
    if e.is_timeout() {
        TransportError::Timeout
    } else {
        TransportError::Http(e.to_string())
    }
}

#[cfg(feature = "http")]
#[async_trait]
impl Transport for HttpTransport {
    async fn exchange(&self, body: Bytes) -> Result<Bytes, TransportError> {
        let resp = self
            .client
            .post(&self.url)
            .header(reqwest::header::CONTENT_TYPE, "application/cbor")
            .body(body)
            .send()
            .await
            .map_err(map_reqwest)?;

        // Errors are reported in the CBOR body; return it for any status.
        let status = resp.status();
        if !status.is_success() {
            warn!(url = %self.url, %status, "non-success HTTP status");
        }
        let bytes = resp.bytes().await.map_err(map_reqwest)?;
        debug!(url = %self.url, %status, len = bytes.len(), "exchange complete");
        Ok(bytes)
    }
}
