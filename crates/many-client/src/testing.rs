//! Testing utilities for code built on [`Client`](crate::Client).

use std::collections::VecDeque;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use tokio::time::Instant;

use many_message::{Request, Response};

use crate::transport::{Transport, TransportError};

type Handler = Box<dyn Fn(&Request) -> Option<Response> + Send + Sync>;

/// A request body seen by [`MockTransport`] and when it arrived.
#[derive(Debug, Clone)]
pub struct SentRequest {
    pub body: Bytes,
    pub at: Instant,
}

impl SentRequest {
    /// Decode the body back into a request, verifying any envelope.
    pub fn request(&self) -> Result<Request, many_message::MessageError> {
        Request::decode(&self.body)
    }
}

/// Mock transport for testing
///
/// Scripted replies are served first, in order. Once the script runs dry
/// the optional handler answers; without one the exchange fails.
pub struct MockTransport {
    replies: Mutex<VecDeque<Result<Bytes, TransportError>>>,
    sent: Mutex<Vec<SentRequest>>,
    handler: Option<Handler>,
}

impl MockTransport {
    /// Create a new mock transport
    pub fn new() -> Self {
        Self {
            replies: Mutex::new(VecDeque::new()),
            sent: Mutex::new(Vec::new()),
            handler: None,
        }
    }

    /// Answer unscripted requests with `handler`. `None` means an empty body.
    pub fn with_handler<F>(mut self, handler: F) -> Self
    where
        F: Fn(&Request) -> Option<Response> + Send + Sync + 'static,
    {
        self.handler = Some(Box::new(handler));
        self
    }

    pub fn push_bytes(&self, body: impl Into<Bytes>) {
        self.replies.lock().push_back(Ok(body.into()));
    }

    pub fn push_response(&self, response: &Response) {
        self.push_bytes(response.to_cbor());
    }

    /// Queue an empty body, the server's "no result" answer.
    pub fn push_empty(&self) {
        self.push_bytes(Bytes::new());
    }

    pub fn push_error(&self, error: TransportError) {
        self.replies.lock().push_back(Err(error));
    }

    /// Get sent requests
    pub fn sent(&self) -> Vec<SentRequest> {
        self.sent.lock().clone()
    }

    /// Decoded requests, in send order.
    pub fn sent_requests(&self) -> Vec<Request> {
        self.sent
            .lock()
            .iter()
            .filter_map(|s| s.request().ok())
            .collect()
    }

    pub fn remaining(&self) -> usize {
        self.replies.lock().len()
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn exchange(&self, body: Bytes) -> Result<Bytes, TransportError> {
        self.sent.lock().push(SentRequest {
            body: body.clone(),
            at: Instant::now(),
        });

        if let Some(reply) = self.replies.lock().pop_front() {
            return reply;
        }

        let handler = self
            .handler
            .as_ref()
            .ok_or_else(|| TransportError::Other("no scripted reply".into()))?;
        let request = Request::decode(&body).map_err(|e| TransportError::Other(e.to_string()))?;
        Ok(handler(&request)
            .map(|resp| Bytes::from(resp.to_cbor()))
            .unwrap_or_default())
    }
}
