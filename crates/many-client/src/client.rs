//! Call orchestration: encode, exchange, decode, and follow async tokens.

use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use many_identity::cbor::Value;
use many_identity::{Address, Identity};
use many_message::{encode_request, PendingToken, Request, RequestOptions, Response, ResponseResult};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::errors::{ClientError, Result};
use crate::poller::{self, PollConfig, StatusReply, STATUS_METHOD};
use crate::transport::Transport;

/// What a successful call produced.
#[derive(Debug, Clone, PartialEq)]
pub enum CallOutcome {
    Value(Value),
    /// The server answered with an empty body.
    NoResult,
}

impl CallOutcome {
    pub fn into_value(self) -> Option<Value> {
        match self {
            CallOutcome::Value(v) => Some(v),
            CallOutcome::NoResult => None,
        }
    }
}

/// A MANY client bound to one server.
///
/// The client holds no identity. Each call names the identity that signs
/// it, or goes through a [`Caller`] that borrows one.
#[derive(Clone)]
pub struct Client {
    transport: Arc<dyn Transport>,
    poll: PollConfig,
    cancel: CancellationToken,
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("poll", &self.poll)
            .field("cancelled", &self.cancel.is_cancelled())
            .finish_non_exhaustive()
    }
}

impl Client {
    pub fn new(transport: impl Transport + 'static) -> Self {
        Self::from_arc(Arc::new(transport))
    }

    pub fn from_arc(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            poll: PollConfig::default(),
            cancel: CancellationToken::new(),
        }
    }

    /// Client over HTTP POST to `url`.
    #[cfg(feature = "http")]
    pub fn connect(
        url: impl Into<String>,
        config: &crate::transport::HttpClientConfig,
    ) -> Result<Self> {
        Ok(Self::new(crate::transport::HttpTransport::with_config(url, config)?))
    }

    pub fn with_poll_config(mut self, config: PollConfig) -> Self {
        self.poll = config;
        self
    }

    /// Cancelling `token` aborts any poll in progress on this client and its
    /// clones.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn poll_config(&self) -> &PollConfig {
        &self.poll
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Borrow this client together with an identity.
    pub fn as_identity<'a>(&'a self, identity: &'a dyn Identity) -> Caller<'a> {
        Caller {
            client: self,
            identity,
        }
    }

    /// Encode `request` for `identity`, exchange it, and decode the answer.
    ///
    /// An empty body yields `Ok(None)`.
    pub async fn send(&self, request: &Request, identity: &dyn Identity) -> Result<Option<Response>> {
        let encoded = encode_request(request, identity)?;
        let body = self.transport.exchange(Bytes::from(encoded)).await?;
        if body.is_empty() {
            return Ok(None);
        }
        Ok(Some(Response::decode(&body)?))
    }

    /// Call `method` as `identity`, following an async token to completion.
    pub async fn call(
        &self,
        identity: &dyn Identity,
        method: &str,
        data: Value,
        options: RequestOptions,
    ) -> Result<CallOutcome> {
        let request = Request::build(method, identity, data, options);
        let Some(response) = self.send(&request, identity).await? else {
            warn!(method, "empty response");
            return Ok(CallOutcome::NoResult);
        };

        match response.result {
            ResponseResult::Failed(err) => {
                debug!(method, code = err.code(), "call failed");
                Err(ClientError::Protocol(err))
            }
            ResponseResult::Ok { value, token: None } => Ok(CallOutcome::Value(value)),
            ResponseResult::Ok {
                token: Some(token), ..
            } => {
                debug!(method, token = %token, "call deferred");
                poller::wait_for(self, identity, token)
                    .await
                    .map(CallOutcome::Value)
            }
        }
    }

    /// One `async.status` round trip for `token`.
    pub async fn status(&self, identity: &dyn Identity, token: &PendingToken) -> Result<StatusReply> {
        let request = Request::build(
            STATUS_METHOD,
            identity,
            poller::status_payload(token),
            RequestOptions::default(),
        );
        let response = self
            .send(&request, identity)
            .await?
            .ok_or(ClientError::NoStatus)?;
        match response.result {
            ResponseResult::Ok { value, .. } => StatusReply::from_value(&value),
            ResponseResult::Failed(err) => Err(ClientError::Protocol(err)),
        }
    }
}

/// A client paired with the identity its calls are signed with.
#[derive(Clone, Copy)]
pub struct Caller<'a> {
    client: &'a Client,
    identity: &'a dyn Identity,
}

impl<'a> Caller<'a> {
    pub fn client(&self) -> &'a Client {
        self.client
    }

    pub fn identity(&self) -> &'a dyn Identity {
        self.identity
    }

    pub fn address(&self) -> Address {
        self.identity.address()
    }

    pub async fn call(&self, method: &str, data: Value) -> Result<CallOutcome> {
        self.call_with(method, data, RequestOptions::default()).await
    }

    pub async fn call_with(&self, method: &str, data: Value, options: RequestOptions) -> Result<CallOutcome> {
        self.client.call(self.identity, method, data, options).await
    }
}

impl fmt::Debug for Caller<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Caller")
            .field("identity", &self.identity.address())
            .finish_non_exhaustive()
    }
}
