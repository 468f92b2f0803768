//! Polling of deferred (async) calls.
//!
//! A server that cannot answer immediately returns a token. The client then
//! issues `async.status` calls with exponentially growing pauses until the
//! job reaches a terminal state.

use std::time::Duration;

use many_identity::cbor::{self, MapBuilder, Value};
use many_identity::Identity;
use many_message::{PendingToken, Response, ResponseResult};
use tokio::time::{sleep, Instant};
use tracing::{debug, info};

use crate::client::Client;
use crate::errors::{ClientError, Result};

pub const STATUS_METHOD: &str = "async.status";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum AsyncStatus {
    Unknown = 0,
    Queued = 1,
    Processing = 2,
    Done = 3,
    Expired = 4,
}

impl AsyncStatus {
    pub fn from_code(code: u64) -> Option<Self> {
        match code {
            0 => Some(AsyncStatus::Unknown),
            1 => Some(AsyncStatus::Queued),
            2 => Some(AsyncStatus::Processing),
            3 => Some(AsyncStatus::Done),
            4 => Some(AsyncStatus::Expired),
            _ => None,
        }
    }

    pub const fn code(self) -> u64 {
        self as u64
    }

    pub const fn is_terminal(self) -> bool {
        !matches!(self, AsyncStatus::Queued | AsyncStatus::Processing)
    }
}

/// Backoff configuration for status polling.
#[derive(Debug, Clone, PartialEq)]
pub struct PollConfig {
    pub initial_delay: Duration,
    pub multiplier: f64,
    /// Upper bound for a single pause. `None` lets pauses grow without limit.
    pub max_delay: Option<Duration>,
    /// Give up once the next pause would end past this much total time.
    pub deadline: Option<Duration>,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(500),
            multiplier: 1.5,
            max_delay: None,
            deadline: None,
        }
    }
}

impl PollConfig {
    /// Pause before the status call following attempt `attempt` (0-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let secs = self.initial_delay.as_secs_f64() * self.multiplier.powi(exponent);
        let delay = Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX);
        match self.max_delay {
            Some(max) => delay.min(max),
            None => delay,
        }
    }
}

/// One decoded `async.status` answer.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusReply {
    pub status: AsyncStatus,
    pub value: Option<Value>,
}

impl StatusReply {
    pub fn from_value(value: &Value) -> Result<Self> {
        let map = cbor::as_map(value)
            .ok_or_else(|| ClientError::MalformedStatus("payload is not a map".into()))?;
        let code = cbor::map_get(map, 0)
            .ok_or_else(|| ClientError::MalformedStatus("missing status".into()))?;
        let code = cbor::as_i128(code)
            .ok_or_else(|| ClientError::MalformedStatus("status is not an integer".into()))?;
        let status = u64::try_from(code)
            .ok()
            .and_then(AsyncStatus::from_code)
            .ok_or(ClientError::UnknownStatus(code))?;
        Ok(Self {
            status,
            value: cbor::map_get(map, 1).cloned(),
        })
    }

    pub fn to_value(&self) -> Value {
        MapBuilder::new()
            .insert(0, cbor::uint(self.status.code()))
            .insert_opt(1, self.value.clone())
            .build()
    }
}

pub fn status_payload(token: &PendingToken) -> Value {
    MapBuilder::new()
        .insert(0, Value::Bytes(token.as_bytes().to_vec()))
        .build()
}

/// Poll `token` until it completes, using the same identity as the call
/// that produced it.
pub(crate) async fn wait_for(client: &Client, identity: &dyn Identity, token: PendingToken) -> Result<Value> {
    let config = client.poll_config();
    let cancel = client.cancellation_token();
    let started = Instant::now();
    let mut attempt: u32 = 0;

    loop {
        if cancel.is_cancelled() {
            return Err(ClientError::Cancelled);
        }

        let reply = client.status(identity, &token).await?;
        debug!(token = %token, attempt, status = ?reply.status, "async status");

        match reply.status {
            AsyncStatus::Unknown => return Err(ClientError::UnknownToken(token.to_hex())),
            AsyncStatus::Expired => {
                info!(token = %token, "async token expired");
                return Err(ClientError::TokenExpired);
            }
            AsyncStatus::Done => {
                info!(token = %token, attempts = attempt + 1, "async call done");
                return unwrap_done(reply.value);
            }
            AsyncStatus::Queued | AsyncStatus::Processing => {
                let delay = config.delay_for(attempt);
                if let Some(deadline) = config.deadline {
                    if started.elapsed().saturating_add(delay) > deadline {
                        return Err(ClientError::PollDeadlineExceeded(deadline));
                    }
                }
                tokio::select! {
                    _ = cancel.cancelled() => return Err(ClientError::Cancelled),
                    _ = sleep(delay) => {}
                }
                attempt = attempt.saturating_add(1);
            }
        }
    }
}

/// The value of a finished job is normally the encoded response of the
/// original call. Anything else is returned untouched.
fn unwrap_done(value: Option<Value>) -> Result<Value> {
    let Some(value) = value else {
        return Ok(Value::Null);
    };
    let Some(bytes) = cbor::as_bytes(&value) else {
        return Ok(value);
    };
    match Response::decode(bytes) {
        Ok(resp) => match resp.result {
            ResponseResult::Ok { value, .. } => Ok(value),
            ResponseResult::Failed(err) => Err(ClientError::Protocol(err)),
        },
        Err(_) => Ok(value),
    }
}
