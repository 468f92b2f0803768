use std::time::Duration;

use many_message::{ManyError, MessageError};

use crate::modules::ModuleError;
use crate::transport::TransportError;

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Message(#[from] MessageError),

    /// The server answered with a structured error.
    #[error("{0}")]
    Protocol(#[from] ManyError),

    #[error("unknown request token: {0}")]
    UnknownToken(String),

    #[error("request token expired")]
    TokenExpired,

    #[error("unknown request status: {0}")]
    UnknownStatus(i128),

    #[error("async result not ready within {0:?}")]
    PollDeadlineExceeded(Duration),

    #[error("cancelled")]
    Cancelled,

    #[error("async.status returned no result")]
    NoStatus,

    #[error("malformed async.status payload: {0}")]
    MalformedStatus(String),

    #[error(transparent)]
    Module(#[from] ModuleError),
}

pub type Result<T> = std::result::Result<T, ClientError>;
