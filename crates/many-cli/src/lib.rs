//! `many` - command-line client for MANY servers
//!
//! This crate provides a command-line interface for:
//! - Creating identities (mnemonics, PEM export)
//! - Sending raw requests and waiting on async results
//! - The kvstore and account modules

pub mod cli;
pub mod config;
pub mod identity;
pub mod output;
pub mod value;

#[cfg(test)]
mod proptests;

pub use cli::Cli;
pub use config::{CliOverrides, Config, ConfigError};
pub use output::{JsonResponse, OutputFormat, OutputFormatter};

use many_client::{ClientError, TransportError};
use many_identity::IdentityError;
use many_message::MessageError;

/// Exit codes for CLI operations
///
/// Exit codes provide machine-readable status for scripting and automation:
/// - 0: Success - operation completed successfully
/// - 1: General error - unspecified error occurred
/// - 2: Protocol error - the server answered with a MANY error or a bad message
/// - 3: Timeout - the request or the async wait timed out
/// - 4: Connection failed - could not reach the server
/// - 5: Invalid input - bad arguments, keys or configuration
/// - 130: Interrupted - cancelled by the user
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    Success = 0,
    GeneralError = 1,
    ProtocolError = 2,
    Timeout = 3,
    ConnectionFailed = 4,
    InvalidInput = 5,
    Interrupted = 130,
}

impl From<ExitCode> for i32 {
    fn from(code: ExitCode) -> Self {
        code as i32
    }
}

impl ExitCode {
    /// Convert to process exit code
    pub fn to_exit_code(self) -> std::process::ExitCode {
        std::process::ExitCode::from(self as u8)
    }

    pub fn name(&self) -> &'static str {
        match self {
            ExitCode::Success => "SUCCESS",
            ExitCode::GeneralError => "GENERAL_ERROR",
            ExitCode::ProtocolError => "PROTOCOL_ERROR",
            ExitCode::Timeout => "TIMEOUT",
            ExitCode::ConnectionFailed => "CONNECTION_FAILED",
            ExitCode::InvalidInput => "INVALID_INPUT",
            ExitCode::Interrupted => "INTERRUPTED",
        }
    }

    /// Get a human-readable description of the exit code
    pub fn description(&self) -> &'static str {
        match self {
            ExitCode::Success => "Operation completed successfully",
            ExitCode::GeneralError => "An unspecified error occurred",
            ExitCode::ProtocolError => "The server returned an error or an invalid message",
            ExitCode::Timeout => "Operation timed out",
            ExitCode::ConnectionFailed => "Could not reach the server",
            ExitCode::InvalidInput => "Invalid arguments or data provided",
            ExitCode::Interrupted => "Cancelled by the user",
        }
    }

    /// Classify a failed command.
    pub fn from_error(error: &anyhow::Error) -> Self {
        if let Some(e) = error.downcast_ref::<ClientError>() {
            return Self::from_client_error(e);
        }
        if error.downcast_ref::<IdentityError>().is_some()
            || error.downcast_ref::<ConfigError>().is_some()
            || error.downcast_ref::<identity::KeyFileError>().is_some()
            || error.downcast_ref::<hex::FromHexError>().is_some()
            || error.downcast_ref::<many_identity::cbor::DecodeError>().is_some()
        {
            return ExitCode::InvalidInput;
        }
        ExitCode::GeneralError
    }

    fn from_client_error(error: &ClientError) -> Self {
        match error {
            ClientError::Transport(TransportError::Timeout) | ClientError::PollDeadlineExceeded(_) => {
                ExitCode::Timeout
            }
            ClientError::Transport(TransportError::Http(_) | TransportError::Io(_)) => {
                ExitCode::ConnectionFailed
            }
            ClientError::Transport(TransportError::Other(_)) => ExitCode::GeneralError,
            ClientError::Cancelled => ExitCode::Interrupted,
            ClientError::Message(MessageError::Identity(_)) | ClientError::Module(_) => ExitCode::InvalidInput,
            _ => ExitCode::ProtocolError,
        }
    }
}

#[cfg(test)]
mod exit_code_tests {
    use super::*;
    use std::time::Duration;

    use many_message::ManyError;

    #[test]
    fn test_exit_code_values() {
        assert_eq!(ExitCode::Success as i32, 0);
        assert_eq!(ExitCode::GeneralError as i32, 1);
        assert_eq!(ExitCode::ProtocolError as i32, 2);
        assert_eq!(ExitCode::Timeout as i32, 3);
        assert_eq!(ExitCode::ConnectionFailed as i32, 4);
        assert_eq!(ExitCode::InvalidInput as i32, 5);
        assert_eq!(i32::from(ExitCode::Interrupted), 130);
    }

    #[test]
    fn test_exit_code_names() {
        assert_eq!(ExitCode::Success.name(), "SUCCESS");
        assert_eq!(ExitCode::ProtocolError.name(), "PROTOCOL_ERROR");
        assert_eq!(ExitCode::Interrupted.name(), "INTERRUPTED");
        assert!(!ExitCode::Timeout.description().is_empty());
    }

    #[test]
    fn test_exit_code_from_client_errors() {
        let cases = [
            (ClientError::Transport(TransportError::Timeout), ExitCode::Timeout),
            (ClientError::PollDeadlineExceeded(Duration::from_secs(1)), ExitCode::Timeout),
            (ClientError::Transport(TransportError::Http("refused".into())), ExitCode::ConnectionFailed),
            (ClientError::Protocol(ManyError::new(1, "nope")), ExitCode::ProtocolError),
            (ClientError::TokenExpired, ExitCode::ProtocolError),
            (ClientError::Cancelled, ExitCode::Interrupted),
        ];
        for (error, expected) in cases {
            assert_eq!(ExitCode::from_error(&anyhow::Error::new(error)), expected);
        }
    }

    #[test]
    fn test_exit_code_from_input_errors() {
        let err = anyhow::Error::new(IdentityError::InvalidMnemonic);
        assert_eq!(ExitCode::from_error(&err), ExitCode::InvalidInput);

        let err = anyhow::Error::new(ConfigError::ValidationError("bad".into()));
        assert_eq!(ExitCode::from_error(&err), ExitCode::InvalidInput);

        assert_eq!(ExitCode::from_error(&anyhow::anyhow!("other")), ExitCode::GeneralError);
    }
}
