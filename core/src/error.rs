//! Error types for the Joplin API client.
//!
//! # Design
//! HTTP status codes are deliberately absent: the dispatcher hands the raw
//! response back and leaves status interpretation to the caller. Errors here
//! cover what happens *around* the call: rejected arguments before any I/O,
//! a failed ping, transport or process failures, and CLI steps that exited
//! non-zero.

use std::path::PathBuf;

use crate::cli::{CliOutput, SagaStep};

pub type Result<T> = std::result::Result<T, ApiError>;

/// Boxed source error from a `Transport` implementation.
pub type TransportError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Unsupported verb, unknown path, or malformed configuration value.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The factory was asked for a dispatcher kind it does not know.
    #[error("unknown dispatcher kind: {0}")]
    UnknownKind(String),

    /// `ping` reached a server that is not the WebClipper service.
    #[error("WebClipper unavailable: {0}")]
    ServiceUnavailable(String),

    /// The HTTP round-trip itself failed (connect, timeout, I/O).
    #[error("transport error: {0}")]
    Transport(#[source] TransportError),

    /// A request body could not be assembled.
    #[error("failed to encode request body: {0}")]
    Encoding(#[source] TransportError),

    /// The dispatcher's cancellation token fired before the call was made.
    #[error("request cancelled")]
    Cancelled,

    /// The CLI binary could not be spawned.
    #[error("failed to run {}: {source}", .program.display())]
    Process {
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A step of a multi-command CLI operation exited non-zero.
    #[error("{step} failed with exit code {}: {}", .output.exit_code, .output.stderr.trim())]
    CommandFailed { step: SagaStep, output: CliOutput },

    /// CLI output did not contain what the operation needed to continue.
    #[error("unexpected CLI output: {0}")]
    UnexpectedOutput(String),

    #[error("serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("invalid url: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

impl ApiError {
    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    /// Exit code of the failing CLI step, if this error came from one.
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            ApiError::CommandFailed { output, .. } => Some(output.exit_code),
            _ => None,
        }
    }
}
