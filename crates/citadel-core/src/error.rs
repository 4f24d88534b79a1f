//! Error types for talking to citadel.
//!
//! Every failure the client can hit lands in one of two enums:
//!
//! - [`ApiError`] - anything that happened on the wire (transport, remote
//!   refusal, a malformed stream line)
//! - [`ConfigError`] - anything detected locally before a request is sent
//!
//! `ApiError::Config` carries a `ConfigError` found halfway through a
//! multi-request call, such as a log request for a node no pod knows.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// What went wrong below HTTP.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportErrorKind {
    /// The request or the response body ran past the configured timeout.
    Timeout,
    /// The server could not be reached at all.
    ConnectionRefused,
    /// Any other I/O or protocol failure (bad URL, reset mid-body, ...).
    Other,
}

impl fmt::Display for TransportErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportErrorKind::Timeout => write!(f, "timeout"),
            TransportErrorKind::ConnectionRefused => write!(f, "connection refused"),
            TransportErrorKind::Other => write!(f, "transport"),
        }
    }
}

/// Errors produced while issuing a request or consuming its response.
#[derive(Error, Debug)]
pub enum ApiError {
    /// Connection could not be established, timed out, or broke mid-stream.
    #[error("{message}")]
    Transport {
        kind: TransportErrorKind,
        message: String,
    },

    /// The server answered with an unexpected status code.
    ///
    /// `message` is the `error` field of the response body, verbatim.
    #[error("{message}")]
    Remote { code: u16, message: String },

    /// A stream line was not valid JSON. Events delivered before it stay valid.
    #[error("Bad line interrupts stream response: {}", String::from_utf8_lossy(.malformed_line))]
    Protocol {
        malformed_line: Vec<u8>,
        reason: String,
    },

    /// The request payload could not be encoded.
    #[error("Failed to encode request: {0}")]
    Encode(#[from] serde_json::Error),

    /// A lookup made on the way to a request found nothing to send.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl ApiError {
    /// Status code for remote errors, `None` for everything else.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            ApiError::Remote { code, .. } => Some(*code),
            _ => None,
        }
    }

    pub(crate) fn from_io(err: std::io::Error) -> Self {
        let kind = match err.kind() {
            std::io::ErrorKind::TimedOut | std::io::ErrorKind::WouldBlock => {
                TransportErrorKind::Timeout
            }
            std::io::ErrorKind::ConnectionRefused => TransportErrorKind::ConnectionRefused,
            _ => TransportErrorKind::Other,
        };
        let message = match kind {
            TransportErrorKind::Timeout => "Read timeout".to_string(),
            _ => format!("Stream read failed: {err}"),
        };
        ApiError::Transport { kind, message }
    }
}

/// Errors detected before anything is sent.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("repository is not set, check repository or pass argument")]
    MissingRepo,

    #[error("commit hash not found, check repository or pass argument")]
    MissingSha,

    #[error("No ids given")]
    NoIds,

    #[error("Node {0} not found in any pod")]
    UnknownNode(String),

    #[error("CITADEL_AUTH_TOKEN not found")]
    MissingAuthToken,

    #[error("Home directory not set")]
    NoHomeDir,

    #[error("Env var must be like key=value, got {0:?}")]
    InvalidEnvVar(String),

    #[error("Invalid fatal error pattern: {0}")]
    Pattern(#[from] regex::Error),

    #[error("Failed to access config {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid config {}: {source}", path.display())]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },
}
