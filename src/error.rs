//! Error types for FairPlay Core
//!
//! This module defines error types using thiserror for ergonomic error handling.
//! There are two layers:
//!
//! - [`KeyRequestError`] is the terminal outcome taxonomy of a key request
//!   session. It is `Clone` because a single outcome is fanned out to every
//!   caller that joined the session.
//! - [`FairPlayError`] is the crate-wide error for everything around the
//!   session: configuration, storage, HTTP client construction, I/O.
//!
//! ## Session taxonomy
//!
//! | Variant                      | Raised by                                  |
//! |------------------------------|--------------------------------------------|
//! | `NoIdentifier`               | locator had no host / identifier was empty |
//! | `CertificateUnavailable`     | certificate source failed or was empty     |
//! | `ChallengeGenerationFailed`  | secure challenge provider (SPC)            |
//! | `Transport`                  | license server exchange                    |
//! | `CannotDecodeResponse`       | CKC body was not valid Base64              |
//! | `KeyResolutionFailed`        | secure challenge provider (CKC unwrap)     |
//! | `Cancelled`                  | router cancelled the session               |
//!
//! None of these are retried inside a session. Retrying means starting a new
//! session.

use serde::Serialize;
use thiserror::Error;

/// Result type alias using our FairPlayError type
pub type Result<T> = std::result::Result<T, FairPlayError>;

/// Outcome type of a key request session
pub type KeyRequestResult<T> = std::result::Result<T, KeyRequestError>;

/// Failure of the license server exchange
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TransportError {
    /// The exchange did not complete in time
    #[error("license server request timed out")]
    Timeout,

    /// Connection failed or the server returned no body
    #[error("license server unreachable or returned no data")]
    NetworkUnavailable,

    /// Server answered with a non-success status
    #[error("license server rejected the request with status {status}")]
    ServerRejected { status: u16 },
}

impl TransportError {
    /// Whether a fresh attempt could plausibly succeed
    ///
    /// 4xx rejections are final: the server understood the SPC and refused it.
    pub fn is_transient(&self) -> bool {
        match self {
            TransportError::Timeout | TransportError::NetworkUnavailable => true,
            TransportError::ServerRejected { status } => (500..=599).contains(status),
        }
    }
}

/// Terminal failure of a key request session
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum KeyRequestError {
    /// No content identifier could be read from the request
    #[error("no content identifier in key request")]
    NoIdentifier,

    /// The application certificate could not be obtained
    #[error("application certificate unavailable: {0}")]
    CertificateUnavailable(String),

    /// The secure challenge provider could not produce an SPC
    #[error("challenge generation failed: {0}")]
    ChallengeGenerationFailed(String),

    /// The license server exchange failed
    #[error("license exchange failed: {0}")]
    Transport(#[from] TransportError),

    /// The license server answered with something that is not Base64
    #[error("cannot decode license response: {0}")]
    CannotDecodeResponse(String),

    /// The secure challenge provider rejected the CKC
    #[error("key resolution failed: {0}")]
    KeyResolutionFailed(String),

    /// The session was cancelled before it completed
    #[error("key request cancelled")]
    Cancelled,
}

impl KeyRequestError {
    /// Short stable code for logs and status payloads
    pub fn code(&self) -> &'static str {
        match self {
            KeyRequestError::NoIdentifier => "no_identifier",
            KeyRequestError::CertificateUnavailable(_) => "certificate_unavailable",
            KeyRequestError::ChallengeGenerationFailed(_) => "challenge_generation_failed",
            KeyRequestError::Transport(TransportError::Timeout) => "transport_timeout",
            KeyRequestError::Transport(TransportError::NetworkUnavailable) => {
                "transport_network_unavailable"
            }
            KeyRequestError::Transport(TransportError::ServerRejected { .. }) => {
                "transport_server_rejected"
            }
            KeyRequestError::CannotDecodeResponse(_) => "cannot_decode_response",
            KeyRequestError::KeyResolutionFailed(_) => "key_resolution_failed",
            KeyRequestError::Cancelled => "cancelled",
        }
    }

    /// Whether starting a new session for the same identifier could succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            KeyRequestError::Transport(e) => e.is_transient(),
            KeyRequestError::CertificateUnavailable(_) => true,
            _ => false,
        }
    }
}

/// Main error type for FairPlay Core
#[derive(Error, Debug)]
pub enum FairPlayError {
    // ===== Session Errors =====
    /// A key request session ended in failure
    #[error(transparent)]
    KeyRequest(#[from] KeyRequestError),

    // ===== Configuration Errors =====
    /// Configuration is invalid or incomplete
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Required field is missing
    #[error("Missing required field: {0}")]
    MissingRequiredField(String),

    /// Generic input validation error
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    // ===== Network Errors =====
    /// Network connectivity error outside a session (certificate download, client setup)
    #[error("Network error: {message}")]
    NetworkError {
        message: String,
        /// Whether this error might be transient
        is_transient: bool,
    },

    /// Server returned unexpected status code
    #[error("Server responded with unexpected status code: {status_code}")]
    UnexpectedStatusCode { status_code: u16, url: String },

    // ===== Storage Errors =====
    /// Database schema migration failed
    #[error("Database migration failed: {0}")]
    MigrationFailed(String),

    /// File I/O error with path context
    #[error("File I/O error: {0}")]
    FileIoError(String),

    // ===== General Errors =====
    /// Internal error that should not normally occur
    #[error("Internal error: {0}")]
    InternalError(String),

    // ===== External Library Errors =====
    /// HTTP client error from reqwest
    #[error("HTTP client error: {0}")]
    ReqwestError(#[from] reqwest::Error),

    /// JSON serialization/deserialization error
    #[error("JSON serialization error: {0}")]
    SerdeJsonError(#[from] serde_json::Error),

    /// Database driver error from sqlx
    #[error("Database error: {0}")]
    SqlxError(#[from] sqlx::Error),

    /// Standard I/O error
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

impl From<TransportError> for FairPlayError {
    fn from(err: TransportError) -> Self {
        FairPlayError::KeyRequest(KeyRequestError::Transport(err))
    }
}

impl From<url::ParseError> for FairPlayError {
    fn from(err: url::ParseError) -> Self {
        FairPlayError::InvalidConfiguration(format!("Invalid URL: {}", err))
    }
}

// Helper methods for creating common errors
impl FairPlayError {
    /// Create an InvalidConfiguration error with a message
    pub fn invalid_config<S: Into<String>>(message: S) -> Self {
        FairPlayError::InvalidConfiguration(message.into())
    }

    /// Create an InvalidInput error with a message
    pub fn invalid_input<S: Into<String>>(message: S) -> Self {
        FairPlayError::InvalidInput(message.into())
    }

    /// Create an InternalError with a message
    pub fn internal<S: Into<String>>(message: S) -> Self {
        FairPlayError::InternalError(message.into())
    }

    /// Create a NetworkError
    pub fn network_error<S: Into<String>>(message: S, is_transient: bool) -> Self {
        FairPlayError::NetworkError {
            message: message.into(),
            is_transient,
        }
    }

    /// Check if error is retryable (network errors, transient transport failures)
    pub fn is_retryable(&self) -> bool {
        match self {
            FairPlayError::KeyRequest(e) => e.is_retryable(),
            FairPlayError::NetworkError { is_transient, .. } => *is_transient,
            FairPlayError::UnexpectedStatusCode { status_code, .. } => {
                (500..=599).contains(status_code)
            }
            _ => false,
        }
    }

    /// Check if error needs a configuration fix rather than a retry
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            FairPlayError::InvalidConfiguration(_) | FairPlayError::MissingRequiredField(_)
        )
    }

    /// The session outcome, if this error wraps one
    pub fn as_key_request_error(&self) -> Option<&KeyRequestError> {
        match self {
            FairPlayError::KeyRequest(e) => Some(e),
            _ => None,
        }
    }
}
