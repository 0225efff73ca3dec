use serde::Serialize;
use thiserror::Error;

use prescripto_common::error::AppError;

/// Errors surfaced to the caller of the dispatcher.
#[derive(Debug, Error)]
pub enum NotifierError {
    /// Missing required fields or missing transport credentials.
    /// Raised before any network I/O.
    #[error("Validation error: {0}")]
    Validation(String),

    /// The SMTP transport could not be constructed from configuration.
    #[error("Transport error: {0}")]
    Transport(String),

    /// `dispatch` was called with no tokio runtime to run delivery on.
    #[error("Runtime error: {0}")]
    Runtime(String),
}

impl From<NotifierError> for AppError {
    fn from(err: NotifierError) -> Self {
        match err {
            NotifierError::Validation(msg) => AppError::Validation(msg),
            NotifierError::Transport(msg) | NotifierError::Runtime(msg) => AppError::Config(msg),
        }
    }
}

/// Diagnostic classification of a failed delivery attempt.
///
/// Classification never changes retry eligibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Authentication,
    Connection,
    Timeout,
    Unclassified,
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureKind::Authentication => write!(f, "authentication"),
            FailureKind::Connection => write!(f, "connection"),
            FailureKind::Timeout => write!(f, "timeout"),
            FailureKind::Unclassified => write!(f, "unclassified"),
        }
    }
}

/// A single delivery attempt failure. Internal to the retry loop.
#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Timed out: {0}")]
    Timeout(String),

    #[error("Delivery failed: {0}")]
    Unclassified(String),

    /// The message itself could not be built; retrying cannot help.
    #[error("Invalid message: {0}")]
    Message(String),
}

impl DeliveryError {
    pub fn kind(&self) -> FailureKind {
        match self {
            DeliveryError::Authentication(_) => FailureKind::Authentication,
            DeliveryError::Connection(_) => FailureKind::Connection,
            DeliveryError::Timeout(_) => FailureKind::Timeout,
            DeliveryError::Unclassified(_) | DeliveryError::Message(_) => {
                FailureKind::Unclassified
            }
        }
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self, DeliveryError::Message(_))
    }

    /// Operator hint logged alongside a classified failure.
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            DeliveryError::Authentication(_) => {
                Some("Check EMAIL_ADDRESS and that EMAIL_PASSWORD is an app password")
            }
            DeliveryError::Connection(_) => Some("Check network connectivity to the SMTP host"),
            DeliveryError::Timeout(_) => Some("SMTP host did not respond in time"),
            _ => None,
        }
    }
}
