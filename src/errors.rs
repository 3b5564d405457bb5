use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid credentials: {0}")]
    InvalidCredentials(String),

    #[error("Quota exceeded: {0}")]
    QuotaExceeded(String),

    #[error("Session expired, please sign in again")]
    SessionExpired,

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Delivery failed: {0}")]
    DeliveryFailed(String),

    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Server rejected request ({status}): {message}")]
    ServerRejected { status: u16, message: String },

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

/// Coarse failure classes surfaced to callers and recorded in metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    ValidationFailed,
    InvalidCredentials,
    QuotaExceeded,
    SessionExpired,
    DeliveryFailed,
    TransportFailed,
    ServerRejected,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::ValidationFailed => "validation_failed",
            ErrorKind::InvalidCredentials => "invalid_credentials",
            ErrorKind::QuotaExceeded => "quota_exceeded",
            ErrorKind::SessionExpired => "session_expired",
            ErrorKind::DeliveryFailed => "delivery_failed",
            ErrorKind::TransportFailed => "transport_failed",
            ErrorKind::ServerRejected => "server_rejected",
        }
    }
}

impl AppError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AppError::Validation(_) | AppError::Forbidden(_) => ErrorKind::ValidationFailed,
            AppError::InvalidCredentials(_) => ErrorKind::InvalidCredentials,
            AppError::QuotaExceeded(_) => ErrorKind::QuotaExceeded,
            AppError::SessionExpired => ErrorKind::SessionExpired,
            AppError::DeliveryFailed(_) => ErrorKind::DeliveryFailed,
            AppError::ServerRejected { .. } => ErrorKind::ServerRejected,
            AppError::Transport(_)
            | AppError::Storage(_)
            | AppError::Serialization(_)
            | AppError::Io(_)
            | AppError::Internal(_) => ErrorKind::TransportFailed,
        }
    }

    /// True when the caller has to sign in again before retrying.
    pub fn requires_reauthentication(&self) -> bool {
        matches!(self, AppError::SessionExpired)
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
