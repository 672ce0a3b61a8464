use axum::http::StatusCode;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing configuration value {0}")]
    Missing(&'static str),
    #[error("invalid configuration value {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

/// Failure of a single outbound vendor call. Never retried by this crate.
#[derive(Debug, Clone, Error)]
pub enum VendorError {
    #[error("{}", network_message(*timed_out, message))]
    Network { timed_out: bool, message: String },
    #[error("vendor rejected request with HTTP {status}: {body}")]
    Rejection { status: u16, body: String },
    #[error("unreadable vendor response: {0}")]
    Decode(String),
}

fn network_message(timed_out: bool, message: &str) -> String {
    if timed_out {
        format!("vendor timeout: {}", message)
    } else {
        format!("vendor unreachable: {}", message)
    }
}

impl VendorError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            VendorError::Network { .. } => ErrorKind::NetworkError,
            VendorError::Rejection { .. } | VendorError::Decode(_) => ErrorKind::VendorRejection,
        }
    }

    pub fn http_status(&self) -> Option<u16> {
        match self {
            VendorError::Rejection { status, .. } => Some(*status),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    NetworkError,
    VendorRejection,
    ValidationError,
    ConfigurationError,
}

#[derive(Debug, Error)]
pub enum FlowError {
    #[error("{0}")]
    Validation(String),
    #[error("booking {0} not found")]
    NotFound(uuid::Uuid),
    #[error("booking does not belong to the current user")]
    Forbidden,
    #[error("booking is already paid")]
    AlreadyPaid,
    #[error("payment status cannot move from {from} to {to}")]
    InvalidTransition { from: String, to: String },
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("storage error: {0}")]
    Store(#[from] anyhow::Error),
}

impl FlowError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            FlowError::Validation(_) => StatusCode::BAD_REQUEST,
            FlowError::NotFound(_) => StatusCode::NOT_FOUND,
            FlowError::Forbidden => StatusCode::FORBIDDEN,
            FlowError::AlreadyPaid | FlowError::InvalidTransition { .. } => StatusCode::CONFLICT,
            FlowError::Configuration(_) | FlowError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            FlowError::Validation(_) => "VALIDATION_ERROR",
            FlowError::NotFound(_) => "BOOKING_NOT_FOUND",
            FlowError::Forbidden => "FORBIDDEN",
            FlowError::AlreadyPaid => "ALREADY_PAID",
            FlowError::InvalidTransition { .. } => "INVALID_STATUS_TRANSITION",
            FlowError::Configuration(_) => "CONFIGURATION_ERROR",
            FlowError::Store(_) => "INTERNAL_ERROR",
        }
    }
}

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("{0}")]
    Validation(String),
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error(transparent)]
    Vendor(#[from] VendorError),
    #[error("delivery log error: {0}")]
    Store(#[from] anyhow::Error),
}

impl DispatchError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            DispatchError::Validation(_) => ErrorKind::ValidationError,
            DispatchError::Configuration(_) | DispatchError::Store(_) => ErrorKind::ConfigurationError,
            DispatchError::Vendor(e) => e.kind(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorEnvelope {
    pub error: ErrorPayload,
}

#[derive(Debug, Serialize)]
pub struct ErrorPayload {
    pub code: String,
    pub message: String,
    pub details: Option<String>,
}

pub fn err(code: &str, message: &str) -> ErrorEnvelope {
    ErrorEnvelope {
        error: ErrorPayload {
            code: code.to_string(),
            message: message.to_string(),
            details: None,
        },
    }
}

impl From<&FlowError> for ErrorEnvelope {
    fn from(e: &FlowError) -> Self {
        err(e.code(), &e.to_string())
    }
}
