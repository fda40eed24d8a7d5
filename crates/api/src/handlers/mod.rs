pub mod access;
pub mod account;
pub mod admin;
pub mod analytics;
pub mod content;
pub mod files;
pub mod withdrawals;

pub use content::metrics_handler;

use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use diskwala_domain::services::{CredentialError, MailError};
use diskwala_domain::storage::StorageError;
use diskwala_domain::withdrawal::LedgerError;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    Unauthorized(&'static str),
    #[error("{0}")]
    Forbidden(&'static str),
    #[error("{0}")]
    NotFound(&'static str),
    #[error("{0}")]
    Conflict(String),
    #[error("too many failed attempts, try again later")]
    TooManyAttempts,
    #[error("storage failure: {0}")]
    Storage(#[from] StorageError),
    #[error("internal failure: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }
}

impl From<LedgerError> for ApiError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::NotFound => ApiError::NotFound("withdrawal not found"),
            LedgerError::UnknownUser => ApiError::NotFound("user not found"),
            LedgerError::AlreadyProcessed { .. } => ApiError::Conflict(err.to_string()),
            LedgerError::Storage(inner) => ApiError::Storage(inner),
            other => ApiError::Validation(other.to_string()),
        }
    }
}

impl From<CredentialError> for ApiError {
    fn from(err: CredentialError) -> Self {
        ApiError::Internal(err.to_string())
    }
}

impl From<MailError> for ApiError {
    fn from(err: MailError) -> Self {
        ApiError::Internal(err.to_string())
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) | ApiError::Storage(StorageError::Conflict(_)) => {
                StatusCode::CONFLICT
            }
            ApiError::TooManyAttempts => StatusCode::TOO_MANY_REQUESTS,
            ApiError::Storage(StorageError::Database(_)) | ApiError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn error_response(&self) -> HttpResponse {
        let message = if self.status_code().is_server_error() {
            error!(error = %self, "request failed");
            "internal server error".to_string()
        } else {
            self.to_string()
        };
        HttpResponse::build(self.status_code()).json(ErrorBody { error: message })
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

/// Plain acknowledgement body used by mutating endpoints.
#[derive(Debug, Serialize, Deserialize)]
pub struct MessageBody {
    pub message: String,
}

impl MessageBody {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}
