//! Error taxonomy shared by every HTTP handler.
//!
//! Modelled on `storage_ballast_helper`'s `SbhError`: a flat `thiserror` enum
//! with stable string codes and a retryability predicate, plus a blanket
//! conversion from anything `Into<anyhow::Error>` so internal subsystem
//! errors surface as `500 INTERNAL_ERROR` without each call site writing a
//! `From` impl by hand.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use serde_json::Value;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{message}")]
    Validation {
        message: String,
        details: Option<Value>,
    },

    #[error("{message}")]
    NotFound { message: String },

    #[error("tuning is disabled")]
    TuningDisabled,

    #[error("{message}")]
    NotSafe { message: String },

    #[error("{message}")]
    ApproveFailed { message: String },

    #[error("{message}")]
    RejectFailed { message: String },

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn validation(message: impl Into<String>) -> Self {
        AppError::Validation {
            message: message.into(),
            details: None,
        }
    }

    pub fn validation_with(message: impl Into<String>, details: Value) -> Self {
        AppError::Validation {
            message: message.into(),
            details: Some(details),
        }
    }

    pub fn not_found(entity: impl Into<String>, id: impl std::fmt::Display) -> Self {
        AppError::NotFound {
            message: format!("{} not found: {}", entity.into(), id),
        }
    }

    pub fn not_safe(message: impl Into<String>) -> Self {
        AppError::NotSafe {
            message: message.into(),
        }
    }

    pub fn approve_failed(message: impl Into<String>) -> Self {
        AppError::ApproveFailed {
            message: message.into(),
        }
    }

    pub fn reject_failed(message: impl Into<String>) -> Self {
        AppError::RejectFailed {
            message: message.into(),
        }
    }

    /// Stable short code surfaced to API callers.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Validation { .. } => "VALIDATION_ERROR",
            AppError::NotFound { .. } => "NOT_FOUND",
            AppError::TuningDisabled => "TUNING_DISABLED",
            AppError::NotSafe { .. } => "NOT_SAFE",
            AppError::ApproveFailed { .. } => "APPROVE_FAILED",
            AppError::RejectFailed { .. } => "REJECT_FAILED",
            AppError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation { .. } => StatusCode::BAD_REQUEST,
            AppError::NotFound { .. } => StatusCode::NOT_FOUND,
            AppError::TuningDisabled => StatusCode::BAD_REQUEST,
            AppError::NotSafe { .. } => StatusCode::BAD_REQUEST,
            AppError::ApproveFailed { .. } => StatusCode::BAD_REQUEST,
            AppError::RejectFailed { .. } => StatusCode::BAD_REQUEST,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Retryable errors are ones where a caller resubmitting the same request
    /// might succeed without operator intervention (everything but the
    /// policy-shaped 400s).
    pub fn is_retryable(&self) -> bool {
        matches!(self, AppError::Internal(_))
    }

    fn details(&self) -> Option<Value> {
        match self {
            AppError::Validation { details, .. } => details.clone(),
            _ => None,
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    code: &'static str,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<Value>,
}

#[derive(Serialize)]
struct ErrorEnvelope {
    success: bool,
    error: ErrorBody,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if let AppError::Internal(ref e) = self {
            tracing::error!(error = %e, "internal error");
        }
        let body = ErrorEnvelope {
            success: false,
            error: ErrorBody {
                code: self.code(),
                message: self.to_string(),
                details: self.details(),
            },
        };
        (status, Json(body)).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;
