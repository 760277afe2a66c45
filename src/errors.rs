use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use sea_orm::error::DbErr;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::observability::current_request_id;

/// Wire-level error body.
///
/// `payment_id` is populated only on the duplicate-submission path so the
/// client can show the prior confirmation instead of charging again.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    /// Human-readable error description
    #[schema(example = "Cart is empty")]
    pub error: String,
    /// External payment reference of the already-completed checkout
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(example = "sq_pay_8f14e45f")]
    pub payment_id: Option<String>,
    /// Trace identifier correlating all log lines for this request
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trace_id: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] DbErr),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    /// A paid checkout session already exists for this cart. Carries the
    /// external payment reference so the duplicate submitter can be pointed
    /// at the original charge.
    #[error("Checkout already completed for this cart")]
    DuplicateCheckout { payment_id: String },

    #[error("Payment failed: {0}")]
    PaymentFailed(String),

    #[error("External service error: {0}")]
    ExternalServiceError(String),

    #[error("Internal error: {0}")]
    InternalError(String),
}

impl From<validator::ValidationErrors> for ServiceError {
    fn from(err: validator::ValidationErrors) -> Self {
        ServiceError::ValidationError(err.to_string())
    }
}

impl ServiceError {
    /// Returns the HTTP status code for this error.
    /// This is the single source of truth for error-to-status mapping.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::DatabaseError(_) | Self::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::ValidationError(_)
            | Self::InvalidOperation(_)
            | Self::ConfigurationError(_)
            | Self::DuplicateCheckout { .. }
            | Self::PaymentFailed(_) => StatusCode::BAD_REQUEST,
            Self::ExternalServiceError(_) => StatusCode::BAD_GATEWAY,
        }
    }

    /// Returns the error message suitable for HTTP responses.
    /// Internal errors return generic messages to avoid leaking details.
    pub fn response_message(&self) -> String {
        match self {
            Self::DatabaseError(_) => "Database error".to_string(),
            Self::InternalError(_) => "Internal server error".to_string(),
            _ => self.to_string(),
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let payment_id = match &self {
            Self::DuplicateCheckout { payment_id } => Some(payment_id.clone()),
            _ => None,
        };

        let body = ErrorBody {
            error: self.response_message(),
            payment_id,
            trace_id: current_request_id().map(|rid| rid.as_str().to_string()),
        };

        (status, Json(body)).into_response()
    }
}
