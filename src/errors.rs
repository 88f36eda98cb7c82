use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

/// Standard error payload returned by the HTTP surface.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// HTTP status category (e.g. "Not Found", "Unprocessable Entity").
    pub error: String,
    /// Human-readable description; insufficient-stock failures carry a
    /// per-line breakdown for the warehouse operator.
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    /// ISO 8601 timestamp when the error occurred.
    pub timestamp: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] sea_orm::error::DbErr),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Invalid status: {0}")]
    InvalidStatus(String),

    /// Demand exceeds available stock. Always recoverable by the caller;
    /// the message aggregates one line per (product, location) shortage.
    #[error("Insufficient stock: {0}")]
    InsufficientStock(String),

    /// A serial was referenced twice in one commit, or already has live
    /// stock somewhere in internal locations.
    #[error("Duplicate serial: {0}")]
    DuplicateSerial(String),

    /// Reservation attempted on a picking with no lines.
    #[error("Empty document: {0}")]
    EmptyDocument(String),

    /// Ledger invariant breach (e.g. a quant would go negative after prior
    /// validation passed). Internal inconsistency, never a user error; the
    /// enclosing transaction rolls back.
    #[error("Integrity violation: {0}")]
    IntegrityViolation(String),

    #[error("Internal error: {0}")]
    InternalError(String),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

impl From<validator::ValidationErrors> for ServiceError {
    fn from(err: validator::ValidationErrors) -> Self {
        ServiceError::ValidationError(err.to_string())
    }
}

impl ServiceError {
    /// Single source of truth for error-to-status mapping.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::ValidationError(_) | Self::InvalidStatus(_) | Self::EmptyDocument(_) => {
                StatusCode::BAD_REQUEST
            }
            Self::InsufficientStock(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::DuplicateSerial(_) => StatusCode::CONFLICT,
            Self::DatabaseError(_)
            | Self::IntegrityViolation(_)
            | Self::InternalError(_)
            | Self::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message suitable for HTTP responses. Internal errors return generic
    /// text to avoid leaking implementation details.
    pub fn response_message(&self) -> String {
        match self {
            Self::DatabaseError(_) => "Database error".to_string(),
            Self::IntegrityViolation(_) | Self::InternalError(_) | Self::Other(_) => {
                "Internal server error".to_string()
            }
            _ => self.to_string(),
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let err = ErrorResponse {
            error: status.canonical_reason().unwrap_or("Error").to_string(),
            message: self.response_message(),
            details: None,
            timestamp: chrono::Utc::now().to_rfc3339(),
        };

        (status, Json(err)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping() {
        assert_eq!(
            ServiceError::InsufficientStock("x".into()).status_code(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            ServiceError::DuplicateSerial("x".into()).status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ServiceError::IntegrityViolation("x".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn internal_errors_are_not_leaked() {
        let err = ServiceError::IntegrityViolation("quant 42 went negative".into());
        assert_eq!(err.response_message(), "Internal server error");

        let err = ServiceError::InsufficientStock("detail".into());
        assert!(err.response_message().contains("detail"));
    }
}
