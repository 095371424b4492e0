use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;
use tracing::{error, warn};

use crate::gateway::{GatewayError, WebhookError};
use crate::utils::response::error as error_response;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Authentication error: {0}")]
    AuthError(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Insufficient stock: requested {requested}, available {available}")]
    InsufficientStock { requested: i32, available: i32 },

    #[error("Invalid webhook signature: {0}")]
    SignatureInvalid(String),

    #[error("Malformed webhook payload: {0}")]
    MalformedPayload(String),

    #[error("Payment gateway error: {0}")]
    Gateway(#[from] GatewayError),

    #[error("Database error")]
    DatabaseError(#[from] sqlx::Error),

    #[error("Internal server error")]
    InternalServerError(String),
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::ValidationError(_) => StatusCode::BAD_REQUEST,
            AppError::AuthError(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::InsufficientStock { .. } => StatusCode::CONFLICT,
            AppError::SignatureInvalid(_) => StatusCode::BAD_REQUEST,
            AppError::MalformedPayload(_) => StatusCode::BAD_REQUEST,
            AppError::Gateway(GatewayError::Timeout) => StatusCode::GATEWAY_TIMEOUT,
            AppError::Gateway(_) => StatusCode::BAD_GATEWAY,
            AppError::DatabaseError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::InternalServerError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            AppError::ValidationError(_) => "VALIDATION_ERROR",
            AppError::AuthError(_) => "AUTH_ERROR",
            AppError::Forbidden(_) => "FORBIDDEN",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::InsufficientStock { .. } => "INSUFFICIENT_STOCK",
            AppError::SignatureInvalid(_) => "SIGNATURE_INVALID",
            AppError::MalformedPayload(_) => "MALFORMED_PAYLOAD",
            AppError::Gateway(_) => "GATEWAY_ERROR",
            AppError::DatabaseError(_) => "DATABASE_ERROR",
            AppError::InternalServerError(_) => "INTERNAL_SERVER_ERROR",
        }
    }

    fn log(&self) {
        if self.status_code().is_server_error() {
            match self {
                AppError::DatabaseError(e) => error!(error = ?e, "Database error"),
                AppError::Gateway(e) => error!(error = %e, "Payment gateway error"),
                other => error!(error = ?other, "Application error"),
            }
        } else {
            warn!(code = self.code(), error = %self, "Request rejected");
        }
    }

    fn public_message(&self) -> String {
        match self {
            AppError::ValidationError(msg)
            | AppError::AuthError(msg)
            | AppError::Forbidden(msg)
            | AppError::NotFound(msg)
            | AppError::SignatureInvalid(msg)
            | AppError::MalformedPayload(msg) => msg.clone(),
            AppError::InsufficientStock { .. } => "Not enough tickets available".to_string(),
            AppError::Gateway(GatewayError::Timeout) => {
                "The payment provider did not respond in time, please retry".to_string()
            }
            AppError::Gateway(_) => "The payment provider rejected the request".to_string(),
            AppError::DatabaseError(_) => "A database error occurred".to_string(),
            AppError::InternalServerError(_) => "An internal error occurred".to_string(),
        }
    }
}

impl From<WebhookError> for AppError {
    fn from(err: WebhookError) -> Self {
        match err {
            WebhookError::SignatureInvalid(msg) => AppError::SignatureInvalid(msg),
            WebhookError::MalformedPayload(msg) => AppError::MalformedPayload(msg),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.code();

        self.log();

        // Stock numbers are safe to show; everything else stays server-side.
        let details = match &self {
            AppError::InsufficientStock {
                requested,
                available,
            } => Some(json!({ "requested": requested, "available": available })),
            _ => None,
        };

        error_response(code, self.public_message(), details, status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes_follow_error_taxonomy() {
        assert_eq!(
            AppError::ValidationError("x".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::Forbidden("x".into()).status_code(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            AppError::InsufficientStock {
                requested: 2,
                available: 1
            }
            .status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            AppError::SignatureInvalid("x".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::MalformedPayload("x".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::from(GatewayError::Timeout).status_code(),
            StatusCode::GATEWAY_TIMEOUT
        );
    }

    #[test]
    fn test_webhook_errors_convert_to_client_errors() {
        let err: AppError = WebhookError::SignatureInvalid("bad".into()).into();
        assert_eq!(err.code(), "SIGNATURE_INVALID");
        let err: AppError = WebhookError::MalformedPayload("bad".into()).into();
        assert_eq!(err.code(), "MALFORMED_PAYLOAD");
    }

    #[tokio::test]
    async fn test_insufficient_stock_response_exposes_counts() {
        let response = AppError::InsufficientStock {
            requested: 3,
            available: 1,
        }
        .into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["success"], false);
        assert_eq!(body["error"]["code"], "INSUFFICIENT_STOCK");
        assert_eq!(body["error"]["details"]["available"], 1);
    }
}
