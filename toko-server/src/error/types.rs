//! Application error type and API response envelope

use super::codes::{ErrorCategory, ErrorCode};
use axum::Json;
use axum::response::{IntoResponse, Response};
use http::StatusCode;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Application error carrying a stable code plus optional detail
///
/// The detail string is for operators and API clients; the canonical
/// message always comes from the code itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppError {
    /// The error code
    pub code: ErrorCode,
    /// Optional additional context
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl AppError {
    /// Create a new error from a code
    pub fn new(code: ErrorCode) -> Self {
        Self { code, detail: None }
    }

    /// Create a new error with additional detail
    pub fn with_detail(code: ErrorCode, detail: impl Into<String>) -> Self {
        Self {
            code,
            detail: Some(detail.into()),
        }
    }

    /// Get the numeric error code
    #[inline]
    pub fn code(&self) -> u16 {
        self.code.code()
    }

    /// Get the canonical message for this error
    #[inline]
    pub fn message(&self) -> &'static str {
        self.code.message()
    }

    /// Get the error category
    #[inline]
    pub fn category(&self) -> ErrorCategory {
        self.code.category()
    }

    /// Get the HTTP status code for this error
    #[inline]
    pub fn http_status(&self) -> StatusCode {
        self.code.http_status()
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.detail {
            Some(detail) => write!(f, "[{}] {}: {}", self.code(), self.message(), detail),
            None => write!(f, "[{}] {}", self.code(), self.message()),
        }
    }
}

impl std::error::Error for AppError {}

impl From<ErrorCode> for AppError {
    fn from(code: ErrorCode) -> Self {
        Self::new(code)
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        Self::with_detail(ErrorCode::ValidationFailed, errors.to_string())
    }
}

/// Convenience result alias for handler and service code
pub type AppResult<T> = Result<T, AppError>;

/// Standard API response envelope
///
/// Every JSON endpoint returns this shape. `data` is present on
/// success, `error` on failure, never both.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    /// Whether the request succeeded
    pub success: bool,
    /// The response payload on success
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    /// The error on failure
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<AppError>,
}

impl<T> ApiResponse<T> {
    /// Build a success response
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    /// Build an error response
    pub fn error(error: impl Into<AppError>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.into()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // System-category faults are logged server-side; their detail
        // never reaches the client.
        let body = if self.category() == ErrorCategory::System {
            tracing::error!(code = self.code(), detail = ?self.detail, "internal error");
            ApiResponse::<()>::error(AppError::new(self.code))
        } else {
            ApiResponse::<()>::error(self.clone())
        };
        (self.http_status(), Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = AppError::new(ErrorCode::OrderNotFound);
        assert_eq!(err.to_string(), "[4001] Order not found");

        let err = AppError::with_detail(ErrorCode::GatewayFailure, "connect timeout");
        assert_eq!(
            err.to_string(),
            "[5001] Payment gateway request failed: connect timeout"
        );
    }

    #[test]
    fn test_response_serialization() {
        let ok = ApiResponse::success(serde_json::json!({"id": "abc"}));
        let json = serde_json::to_value(&ok).unwrap();
        assert_eq!(json["success"], true);
        assert_eq!(json["data"]["id"], "abc");
        assert!(json.get("error").is_none());

        let err = ApiResponse::<()>::error(AppError::new(ErrorCode::TokenInvalid));
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["success"], false);
        assert_eq!(json["error"]["code"], 7001);
        assert!(json.get("data").is_none());
    }

    #[test]
    fn test_error_code_round_trips_through_json() {
        let err = AppError::with_detail(ErrorCode::RedeemCooldown, "retry later");
        let json = serde_json::to_string(&err).unwrap();
        let back: AppError = serde_json::from_str(&json).unwrap();
        assert_eq!(back, err);
    }

    #[test]
    fn test_validation_errors_convert() {
        use validator::Validate;

        #[derive(Validate)]
        struct Form {
            #[validate(email)]
            email: String,
        }

        let form = Form {
            email: "not-an-email".into(),
        };
        let err: AppError = form.validate().unwrap_err().into();
        assert_eq!(err.code, ErrorCode::ValidationFailed);
        assert!(err.detail.is_some());
    }
}
