//! Unified error codes for the storefront engine
//!
//! Error codes are organized by category:
//! - 0xxx: General errors
//! - 1xxx: Authentication errors
//! - 4xxx: Order errors
//! - 5xxx: Payment / gateway errors
//! - 6xxx: Product / stock errors
//! - 7xxx: Access token / content errors
//! - 9xxx: System errors

use http::StatusCode;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Unified error code enum
///
/// Codes are u16 values for efficient serialization and stable
/// client-side handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u16", try_from = "u16")]
#[repr(u16)]
pub enum ErrorCode {
    // ==================== 0xxx: General ====================
    /// Unknown error
    Unknown = 1,
    /// Validation failed
    ValidationFailed = 2,
    /// Resource not found
    NotFound = 3,
    /// Resource already exists
    AlreadyExists = 4,
    /// Invalid request
    InvalidRequest = 5,

    // ==================== 1xxx: Auth ====================
    /// Caller is not authenticated
    NotAuthenticated = 1001,
    /// Webhook signature verification failed
    SignatureInvalid = 1002,
    /// Permission denied
    PermissionDenied = 1003,

    // ==================== 4xxx: Order ====================
    /// Order not found
    OrderNotFound = 4001,
    /// Order has already been paid
    OrderAlreadyPaid = 4002,
    /// Order is not in the PENDING state
    OrderNotPending = 4003,
    /// Order has not been paid
    OrderNotPaid = 4004,
    /// Order has expired
    OrderExpired = 4005,

    // ==================== 5xxx: Payment ====================
    /// Payment gateway call failed
    GatewayFailure = 5001,
    /// Payment gateway is not configured
    GatewayNotConfigured = 5002,
    /// Provider record does not match the order
    PaymentMismatch = 5003,

    // ==================== 6xxx: Product ====================
    /// Product not found
    ProductNotFound = 6001,
    /// Product is not orderable
    ProductInactive = 6002,
    /// Product is sold out
    ProductSoldOut = 6003,
    /// Stock item not found
    StockItemNotFound = 6004,
    /// Stock item has already been sold
    StockItemSold = 6005,

    // ==================== 7xxx: Access ====================
    /// Access token is invalid
    TokenInvalid = 7001,
    /// Redemption attempted within the cooldown window
    RedeemCooldown = 7002,
    /// No content is resolvable for this order
    ContentUnavailable = 7003,
    /// Content decryption failed
    DecryptionFailed = 7004,

    // ==================== 9xxx: System ====================
    /// Internal server error
    InternalError = 9001,
    /// Database error
    DatabaseError = 9002,
    /// Outbound notification (email) failed
    NotificationFailure = 9003,
}

impl ErrorCode {
    /// Get the numeric code value
    #[inline]
    pub const fn code(&self) -> u16 {
        *self as u16
    }

    /// Get the developer-facing English message for this error code
    pub const fn message(&self) -> &'static str {
        match self {
            // General
            ErrorCode::Unknown => "An unknown error occurred",
            ErrorCode::ValidationFailed => "Validation failed",
            ErrorCode::NotFound => "Resource not found",
            ErrorCode::AlreadyExists => "Resource already exists",
            ErrorCode::InvalidRequest => "Invalid request",

            // Auth
            ErrorCode::NotAuthenticated => "Authentication required",
            ErrorCode::SignatureInvalid => "Signature verification failed",
            ErrorCode::PermissionDenied => "Permission denied",

            // Order
            ErrorCode::OrderNotFound => "Order not found",
            ErrorCode::OrderAlreadyPaid => "Order has already been paid",
            ErrorCode::OrderNotPending => "Order is no longer pending",
            ErrorCode::OrderNotPaid => "Order has not been paid",
            ErrorCode::OrderExpired => "Order has expired",

            // Payment
            ErrorCode::GatewayFailure => "Payment gateway request failed",
            ErrorCode::GatewayNotConfigured => "Payment gateway is not configured",
            ErrorCode::PaymentMismatch => "Payment record does not match the order",

            // Product
            ErrorCode::ProductNotFound => "Product not found",
            ErrorCode::ProductInactive => "Product is not available",
            ErrorCode::ProductSoldOut => "Product is sold out",
            ErrorCode::StockItemNotFound => "Stock item not found",
            ErrorCode::StockItemSold => "Stock item has already been sold",

            // Access
            ErrorCode::TokenInvalid => "Access token is invalid",
            ErrorCode::RedeemCooldown => "Please wait before trying again",
            ErrorCode::ContentUnavailable => "Content is unavailable",
            ErrorCode::DecryptionFailed => "Content is unavailable",

            // System
            ErrorCode::InternalError => "Internal server error",
            ErrorCode::DatabaseError => "Database error",
            ErrorCode::NotificationFailure => "Notification delivery failed",
        }
    }

    /// Get the category for this error code
    pub fn category(&self) -> ErrorCategory {
        ErrorCategory::from_code(self.code())
    }

    /// Get the appropriate HTTP status code for this error code
    pub fn http_status(&self) -> StatusCode {
        match self {
            // 404 Not Found
            Self::NotFound
            | Self::OrderNotFound
            | Self::ProductNotFound
            | Self::StockItemNotFound
            | Self::ContentUnavailable => StatusCode::NOT_FOUND,

            // 409 Conflict
            Self::AlreadyExists
            | Self::OrderAlreadyPaid
            | Self::OrderNotPending
            | Self::OrderNotPaid
            | Self::ProductSoldOut
            | Self::StockItemSold => StatusCode::CONFLICT,

            // 401 Unauthorized
            Self::NotAuthenticated | Self::SignatureInvalid | Self::TokenInvalid => {
                StatusCode::UNAUTHORIZED
            }

            // 403 Forbidden
            Self::PermissionDenied => StatusCode::FORBIDDEN,

            // 410 Gone
            Self::OrderExpired => StatusCode::GONE,

            // 429 Too Many Requests
            Self::RedeemCooldown => StatusCode::TOO_MANY_REQUESTS,

            // 502 / 503 for the gateway boundary
            Self::GatewayFailure => StatusCode::BAD_GATEWAY,
            Self::GatewayNotConfigured => StatusCode::SERVICE_UNAVAILABLE,

            // 500 Internal Server Error
            Self::InternalError
            | Self::DatabaseError
            | Self::DecryptionFailed
            | Self::NotificationFailure => StatusCode::INTERNAL_SERVER_ERROR,

            // 400 Bad Request (default for validation/business errors)
            _ => StatusCode::BAD_REQUEST,
        }
    }
}

impl From<ErrorCode> for u16 {
    #[inline]
    fn from(code: ErrorCode) -> Self {
        code.code()
    }
}

/// Error when converting from an invalid u16 to ErrorCode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidErrorCode(pub u16);

impl fmt::Display for InvalidErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid error code: {}", self.0)
    }
}

impl std::error::Error for InvalidErrorCode {}

impl TryFrom<u16> for ErrorCode {
    type Error = InvalidErrorCode;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        match value {
            // General
            1 => Ok(ErrorCode::Unknown),
            2 => Ok(ErrorCode::ValidationFailed),
            3 => Ok(ErrorCode::NotFound),
            4 => Ok(ErrorCode::AlreadyExists),
            5 => Ok(ErrorCode::InvalidRequest),

            // Auth
            1001 => Ok(ErrorCode::NotAuthenticated),
            1002 => Ok(ErrorCode::SignatureInvalid),
            1003 => Ok(ErrorCode::PermissionDenied),

            // Order
            4001 => Ok(ErrorCode::OrderNotFound),
            4002 => Ok(ErrorCode::OrderAlreadyPaid),
            4003 => Ok(ErrorCode::OrderNotPending),
            4004 => Ok(ErrorCode::OrderNotPaid),
            4005 => Ok(ErrorCode::OrderExpired),

            // Payment
            5001 => Ok(ErrorCode::GatewayFailure),
            5002 => Ok(ErrorCode::GatewayNotConfigured),
            5003 => Ok(ErrorCode::PaymentMismatch),

            // Product
            6001 => Ok(ErrorCode::ProductNotFound),
            6002 => Ok(ErrorCode::ProductInactive),
            6003 => Ok(ErrorCode::ProductSoldOut),
            6004 => Ok(ErrorCode::StockItemNotFound),
            6005 => Ok(ErrorCode::StockItemSold),

            // Access
            7001 => Ok(ErrorCode::TokenInvalid),
            7002 => Ok(ErrorCode::RedeemCooldown),
            7003 => Ok(ErrorCode::ContentUnavailable),
            7004 => Ok(ErrorCode::DecryptionFailed),

            // System
            9001 => Ok(ErrorCode::InternalError),
            9002 => Ok(ErrorCode::DatabaseError),
            9003 => Ok(ErrorCode::NotificationFailure),

            _ => Err(InvalidErrorCode(value)),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Error category classification based on error code ranges
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// General errors (0xxx)
    General,
    /// Authentication errors (1xxx)
    Auth,
    /// Order errors (4xxx)
    Order,
    /// Payment errors (5xxx)
    Payment,
    /// Product errors (6xxx)
    Product,
    /// Access token / content errors (7xxx)
    Access,
    /// System errors (9xxx)
    System,
}

impl ErrorCategory {
    /// Determine category from error code value
    pub fn from_code(code: u16) -> Self {
        match code {
            0..1000 => Self::General,
            1000..2000 => Self::Auth,
            4000..5000 => Self::Order,
            5000..6000 => Self::Payment,
            6000..7000 => Self::Product,
            7000..8000 => Self::Access,
            _ => Self::System,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::General => "general",
            Self::Auth => "auth",
            Self::Order => "order",
            Self::Payment => "payment",
            Self::Product => "product",
            Self::Access => "access",
            Self::System => "system",
        }
    }
}
