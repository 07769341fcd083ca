//! Unified error handling
//!
//! Provides a stable numeric error code taxonomy (`ErrorCode`), the
//! application error type (`AppError`), the standard API envelope
//! (`ApiResponse`) and the service-layer bridge (`ServiceError`).
//!
//! # Usage
//!
//! ```rust,ignore
//! use toko_server::error::{AppError, AppResult, ErrorCode};
//!
//! fn find_order(id: &str) -> AppResult<Order> {
//!     lookup(id).ok_or_else(|| AppError::new(ErrorCode::OrderNotFound))
//! }
//! ```

mod codes;
mod service;
mod types;

pub use codes::{ErrorCategory, ErrorCode, InvalidErrorCode};
pub use service::{ServiceError, ServiceResult};
pub use types::{ApiResponse, AppError, AppResult};
