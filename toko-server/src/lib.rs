//! toko-server: digital goods storefront backend
//!
//! Order fulfillment and payment reconciliation for a small digital
//! goods store: customers create orders, pay through an Indonesian
//! payment provider (Midtrans, Tripay or Saweria), and receive their
//! encrypted goods through a tokenized access link once the payment
//! reconciles.
//!
//! # Module structure
//!
//! ```text
//! toko-server/src/
//! ├── core/       # configuration, logging, shared state
//! ├── api/        # HTTP routes and handlers
//! ├── db/         # SQLite pool, row models, repositories
//! ├── gateway/    # payment provider adapters
//! ├── reconcile/  # push/pull payment reconciliation
//! ├── inventory/  # stock allocation for paid orders
//! ├── access/     # token issue and content redemption
//! ├── email/      # order receipt delivery (SES)
//! ├── cache/      # listing cache
//! ├── crypto.rs   # content encryption (AES-256-GCM)
//! └── error/      # error codes, API envelope
//! ```

pub mod access;
pub mod api;
pub mod cache;
pub mod core;
pub mod crypto;
pub mod db;
pub mod email;
pub mod error;
pub mod gateway;
pub mod inventory;
pub mod reconcile;
pub mod util;

// Re-export common types
pub use crate::core::{AppState, Config};
pub use error::{ApiResponse, AppError, AppResult, ErrorCategory, ErrorCode};
pub use error::{ServiceError, ServiceResult};

// Re-export logger functions
pub use crate::core::logger::{init_logger, init_logger_with_file};
