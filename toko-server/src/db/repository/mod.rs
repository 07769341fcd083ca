//! Repository Module
//!
//! Module-level query functions over the SQLite pool. Callers map
//! `sqlx::Error` into the service-layer error at the boundary.

// Catalog
pub mod products;
pub mod stock;

// Orders
pub mod orders;

// Access
pub mod tokens;

// Audit
pub mod events;
