//! Core infrastructure: configuration, logging, shared state

pub mod config;
pub mod logger;
pub mod state;

pub use config::Config;
pub use state::AppState;
