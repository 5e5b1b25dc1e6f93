//! Shared types, configuration, and error definitions for the availability
//! gateway.

pub mod config;
pub mod error;
pub mod types;

pub use config::{GatewayConfig, DEFAULT_BATCH_SIZE};
pub use error::Error;
pub use types::*;

/// Convenience result alias used across the gateway crates.
pub type Result<T> = std::result::Result<T, Error>;
