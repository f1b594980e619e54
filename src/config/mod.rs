//! Configuration Module
//!
//! Handles gateway configuration loading and validation.

pub mod gateway;
pub mod loader;

pub use gateway::{GatewayConfig, RetryConfig, DEFAULT_RATE_LIMIT, DEFAULT_SESSION};
pub use loader::{BridgeConfig, ConfigLoader};
