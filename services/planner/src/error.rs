//! services/planner/src/error.rs
//!
//! Defines the primary error type for the planner service.

use crate::config::ConfigError;
use trip_planner_core::ports::PortError;

/// The primary error type for the `planner` service.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Represents an error that occurred during configuration loading.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Represents an error that propagated up from one of the core service ports.
    #[error("Service Port Error: {0}")]
    Port(#[from] PortError),

    /// Represents an error from the HTTP client library.
    #[error("HTTP Error: {0}")]
    Http(#[from] reqwest::Error),

    /// Input rejected before any service was called.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// A catch-all for any other unexpected errors.
    #[error("An unexpected internal error occurred: {0}")]
    Internal(String),
}
