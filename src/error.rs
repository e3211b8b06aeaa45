//! # Error Types
//!
//! Custom error types for Vessel Relay using `thiserror`.

use thiserror::Error;

/// Main error type for Vessel Relay
#[derive(Debug, Error)]
pub enum RelayError {
    /// Sample cannot be represented in line protocol
    #[error("Encoding error: {0}")]
    Encoding(String),

    /// Sink or command link unreachable, or non-success response
    #[error("Transport error: {0}")]
    Transport(String),

    /// Invalid configuration value (fatal at startup)
    #[error("Configuration error: {0}")]
    Config(String),

    /// TOML parse errors
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Malformed inbound packet line
    #[error("Packet decode error: {0}")]
    Decode(#[from] serde_json::Error),

    /// Vehicle link could not be opened
    #[error("Serial link error: {0}")]
    Serial(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for Vessel Relay
pub type Result<T> = std::result::Result<T, RelayError>;
