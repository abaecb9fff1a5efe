//! # Error Types
//!
//! Custom error types for the irrigation monitor using `thiserror`.

use thiserror::Error;

/// Main error type for the irrigation monitor
#[derive(Debug, Error)]
pub enum MonitorError {
    /// Serial port could not be opened
    #[error("Connection error: {0}")]
    Connection(String),

    /// A read was attempted without an open port
    #[error("Not connected to a serial device")]
    NotConnected,

    /// A received line was not valid UTF-8
    #[error("Decode error: {0}")]
    Decode(#[from] std::str::Utf8Error),

    /// A recognized label carried a value of the wrong type
    #[error("Unparsable value {value:?} for field '{label}'")]
    ParseField { label: &'static str, value: String },

    /// The receive buffer filled up without seeing a newline
    #[error("Line exceeded {0} bytes without a terminator")]
    LineTooLong(usize),

    /// Field pattern failed to compile
    #[error("Pattern error: {0}")]
    Pattern(#[from] regex::Error),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for the irrigation monitor
pub type Result<T> = std::result::Result<T, MonitorError>;
