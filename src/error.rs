//! Error types.
//!
//! The protocol path itself never fails outward: a malformed command is
//! dropped and logged. `CommandError` only carries the reason a line was
//! dropped from the parser to the dispatcher. `SimError` covers the host
//! surfaces around the instrument (configuration files, the serial port).

use std::path::PathBuf;
use thiserror::Error;

/// Reasons a received line is turned into a silent no-op.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    /// A numeric action had no text after its first space.
    #[error("command '{0}' is missing its numeric argument")]
    MissingArgument(String),
}

/// Convenience alias for results using the host error type.
pub type SimResult<T> = std::result::Result<T, SimError>;

#[derive(Debug, Error)]
pub enum SimError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),

    #[error("Failed to read config file {path}: {source}")]
    ConfigRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}
