//! Error types shared by every layer of the crate.
//!
//! `HvpsError` separates failures that happen before anything is written to
//! the wire (`InvalidValue`, `InvalidCommand`, `Unsupported`) from failures of
//! a round trip (`EmptyResponse`, `InvalidResponse`, `AddressMismatch`,
//! `Timeout`, `LinkClosed`). The first group never touches the link. None of
//! them are retried internally; a blind retry of a stateful set such as
//! "turn on" is left to the caller.
//!
//! Lower-level errors (`std::io`, `tokio-serial`, `figment`) convert with
//! `#[from]` so `?` works throughout.

use std::time::Duration;

use thiserror::Error;

use crate::protocol::Brand;

/// Convenience alias for results using the crate error type.
pub type Result<T> = std::result::Result<T, HvpsError>;

/// Every failure the crate can report.
#[derive(Error, Debug)]
pub enum HvpsError {
    /// A caller-supplied value, address or channel index was rejected.
    #[error("Invalid value: {0}")]
    InvalidValue(String),

    /// The command name is not part of the selected table.
    #[error("Invalid command '{command}'. Valid commands: {valid}")]
    InvalidCommand {
        /// Name that was looked up.
        command: String,
        /// Comma-separated names of the table.
        valid: String,
    },

    /// The device answered with zero bytes (or the stream reached EOF).
    #[error("Empty response from device")]
    EmptyResponse,

    /// The reply did not follow the grammar or the output contract.
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// The reply carried a different board address than the request.
    #[error("Address mismatch: expected board {expected:02}, reply from board {actual:02}")]
    AddressMismatch {
        /// Board the request was addressed to.
        expected: u8,
        /// Board found in the reply.
        actual: u8,
    },

    /// No complete reply line arrived within the deadline.
    #[error("Timed out after {0:?} waiting for the device")]
    Timeout(Duration),

    /// The link (or the worker owning it) is gone.
    #[error("Link closed")]
    LinkClosed,

    /// The typed accessor has no counterpart in this brand's vocabulary.
    #[error("{operation} is not supported by {brand} devices")]
    Unsupported {
        /// Brand of the device handle.
        brand: Brand,
        /// Accessor that was requested.
        operation: &'static str,
    },

    /// Reading or writing the underlying stream failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The serial port could not be opened or configured.
    #[cfg(feature = "tokio_serial")]
    #[error("Serial port error: {0}")]
    Serial(#[from] tokio_serial::Error),

    /// A configuration source could not be read or parsed.
    #[error("Configuration error: {0}")]
    Config(#[from] figment::Error),

    /// The configuration parsed but holds an unusable value.
    #[error("Configuration validation error: {0}")]
    Configuration(String),
}

impl HvpsError {
    /// True for errors raised before the request reached the wire.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            HvpsError::InvalidValue(_)
                | HvpsError::InvalidCommand { .. }
                | HvpsError::Unsupported { .. }
        )
    }
}
