//! Error types for frame construction and configuration parsing

use thiserror::Error;

/// Errors raised when a frame would violate classic CAN limits
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FrameError {
    /// Arbitration id does not fit the selected id kind
    #[error("arbitration id 0x{id:X} out of range (extended: {extended})")]
    IdOutOfRange { id: u32, extended: bool },

    /// Payload longer than 8 bytes
    #[error("invalid payload: {len} bytes (max 8)")]
    InvalidPayload { len: usize },
}

/// Errors raised while parsing the hexadecimal channel input fields
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum InputError {
    /// Arbitration id is not a hexadecimal number
    #[error("invalid arbitration id: {0:?}")]
    InvalidId(String),

    /// A payload byte field is neither `-` nor a hex value in 00..=FF
    #[error("invalid payload byte {index}: {value:?}")]
    InvalidByte { index: usize, value: String },

    /// Interval is not a non-negative integer number of seconds
    #[error("invalid interval: {0:?}")]
    InvalidInterval(String),

    /// More than 8 payload fields were supplied
    #[error("too many payload bytes: {0} (max 8)")]
    TooManyBytes(usize),

    /// Parsed values do not form a valid frame
    #[error(transparent)]
    Frame(#[from] FrameError),
}
