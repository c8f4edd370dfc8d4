//! Error types for the transmission scheduler

use std::time::Duration;

use can_frame::{FrameError, InputError};
use thiserror::Error;

use crate::config::ChannelId;

/// Errors returned by a [`BusSink`](crate::BusSink)
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SendError {
    /// The bus is closed or the receiving side went away
    #[error("bus closed")]
    Closed,

    /// Transport-level failure
    #[error("transport error: {0}")]
    Transport(String),

    /// The sink did not complete within the configured send timeout
    #[error("send timed out after {}ms", .0.as_millis())]
    Timeout(Duration),
}

/// Errors returned by the [`TransmitterRegistry`](crate::TransmitterRegistry)
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// The channel configuration failed validation
    #[error("invalid config: {0}")]
    InvalidConfig(String),

    /// Another request is still tearing down a transmitter
    #[error("channel {0}: a previous transmitter is still stopping")]
    AlreadyStopping(ChannelId),
}

impl From<InputError> for RegistryError {
    fn from(err: InputError) -> Self {
        RegistryError::InvalidConfig(err.to_string())
    }
}

impl From<FrameError> for RegistryError {
    fn from(err: FrameError) -> Self {
        RegistryError::InvalidConfig(err.to_string())
    }
}
