//! Event stream for observers
//!
//! Transmitters and the registry publish everything an observer might
//! render (status indicators, a traffic list, error dialogs) on a single
//! broadcast channel.

use can_frame::Frame;

use crate::config::ChannelId;

/// Observable state of a channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChannelStatus {
    /// No transmitter is running
    #[default]
    Idle,
    /// A transmitter loop is active
    Running,
    /// A zero-interval transmitter sent its only frame
    SingleShotFired,
}

impl ChannelStatus {
    /// Get human-readable name
    pub fn name(&self) -> &'static str {
        match self {
            Self::Idle => "Idle",
            Self::Running => "Running",
            Self::SingleShotFired => "Single shot fired",
        }
    }
}

/// Event emitted by the scheduler
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransmitterEvent {
    /// A channel changed state
    StatusChanged {
        /// Affected channel
        channel_id: ChannelId,
        /// New status
        status: ChannelStatus,
    },

    /// A frame was accepted by the bus sink
    FrameSent {
        /// Sending channel
        channel_id: ChannelId,
        /// The frame as sent
        frame: Frame,
    },

    /// A send failed or a configuration was rejected
    Error {
        /// Affected channel
        channel_id: ChannelId,
        /// Error message
        message: String,
    },
}

impl TransmitterEvent {
    /// Channel this event concerns
    pub fn channel_id(&self) -> ChannelId {
        match self {
            TransmitterEvent::StatusChanged { channel_id, .. }
            | TransmitterEvent::FrameSent { channel_id, .. }
            | TransmitterEvent::Error { channel_id, .. } => *channel_id,
        }
    }

    /// The new status if this is a status change
    pub fn status(&self) -> Option<ChannelStatus> {
        match self {
            TransmitterEvent::StatusChanged { status, .. } => Some(*status),
            _ => None,
        }
    }
}
