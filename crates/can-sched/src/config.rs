//! Channel configuration

use std::fmt;
use std::time::Duration;

use can_frame::{ChannelInput, Frame};
use serde::{Deserialize, Serialize};

use crate::error::RegistryError;

/// Identifier of one simulated channel
///
/// Any positive value is accepted; the scheduler does not bound the number
/// of channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChannelId(pub u16);

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Everything a transmitter needs to run one channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelConfig {
    /// Channel this configuration belongs to
    pub channel_id: ChannelId,
    /// Frame sent on the first iteration
    pub frame: Frame,
    /// Delay between sends; zero sends once and stops
    pub interval: Duration,
    /// Replace the payload with random bytes after each send
    pub randomize: bool,
}

impl ChannelConfig {
    /// Create a configuration
    pub fn new(channel_id: ChannelId, frame: Frame, interval: Duration, randomize: bool) -> Self {
        Self {
            channel_id,
            frame,
            interval,
            randomize,
        }
    }

    /// Build a configuration from the hex text fields of an input row
    pub fn from_input(channel_id: ChannelId, input: &ChannelInput) -> Result<Self, RegistryError> {
        let parsed = input.parse()?;
        let config = Self::new(channel_id, parsed.frame, parsed.interval, parsed.randomize);
        config.validate()?;
        Ok(config)
    }

    /// Whether this configuration sends exactly once
    pub fn is_single_shot(&self) -> bool {
        self.interval.is_zero()
    }

    /// Check the invariants not already enforced by the types
    pub fn validate(&self) -> Result<(), RegistryError> {
        if self.channel_id.0 == 0 {
            return Err(RegistryError::InvalidConfig(
                "channel id must be positive".to_string(),
            ));
        }
        if self.frame.is_extended() {
            return Err(RegistryError::InvalidConfig(format!(
                "channel {}: only standard frames can be scheduled",
                self.channel_id
            )));
        }
        Ok(())
    }
}

/// What a transmitter does when the sink rejects a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SendErrorPolicy {
    /// Report the error and keep sending
    #[default]
    Continue,
    /// Report the error and stop the channel
    StopOnError,
}

/// Runtime options shared by all transmitters started from a registry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TransmitterOptions {
    /// Reaction to send failures
    pub error_policy: SendErrorPolicy,
    /// Upper bound on a single sink call; `None` waits forever
    pub send_timeout: Option<Duration>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(id: &str, data: &[&str], interval: &str) -> ChannelInput {
        ChannelInput {
            arbitration_id: id.to_string(),
            data: data.iter().map(|s| s.to_string()).collect(),
            interval: interval.to_string(),
            randomize: false,
        }
    }

    #[test]
    fn test_from_input() {
        let config = ChannelConfig::from_input(ChannelId(1), &row("64", &["00"; 8], "3")).unwrap();
        assert_eq!(config.channel_id, ChannelId(1));
        assert_eq!(config.frame.arbitration_id(), 0x64);
        assert_eq!(config.interval, Duration::from_secs(3));
        assert!(!config.is_single_shot());
    }

    #[test]
    fn test_from_input_rejects_bad_id() {
        let err = ChannelConfig::from_input(ChannelId(1), &row("ZZZ", &[], "1")).unwrap_err();
        assert!(matches!(err, RegistryError::InvalidConfig(_)));
    }

    #[test]
    fn test_from_input_rejects_nine_bytes() {
        let err = ChannelConfig::from_input(ChannelId(1), &row("64", &["00"; 9], "1")).unwrap_err();
        assert!(matches!(err, RegistryError::InvalidConfig(_)));
    }

    #[test]
    fn test_zero_channel_rejected() {
        let frame = Frame::new(0x64, &[]).unwrap();
        let config = ChannelConfig::new(ChannelId(0), frame, Duration::ZERO, false);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_extended_frame_rejected() {
        let frame = Frame::new_extended(0x1234_5678, &[]).unwrap();
        let config = ChannelConfig::new(ChannelId(1), frame, Duration::from_secs(1), false);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_single_shot() {
        let frame = Frame::new(0x6E, &[]).unwrap();
        assert!(ChannelConfig::new(ChannelId(2), frame, Duration::ZERO, false).is_single_shot());
    }
}
