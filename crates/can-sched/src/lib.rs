//! CAN Transmission Scheduler
//!
//! This crate runs the periodic send loops of a CAN frame simulator. Every
//! channel is an independent sender with its own frame, interval and
//! randomization flag.
//!
//! # Architecture
//!
//! - A [`ChannelTransmitter`] owns one spawned task that sends its frame,
//!   optionally replaces the payload with random bytes, then sleeps for the
//!   interval. A zero interval sends once and stops.
//! - The [`TransmitterRegistry`] keeps at most one transmitter per
//!   [`ChannelId`] and serializes start/stop requests.
//! - Frames go to a shared [`BusSink`]; the bus itself lives outside this
//!   crate.
//! - Status changes, sent frames and errors are published as
//!   [`TransmitterEvent`]s on a broadcast channel.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use can_frame::Frame;
//! use can_sched::{ChannelConfig, ChannelId, TransmitterRegistry};
//! use tokio::sync::mpsc;
//!
//! # async fn example() -> Result<(), can_sched::RegistryError> {
//! let registry = TransmitterRegistry::new();
//! let (bus, _wire) = mpsc::channel::<Frame>(64);
//!
//! let frame = Frame::new(0x64, &[0; 8])?;
//! let config = ChannelConfig::new(ChannelId(1), frame, Duration::from_secs(3), true);
//! registry.request_start(ChannelId(1), config, Arc::new(bus)).await?;
//!
//! // ...
//! registry.stop_all().await;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod events;
pub mod registry;
pub mod sink;
pub mod transmitter;

pub use config::{ChannelConfig, ChannelId, SendErrorPolicy, TransmitterOptions};
pub use error::{RegistryError, SendError};
pub use events::{ChannelStatus, TransmitterEvent};
pub use registry::{TransmitterRegistry, DEFAULT_EVENT_CAPACITY};
pub use sink::BusSink;
pub use transmitter::{ChannelTransmitter, TransmitterCommand};
