//! CAN Frame Library
//!
//! This crate provides the value types shared by the transmission scheduler
//! and its front ends:
//!
//! - **Frame**: a classic CAN frame (11-bit or 29-bit id, 0 to 8 data bytes)
//! - **PayloadGenerator**: fixed or randomized payloads of up to 8 bytes
//! - **ChannelInput**: the hexadecimal text fields a user fills in per channel
//!
//! # Example
//!
//! ```rust
//! use can_frame::{ChannelInput, PayloadGenerator};
//!
//! let input = ChannelInput {
//!     arbitration_id: "64".into(),
//!     data: vec!["01".into(), "-".into(), "03".into()],
//!     interval: "3".into(),
//!     randomize: true,
//! };
//!
//! let parsed = input.parse().unwrap();
//! assert_eq!(parsed.frame.arbitration_id(), 0x64);
//! assert_eq!(parsed.frame.data(), &[0x01, 0x03]);
//!
//! let mut payloads = PayloadGenerator::from_seed(1);
//! let next = parsed.frame.with_payload(&payloads.random_bytes(2).unwrap()).unwrap();
//! assert_eq!(next.len(), 2);
//! ```

pub mod error;
pub mod frame;
pub mod input;
pub mod payload;

pub use error::{FrameError, InputError};
pub use frame::{Frame, EXTENDED_ID_MAX, MAX_DLC, STANDARD_ID_MAX};
pub use input::{ChannelInput, ParsedInput, OMIT_BYTE};
pub use payload::PayloadGenerator;
