//! Hexadecimal channel input fields
//!
//! Each simulated channel is configured through text fields: the
//! arbitration id in hex, up to eight payload bytes in hex, an interval in
//! whole seconds and a randomize flag. A payload field containing a single
//! `-` omits that byte, shortening the payload.

use std::time::Duration;

use tracing::debug;

use crate::error::InputError;
use crate::frame::{Frame, MAX_DLC};
use crate::payload::PayloadGenerator;

/// Payload field value meaning "no byte here"
pub const OMIT_BYTE: &str = "-";

/// First arbitration id used by [`ChannelInput::default_rows`]
pub const DEFAULT_BASE_ID: u32 = 100;

/// Id spacing between default rows
pub const DEFAULT_ID_STEP: u32 = 10;

/// Interval used by [`ChannelInput::default_rows`]
pub const DEFAULT_INTERVAL_SECS: u64 = 3;

/// Raw text fields for one channel
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ChannelInput {
    /// Arbitration id as hex, with or without a `0x` prefix
    pub arbitration_id: String,
    /// Up to eight payload bytes as hex, `-` to omit
    pub data: Vec<String>,
    /// Interval in whole seconds; `0` sends once
    pub interval: String,
    /// Replace the payload with random bytes after each send
    #[cfg_attr(feature = "serde", serde(default))]
    pub randomize: bool,
}

/// Validated result of parsing a [`ChannelInput`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParsedInput {
    pub frame: Frame,
    pub interval: Duration,
    pub randomize: bool,
}

impl ChannelInput {
    /// Parse and validate all fields
    pub fn parse(&self) -> Result<ParsedInput, InputError> {
        let id = parse_hex_id(&self.arbitration_id)?;
        let data = PayloadGenerator::fixed(&parse_payload(&self.data)?)?;
        let interval = parse_interval(&self.interval)?;
        let frame = Frame::new(id, &data)?;

        debug!(
            "Parsed channel input: {} interval={}s randomize={}",
            frame,
            interval.as_secs(),
            self.randomize
        );

        Ok(ParsedInput {
            frame,
            interval,
            randomize: self.randomize,
        })
    }

    /// Encode a frame back into input fields
    ///
    /// Bytes are rendered as two upper-case hex digits and the unused slots
    /// are filled with `-`, so parsing the result yields the same frame.
    /// Sub-second parts of `interval` are dropped.
    ///
    /// Only standard frames round-trip: the input fields carry no id kind,
    /// so an extended id above 0x7FF encodes fine but fails [`parse`](Self::parse)
    /// with [`FrameError::IdOutOfRange`](crate::FrameError::IdOutOfRange).
    pub fn from_frame(frame: &Frame, interval: Duration, randomize: bool) -> Self {
        let mut data: Vec<String> = frame.data().iter().map(|b| format!("{:02X}", b)).collect();
        data.resize(MAX_DLC, OMIT_BYTE.to_string());

        Self {
            arbitration_id: format!("{:X}", frame.arbitration_id()),
            data,
            interval: interval.as_secs().to_string(),
            randomize,
        }
    }

    /// Initial contents of `rows` input rows
    ///
    /// Ids start at 100 and step by 10, each row gets eight random bytes, a
    /// 3 second interval and randomization enabled.
    pub fn default_rows(rows: usize) -> Vec<Self> {
        let mut payloads = PayloadGenerator::new();
        (0..rows as u32)
            .map(|row| {
                let data = payloads
                    .random_bytes(MAX_DLC)
                    .unwrap_or_default()
                    .iter()
                    .map(|b| format!("{:02X}", b))
                    .collect();
                Self {
                    arbitration_id: format!("{:X}", DEFAULT_BASE_ID + row * DEFAULT_ID_STEP),
                    data,
                    interval: DEFAULT_INTERVAL_SECS.to_string(),
                    randomize: true,
                }
            })
            .collect()
    }
}

fn strip_hex_prefix(s: &str) -> &str {
    s.strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .unwrap_or(s)
}

fn parse_hex_id(text: &str) -> Result<u32, InputError> {
    let digits = strip_hex_prefix(text.trim());
    if digits.is_empty() || digits.starts_with('+') {
        return Err(InputError::InvalidId(text.to_string()));
    }
    u32::from_str_radix(digits, 16).map_err(|_| InputError::InvalidId(text.to_string()))
}

fn parse_payload(fields: &[String]) -> Result<Vec<u8>, InputError> {
    if fields.len() > MAX_DLC {
        return Err(InputError::TooManyBytes(fields.len()));
    }

    let mut data = Vec::with_capacity(fields.len());
    for (index, field) in fields.iter().enumerate() {
        let trimmed = field.trim();
        if trimmed == OMIT_BYTE {
            continue;
        }
        let digits = strip_hex_prefix(trimmed);
        let invalid = || InputError::InvalidByte {
            index,
            value: field.clone(),
        };
        if digits.is_empty() || digits.starts_with('+') {
            return Err(invalid());
        }
        data.push(u8::from_str_radix(digits, 16).map_err(|_| invalid())?);
    }
    Ok(data)
}

fn parse_interval(text: &str) -> Result<Duration, InputError> {
    let trimmed = text.trim();
    if trimmed.starts_with('+') {
        return Err(InputError::InvalidInterval(text.to_string()));
    }
    trimmed
        .parse::<u64>()
        .map(Duration::from_secs)
        .map_err(|_| InputError::InvalidInterval(text.to_string()))
}
