//! Classic CAN frame value type

use std::fmt;

use crate::error::FrameError;

/// Maximum payload length of a classic CAN frame
pub const MAX_DLC: usize = 8;

/// Largest 11-bit (standard) arbitration id
pub const STANDARD_ID_MAX: u32 = 0x7FF;

/// Largest 29-bit (extended) arbitration id
pub const EXTENDED_ID_MAX: u32 = 0x1FFF_FFFF;

/// One classic CAN frame
///
/// The payload is stored inline so frames are `Copy` and can be handed to
/// observers without allocation. Construction validates the id range and
/// payload length; there is no way to build an out-of-range frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(try_from = "FrameRepr", into = "FrameRepr")
)]
pub struct Frame {
    id: u32,
    extended: bool,
    data: [u8; MAX_DLC],
    dlc: u8,
}

impl Frame {
    /// Create a standard (11-bit id) frame
    pub fn new(id: u32, data: &[u8]) -> Result<Self, FrameError> {
        Self::build(id, false, data)
    }

    /// Create an extended (29-bit id) frame
    pub fn new_extended(id: u32, data: &[u8]) -> Result<Self, FrameError> {
        Self::build(id, true, data)
    }

    fn build(id: u32, extended: bool, data: &[u8]) -> Result<Self, FrameError> {
        let max = if extended {
            EXTENDED_ID_MAX
        } else {
            STANDARD_ID_MAX
        };
        if id > max {
            return Err(FrameError::IdOutOfRange { id, extended });
        }
        if data.len() > MAX_DLC {
            return Err(FrameError::InvalidPayload { len: data.len() });
        }

        let mut buf = [0u8; MAX_DLC];
        buf[..data.len()].copy_from_slice(data);
        Ok(Self {
            id,
            extended,
            data: buf,
            dlc: data.len() as u8,
        })
    }

    /// Arbitration id
    pub fn arbitration_id(&self) -> u32 {
        self.id
    }

    /// Whether this frame uses a 29-bit id
    pub fn is_extended(&self) -> bool {
        self.extended
    }

    /// Payload bytes
    pub fn data(&self) -> &[u8] {
        &self.data[..self.dlc as usize]
    }

    /// Payload length (data length code)
    pub fn len(&self) -> usize {
        self.dlc as usize
    }

    /// Whether the payload is empty
    pub fn is_empty(&self) -> bool {
        self.dlc == 0
    }

    /// Copy of this frame with a different payload
    ///
    /// The id and id kind are kept; the new payload may have any valid length.
    pub fn with_payload(&self, payload: &[u8]) -> Result<Self, FrameError> {
        Self::build(self.id, self.extended, payload)
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.extended {
            write!(f, "ID=0x{:08X}", self.id)?;
        } else {
            write!(f, "ID=0x{:03X}", self.id)?;
        }
        write!(f, " DLC={} [", self.dlc)?;
        for (i, byte) in self.data().iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{:02X}", byte)?;
        }
        f.write_str("]")
    }
}

/// Serialized shape of a frame
#[cfg(feature = "serde")]
#[derive(serde::Serialize, serde::Deserialize)]
struct FrameRepr {
    arbitration_id: u32,
    #[serde(default)]
    extended: bool,
    data: Vec<u8>,
}

#[cfg(feature = "serde")]
impl TryFrom<FrameRepr> for Frame {
    type Error = FrameError;

    fn try_from(repr: FrameRepr) -> Result<Self, Self::Error> {
        Frame::build(repr.arbitration_id, repr.extended, &repr.data)
    }
}

#[cfg(feature = "serde")]
impl From<Frame> for FrameRepr {
    fn from(frame: Frame) -> Self {
        Self {
            arbitration_id: frame.id,
            extended: frame.extended,
            data: frame.data().to_vec(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_frame() {
        let frame = Frame::new(0x64, &[1, 2, 3]).unwrap();
        assert_eq!(frame.arbitration_id(), 0x64);
        assert_eq!(frame.data(), &[1, 2, 3]);
        assert_eq!(frame.len(), 3);
        assert!(!frame.is_extended());
    }

    #[test]
    fn test_empty_payload() {
        let frame = Frame::new(0x6E, &[]).unwrap();
        assert!(frame.is_empty());
        assert_eq!(frame.data(), &[] as &[u8]);
    }

    #[test]
    fn test_standard_id_limit() {
        assert!(Frame::new(STANDARD_ID_MAX, &[]).is_ok());
        assert_eq!(
            Frame::new(0x800, &[]),
            Err(FrameError::IdOutOfRange {
                id: 0x800,
                extended: false
            })
        );
    }

    #[test]
    fn test_extended_id_limit() {
        assert!(Frame::new_extended(EXTENDED_ID_MAX, &[0xFF]).is_ok());
        assert!(Frame::new_extended(EXTENDED_ID_MAX + 1, &[]).is_err());
    }

    #[test]
    fn test_payload_too_long() {
        assert_eq!(
            Frame::new(0x100, &[0; 9]),
            Err(FrameError::InvalidPayload { len: 9 })
        );
    }

    #[test]
    fn test_with_payload_keeps_id() {
        let frame = Frame::new(0x123, &[0; 8]).unwrap();
        let updated = frame.with_payload(&[0xAA, 0xBB]).unwrap();
        assert_eq!(updated.arbitration_id(), 0x123);
        assert_eq!(updated.data(), &[0xAA, 0xBB]);
        assert!(frame.with_payload(&[0; 9]).is_err());
    }

    #[test]
    fn test_unused_bytes_do_not_affect_equality() {
        let long = Frame::new(0x10, &[9, 9, 9]).unwrap();
        let short = long.with_payload(&[9]).unwrap();
        assert_eq!(short, Frame::new(0x10, &[9]).unwrap());
    }

    #[test]
    fn test_display() {
        let frame = Frame::new(0x64, &[0x01, 0xAB]).unwrap();
        assert_eq!(frame.to_string(), "ID=0x064 DLC=2 [01 AB]");

        let empty = Frame::new(0x6E, &[]).unwrap();
        assert_eq!(empty.to_string(), "ID=0x06E DLC=0 []");
    }
}
