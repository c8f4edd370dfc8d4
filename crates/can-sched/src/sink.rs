//! Bus sink abstraction
//!
//! The scheduler never talks to a bus directly. Every transmitter holds an
//! `Arc` to a shared [`BusSink`] and calls it once per iteration. The sink
//! is shared by all channels, so implementations must accept concurrent
//! calls or serialize them internally.

use std::future::Future;

use can_frame::Frame;
use tokio::sync::mpsc;

use crate::error::SendError;

/// Capability to put one frame on the bus
///
/// The bus is assumed to be open before any transmitter starts.
pub trait BusSink: Send + Sync + 'static {
    /// Transmit a frame
    fn send(&self, frame: &Frame) -> impl Future<Output = Result<(), SendError>> + Send;
}

/// A channel sender acts as a bus whose receiver is the wire
///
/// Fails with [`SendError::Closed`] once the receiver is dropped.
impl BusSink for mpsc::Sender<Frame> {
    async fn send(&self, frame: &Frame) -> Result<(), SendError> {
        mpsc::Sender::send(self, *frame)
            .await
            .map_err(|_| SendError::Closed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mpsc_sender_sink() {
        let (tx, mut rx) = mpsc::channel(4);
        let frame = Frame::new(0x64, &[1, 2]).unwrap();

        BusSink::send(&tx, &frame).await.unwrap();
        assert_eq!(rx.recv().await, Some(frame));

        drop(rx);
        assert_eq!(BusSink::send(&tx, &frame).await, Err(SendError::Closed));
    }
}
