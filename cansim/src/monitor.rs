//! Traffic monitor
//!
//! Consumes the scheduler's event stream and renders it on the terminal:
//! one line per sent frame, status changes per channel, and errors.

use std::collections::HashMap;

use can_sched::{ChannelId, ChannelStatus, TransmitterEvent};
use tokio::sync::broadcast;
use tracing::{error, info, warn};

/// Totals collected by the monitor
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MonitorSummary {
    /// Frames sent per channel
    pub frames: HashMap<ChannelId, u64>,
    /// Errors reported across all channels
    pub errors: u64,
    /// Last status seen per channel
    pub statuses: HashMap<ChannelId, ChannelStatus>,
}

impl MonitorSummary {
    /// Total frames across all channels
    pub fn total_frames(&self) -> u64 {
        self.frames.values().sum()
    }

    fn record(&mut self, event: &TransmitterEvent) {
        match event {
            TransmitterEvent::FrameSent { channel_id, frame } => {
                *self.frames.entry(*channel_id).or_default() += 1;
                println!("[ch {:>2}] {}", channel_id, frame);
            }
            TransmitterEvent::StatusChanged { channel_id, status } => {
                self.statuses.insert(*channel_id, *status);
                info!("Channel {} is now {}", channel_id, status.name());
            }
            TransmitterEvent::Error {
                channel_id,
                message,
            } => {
                self.errors += 1;
                error!("Channel {}: {}", channel_id, message);
            }
        }
    }
}

/// Print events until the event channel closes
pub async fn run_monitor(mut events: broadcast::Receiver<TransmitterEvent>) -> MonitorSummary {
    let mut summary = MonitorSummary::default();

    loop {
        match events.recv().await {
            Ok(event) => summary.record(&event),
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!("Traffic monitor fell behind, skipped {} events", skipped);
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }

    info!(
        "Traffic monitor finished: {} frames, {} errors",
        summary.total_frames(),
        summary.errors
    );
    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use can_frame::Frame;

    #[tokio::test]
    async fn test_monitor_counts_events() {
        let (tx, rx) = broadcast::channel(16);
        let handle = tokio::spawn(run_monitor(rx));

        let frame = Frame::new(0x64, &[1]).unwrap();
        tx.send(TransmitterEvent::StatusChanged {
            channel_id: ChannelId(1),
            status: ChannelStatus::Running,
        })
        .unwrap();
        for _ in 0..3 {
            tx.send(TransmitterEvent::FrameSent {
                channel_id: ChannelId(1),
                frame,
            })
            .unwrap();
        }
        tx.send(TransmitterEvent::Error {
            channel_id: ChannelId(2),
            message: "bus closed".to_string(),
        })
        .unwrap();
        tx.send(TransmitterEvent::StatusChanged {
            channel_id: ChannelId(1),
            status: ChannelStatus::Idle,
        })
        .unwrap();
        drop(tx);

        let summary = handle.await.unwrap();
        assert_eq!(summary.total_frames(), 3);
        assert_eq!(summary.frames.get(&ChannelId(1)), Some(&3));
        assert_eq!(summary.errors, 1);
        assert_eq!(
            summary.statuses.get(&ChannelId(1)),
            Some(&ChannelStatus::Idle)
        );
    }
}
