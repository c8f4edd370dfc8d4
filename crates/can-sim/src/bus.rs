//! Virtual CAN bus
//!
//! Provides an in-memory bus sink that records accepted frames, republishes
//! them to listeners and can be told to fail. The recorded history is
//! unbounded unless capped with [`VirtualBus::with_history`].

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use can_frame::Frame;
use can_sched::{BusSink, SendError};
use tokio::sync::broadcast;
use tokio::time::Instant;
use tracing::{debug, trace};

/// Capacity of the traffic broadcast channel
const TRAFFIC_CAPACITY: usize = 1024;

/// A frame accepted by the bus
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SentFrame {
    /// The frame
    pub frame: Frame,
    /// When the bus accepted it
    pub at: Instant,
}

/// Simulated bus that accepts frames from any number of transmitters
#[derive(Debug)]
pub struct VirtualBus {
    /// Interface name, for logging
    name: String,
    /// Accepted frames in order, oldest dropped first when capped
    log: Mutex<VecDeque<SentFrame>>,
    /// Maximum number of recorded frames
    history: Option<usize>,
    /// Frames accepted since creation, including ones no longer recorded
    accepted: AtomicU64,
    /// Live traffic for listeners
    traffic: broadcast::Sender<Frame>,
    /// Time each send takes
    latency: Option<Duration>,
    /// Closed buses reject every frame
    closed: AtomicBool,
    /// Number of upcoming sends that fail with a transport error
    fail_next: AtomicU32,
    /// Send attempts, including failed ones
    attempts: AtomicU64,
    /// Sends currently in progress
    in_flight: AtomicUsize,
    /// Highest value `in_flight` reached
    max_in_flight: AtomicUsize,
}

impl VirtualBus {
    /// Create an open bus with no latency
    pub fn new(name: impl Into<String>) -> Self {
        let (traffic, _) = broadcast::channel(TRAFFIC_CAPACITY);
        Self {
            name: name.into(),
            log: Mutex::new(VecDeque::new()),
            history: None,
            accepted: AtomicU64::new(0),
            traffic,
            latency: None,
            closed: AtomicBool::new(false),
            fail_next: AtomicU32::new(0),
            attempts: AtomicU64::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    /// Make every send take `latency`
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Keep only the most recent `frames` accepted frames
    pub fn with_history(mut self, frames: usize) -> Self {
        self.history = Some(frames);
        self
    }

    /// Get the interface name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Receive every frame accepted from now on
    pub fn subscribe(&self) -> broadcast::Receiver<Frame> {
        self.traffic.subscribe()
    }

    /// Recorded frames in order
    pub fn frames(&self) -> Vec<Frame> {
        self.log().iter().map(|sent| sent.frame).collect()
    }

    /// Recorded frames with their acceptance time
    pub fn sent(&self) -> Vec<SentFrame> {
        self.log().iter().copied().collect()
    }

    /// Accepted frames carrying the given arbitration id
    pub fn frames_with_id(&self, id: u32) -> Vec<Frame> {
        self.log()
            .iter()
            .filter(|sent| sent.frame.arbitration_id() == id)
            .map(|sent| sent.frame)
            .collect()
    }

    /// Number of recorded frames
    pub fn frame_count(&self) -> usize {
        self.log().len()
    }

    /// Forget recorded frames
    pub fn clear(&self) {
        self.log().clear();
    }

    /// Reject all further frames with [`SendError::Closed`]
    pub fn close(&self) {
        debug!("Virtual bus {} closed", self.name);
        self.closed.store(true, Ordering::Release);
    }

    /// Accept frames again after [`close`](Self::close)
    pub fn reopen(&self) {
        debug!("Virtual bus {} reopened", self.name);
        self.closed.store(false, Ordering::Release);
    }

    /// Whether the bus is closed
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Fail the next `count` sends with a transport error
    pub fn fail_next(&self, count: u32) {
        self.fail_next.store(count, Ordering::Release);
    }

    /// Number of frames accepted since creation
    pub fn accepted(&self) -> u64 {
        self.accepted.load(Ordering::Relaxed)
    }

    /// Number of send attempts, successful or not
    pub fn attempts(&self) -> u64 {
        self.attempts.load(Ordering::Relaxed)
    }

    /// Largest number of sends that were in progress at the same time
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::Relaxed)
    }

    fn log(&self) -> std::sync::MutexGuard<'_, VecDeque<SentFrame>> {
        self.log.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn take_injected_failure(&self) -> bool {
        self.fail_next
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1))
            .is_ok()
    }
}

impl BusSink for VirtualBus {
    async fn send(&self, frame: &Frame) -> Result<(), SendError> {
        self.attempts.fetch_add(1, Ordering::Relaxed);
        let current = self.in_flight.fetch_add(1, Ordering::AcqRel) + 1;
        self.max_in_flight.fetch_max(current, Ordering::AcqRel);
        // Released on completion or when the caller drops the send
        let _in_flight = InFlight(&self.in_flight);

        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        if self.is_closed() {
            Err(SendError::Closed)
        } else if self.take_injected_failure() {
            Err(SendError::Transport(format!("{}: injected failure", self.name)))
        } else {
            {
                let mut log = self.log();
                log.push_back(SentFrame {
                    frame: *frame,
                    at: Instant::now(),
                });
                if let Some(cap) = self.history {
                    while log.len() > cap {
                        log.pop_front();
                    }
                }
            }
            self.accepted.fetch_add(1, Ordering::Relaxed);
            trace!("Virtual bus {} accepted {}", self.name, frame);
            let _ = self.traffic.send(*frame);
            Ok(())
        }
    }
}

/// Counts one send as in progress until dropped
struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::AcqRel);
    }
}
