//! Per-channel transmitter task
//!
//! Each running channel owns one spawned task that sends its current frame,
//! optionally regenerates the payload, then sleeps for the interval. The
//! task and its handle share a mutex over `{running, frame}`; the whole
//! send/regenerate step runs under that lock, so a concurrent
//! [`ChannelTransmitter::stop`] either happens before an iteration starts
//! or waits until the in-flight send has finished.
//!
//! Stopping does not interrupt a send in progress. A sink that never
//! returns will block `stop` unless a send timeout is configured in
//! [`TransmitterOptions`].

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use can_frame::{Frame, PayloadGenerator};
use tokio::sync::{broadcast, mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::{ChannelConfig, ChannelId, SendErrorPolicy, TransmitterOptions};
use crate::error::SendError;
use crate::events::{ChannelStatus, TransmitterEvent};
use crate::sink::BusSink;

/// Commands that can be sent to a transmitter task
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransmitterCommand {
    /// Abandon the current interval sleep
    Shutdown,
}

/// State guarded by the loop lock
#[derive(Debug)]
struct LoopState {
    running: bool,
    frame: Frame,
}

/// State shared between the task and its handle
#[derive(Debug)]
struct Shared {
    state: Mutex<LoopState>,
    /// Mirror of `running` for lock-free queries, written under the lock
    active: AtomicBool,
    sent: AtomicU64,
}

/// Handle to one channel's send loop
///
/// Dropping the handle without calling [`stop`](Self::stop) also ends the
/// loop, at the latest after the current interval.
#[derive(Debug)]
pub struct ChannelTransmitter {
    channel_id: ChannelId,
    shared: Arc<Shared>,
    cmd_tx: mpsc::Sender<TransmitterCommand>,
    task: Option<JoinHandle<()>>,
}

impl ChannelTransmitter {
    /// Spawn the send loop for `config` and return immediately
    ///
    /// The configuration is assumed to be validated. Must be called from
    /// within a tokio runtime.
    pub fn start<S: BusSink>(
        config: ChannelConfig,
        sink: Arc<S>,
        options: TransmitterOptions,
        events: broadcast::Sender<TransmitterEvent>,
    ) -> Self {
        let shared = Arc::new(Shared {
            state: Mutex::new(LoopState {
                running: true,
                frame: config.frame,
            }),
            active: AtomicBool::new(true),
            sent: AtomicU64::new(0),
        });
        let (cmd_tx, cmd_rx) = mpsc::channel(1);

        info!(
            "Starting transmitter for channel {}: {} every {}s (randomize={})",
            config.channel_id,
            config.frame,
            config.interval.as_secs_f64(),
            config.randomize
        );

        let task = tokio::spawn(run_transmitter_task(
            config,
            sink,
            options,
            shared.clone(),
            cmd_rx,
            events,
        ));

        Self {
            channel_id: config.channel_id,
            shared,
            cmd_tx,
            task: Some(task),
        }
    }

    /// Request termination
    ///
    /// Once this returns no new send will begin. Calling it again is a no-op.
    pub async fn stop(&self) {
        {
            let mut state = self.shared.state.lock().await;
            if state.running {
                info!("Stopping transmitter for channel {}", self.channel_id);
            }
            state.running = false;
            self.shared.active.store(false, Ordering::Release);
        }
        // Wake the task if it is sleeping; a full or closed channel means
        // it is already on its way out.
        let _ = self.cmd_tx.try_send(TransmitterCommand::Shutdown);
    }

    /// Wait for the loop task to exit
    pub async fn join(&mut self) {
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                warn!(
                    "Transmitter task for channel {} ended abnormally: {}",
                    self.channel_id, e
                );
            }
        }
    }

    /// Whether the loop will send again
    pub fn is_running(&self) -> bool {
        self.shared.active.load(Ordering::Acquire)
    }

    /// Whether the loop task has exited (or was already joined)
    pub fn is_finished(&self) -> bool {
        self.task.as_ref().map_or(true, JoinHandle::is_finished)
    }

    /// The frame the next iteration will send
    pub async fn current_frame(&self) -> Frame {
        self.shared.state.lock().await.frame
    }

    /// Number of frames the sink accepted
    pub fn sent_count(&self) -> u64 {
        self.shared.sent.load(Ordering::Relaxed)
    }

    /// Channel this transmitter serves
    pub fn channel_id(&self) -> ChannelId {
        self.channel_id
    }
}

/// Run the send loop for one channel
async fn run_transmitter_task<S: BusSink>(
    config: ChannelConfig,
    sink: Arc<S>,
    options: TransmitterOptions,
    shared: Arc<Shared>,
    mut cmd_rx: mpsc::Receiver<TransmitterCommand>,
    events: broadcast::Sender<TransmitterEvent>,
) {
    let channel_id = config.channel_id;
    let mut payloads = PayloadGenerator::new();

    loop {
        let still_running = {
            let mut state = shared.state.lock().await;
            if !state.running {
                break;
            }

            let frame = state.frame;
            match send_frame(sink.as_ref(), &frame, options.send_timeout).await {
                Ok(()) => {
                    shared.sent.fetch_add(1, Ordering::Relaxed);
                    debug!("Channel {} sent {}", channel_id, frame);
                    let _ = events.send(TransmitterEvent::FrameSent { channel_id, frame });
                }
                Err(e) => {
                    warn!("Channel {} failed to send {}: {}", channel_id, frame, e);
                    let _ = events.send(TransmitterEvent::Error {
                        channel_id,
                        message: format!("Send failed: {}", e),
                    });
                    if options.error_policy == SendErrorPolicy::StopOnError {
                        state.running = false;
                    }
                }
            }

            if config.randomize {
                match payloads
                    .random_bytes(frame.len())
                    .and_then(|bytes| frame.with_payload(&bytes))
                {
                    Ok(next) => {
                        debug!("Channel {} regenerated payload: {}", channel_id, next);
                        state.frame = next;
                    }
                    Err(e) => warn!("Channel {} could not regenerate payload: {}", channel_id, e),
                }
            }

            if config.is_single_shot() {
                state.running = false;
                let _ = events.send(TransmitterEvent::StatusChanged {
                    channel_id,
                    status: ChannelStatus::SingleShotFired,
                });
            }

            if !state.running {
                shared.active.store(false, Ordering::Release);
            }
            state.running
        };

        if !still_running {
            break;
        }

        tokio::select! {
            _ = tokio::time::sleep(config.interval) => {}
            cmd = cmd_rx.recv() => match cmd {
                Some(TransmitterCommand::Shutdown) => {
                    debug!("Channel {} woken for shutdown", channel_id);
                }
                None => {
                    debug!("Handle dropped for channel {}, stopping", channel_id);
                    shared.state.lock().await.running = false;
                }
            }
        }
    }

    shared.active.store(false, Ordering::Release);
    info!(
        "Transmitter for channel {} stopped after {} frames",
        channel_id,
        shared.sent.load(Ordering::Relaxed)
    );
    let _ = events.send(TransmitterEvent::StatusChanged {
        channel_id,
        status: ChannelStatus::Idle,
    });
}

/// Send one frame, bounded by `timeout` if set
async fn send_frame<S: BusSink>(
    sink: &S,
    frame: &Frame,
    timeout: Option<Duration>,
) -> Result<(), SendError> {
    match timeout {
        Some(limit) => tokio::time::timeout(limit, sink.send(frame))
            .await
            .unwrap_or(Err(SendError::Timeout(limit))),
        None => sink.send(frame).await,
    }
}
