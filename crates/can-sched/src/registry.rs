//! Channel-keyed registry of running transmitters
//!
//! The registry is the only owner of [`ChannelTransmitter`] handles. Each
//! channel has its own async gate that is held for the whole of a start or
//! stop request, including waiting for a previous transmitter to exit, so
//! two loops for the same channel can never overlap. The map itself is only
//! locked briefly and never while a transmitter is being stopped, so a
//! channel stuck in its sink cannot block requests for other channels.

use std::collections::HashMap;
use std::sync::Arc;

use can_frame::ChannelInput;
use tokio::sync::{broadcast, Mutex, OwnedMutexGuard};
use tracing::{info, warn};

use crate::config::{ChannelConfig, ChannelId, TransmitterOptions};
use crate::error::RegistryError;
use crate::events::{ChannelStatus, TransmitterEvent};
use crate::sink::BusSink;
use crate::transmitter::ChannelTransmitter;

/// Default capacity of the event broadcast channel
pub const DEFAULT_EVENT_CAPACITY: usize = 256;

/// One channel's slot in the registry
#[derive(Debug, Default)]
struct ChannelEntry {
    /// Held while a start or stop for this channel is in progress
    gate: Arc<Mutex<()>>,
    transmitter: Option<ChannelTransmitter>,
}

/// State guarded by the registry lock
#[derive(Debug, Default)]
struct RegistryInner {
    entries: HashMap<ChannelId, ChannelEntry>,
    options: TransmitterOptions,
}

/// Controller-facing map from channel id to its transmitter
#[derive(Debug)]
pub struct TransmitterRegistry {
    inner: Mutex<RegistryInner>,
    events: broadcast::Sender<TransmitterEvent>,
}

impl TransmitterRegistry {
    /// Create an empty registry with the default event capacity
    pub fn new() -> Self {
        Self::with_event_capacity(DEFAULT_EVENT_CAPACITY)
    }

    /// Create an empty registry whose event channel buffers `capacity` events
    pub fn with_event_capacity(capacity: usize) -> Self {
        let (events, _) = broadcast::channel(capacity.max(1));
        Self {
            inner: Mutex::new(RegistryInner::default()),
            events,
        }
    }

    /// Subscribe to status, traffic and error events
    pub fn subscribe(&self) -> broadcast::Receiver<TransmitterEvent> {
        self.events.subscribe()
    }

    /// Replace the options used by subsequent starts
    pub async fn set_options(&self, options: TransmitterOptions) {
        self.inner.lock().await.options = options;
    }

    /// Start (or restart) a channel
    ///
    /// The configuration is validated before anything else happens; on
    /// failure an error event is emitted and the channel is left as it was.
    /// An existing transmitter for the channel is stopped and joined before
    /// the new one is spawned.
    pub async fn request_start<S: BusSink>(
        &self,
        channel_id: ChannelId,
        config: ChannelConfig,
        sink: Arc<S>,
    ) -> Result<(), RegistryError> {
        self.check_config(channel_id, &config)?;
        let _turn = self.gate(channel_id).await.lock_owned().await;
        self.start_gated(config, sink).await;
        Ok(())
    }

    /// Parse an input row and start the channel
    ///
    /// Parse failures are reported like any other invalid configuration.
    pub async fn request_start_from_input<S: BusSink>(
        &self,
        channel_id: ChannelId,
        input: &ChannelInput,
        sink: Arc<S>,
    ) -> Result<(), RegistryError> {
        let config = match ChannelConfig::from_input(channel_id, input) {
            Ok(config) => config,
            Err(e) => {
                self.report_invalid(channel_id, &e);
                return Err(e);
            }
        };
        self.request_start(channel_id, config, sink).await
    }

    /// Start a channel without waiting for another request to finish
    ///
    /// Fails with [`RegistryError::AlreadyStopping`] while another start or
    /// stop for the same channel is tearing down its transmitter. Intended
    /// for callers that must not block, such as a UI thread.
    pub async fn try_request_start<S: BusSink>(
        &self,
        channel_id: ChannelId,
        config: ChannelConfig,
        sink: Arc<S>,
    ) -> Result<(), RegistryError> {
        self.check_config(channel_id, &config)?;
        let _turn = self
            .gate(channel_id)
            .await
            .try_lock_owned()
            .map_err(|_| RegistryError::AlreadyStopping(channel_id))?;
        self.start_gated(config, sink).await;
        Ok(())
    }

    /// Stop and remove a channel's transmitter; no-op if there is none
    pub async fn request_stop(&self, channel_id: ChannelId) {
        let _turn = self.gate(channel_id).await.lock_owned().await;
        if let Some(old) = self.take(channel_id).await {
            info!("Stop requested for channel {}", channel_id);
            shutdown(old).await;
        }
    }

    /// Stop and remove every transmitter
    ///
    /// Waits for starts and stops already in progress on any channel.
    pub async fn stop_all(&self) {
        let mut gates: Vec<_> = {
            let inner = self.inner.lock().await;
            inner
                .entries
                .iter()
                .map(|(id, entry)| (*id, entry.gate.clone()))
                .collect()
        };
        // Fixed order so concurrent callers cannot deadlock
        gates.sort_by_key(|(id, _)| *id);

        let mut turns: Vec<OwnedMutexGuard<()>> = Vec::with_capacity(gates.len());
        for (_, gate) in gates {
            turns.push(gate.lock_owned().await);
        }

        let mut stopping: Vec<_> = {
            let mut inner = self.inner.lock().await;
            inner
                .entries
                .values_mut()
                .filter_map(|entry| entry.transmitter.take())
                .collect()
        };
        if stopping.is_empty() {
            return;
        }
        info!("Stopping {} transmitters", stopping.len());

        // Signal everything first so the joins overlap
        for tx in &stopping {
            tx.stop().await;
        }
        for tx in &mut stopping {
            tx.join().await;
        }
    }

    /// Current state of a channel
    ///
    /// A transmitter that ended by itself (single shot or stop-on-error),
    /// or one that is being stopped, reads as [`ChannelStatus::Idle`].
    pub async fn status(&self, channel_id: ChannelId) -> ChannelStatus {
        let inner = self.inner.lock().await;
        match inner
            .entries
            .get(&channel_id)
            .and_then(|entry| entry.transmitter.as_ref())
        {
            Some(tx) if tx.is_running() => ChannelStatus::Running,
            _ => ChannelStatus::Idle,
        }
    }

    /// Channels with a running transmitter, in ascending order
    pub async fn active_channels(&self) -> Vec<ChannelId> {
        let inner = self.inner.lock().await;
        let mut ids: Vec<_> = inner
            .entries
            .iter()
            .filter(|(_, entry)| entry.transmitter.as_ref().is_some_and(|tx| tx.is_running()))
            .map(|(id, _)| *id)
            .collect();
        ids.sort();
        ids
    }

    /// Number of frames sent by a channel's current transmitter
    pub async fn sent_count(&self, channel_id: ChannelId) -> Option<u64> {
        let inner = self.inner.lock().await;
        inner
            .entries
            .get(&channel_id)
            .and_then(|entry| entry.transmitter.as_ref())
            .map(|tx| tx.sent_count())
    }

    fn check_config(
        &self,
        channel_id: ChannelId,
        config: &ChannelConfig,
    ) -> Result<(), RegistryError> {
        let result = if config.channel_id != channel_id {
            Err(RegistryError::InvalidConfig(format!(
                "config is for channel {}, not {}",
                config.channel_id, channel_id
            )))
        } else {
            config.validate()
        };

        if let Err(e) = &result {
            self.report_invalid(channel_id, e);
        }
        result
    }

    fn report_invalid(&self, channel_id: ChannelId, err: &RegistryError) {
        warn!("Rejected config for channel {}: {}", channel_id, err);
        let _ = self.events.send(TransmitterEvent::Error {
            channel_id,
            message: err.to_string(),
        });
    }

    /// Gate of a channel, creating its entry if needed
    async fn gate(&self, channel_id: ChannelId) -> Arc<Mutex<()>> {
        let mut inner = self.inner.lock().await;
        inner.entries.entry(channel_id).or_default().gate.clone()
    }

    async fn take(&self, channel_id: ChannelId) -> Option<ChannelTransmitter> {
        let mut inner = self.inner.lock().await;
        inner
            .entries
            .get_mut(&channel_id)
            .and_then(|entry| entry.transmitter.take())
    }

    /// Replace a channel's transmitter; the caller holds the channel gate
    async fn start_gated<S: BusSink>(&self, config: ChannelConfig, sink: Arc<S>) {
        let channel_id = config.channel_id;
        if let Some(old) = self.take(channel_id).await {
            info!("Replacing transmitter for channel {}", channel_id);
            shutdown(old).await;
        }

        let mut inner = self.inner.lock().await;
        // Running must reach watchers before any event from the new task
        let _ = self.events.send(TransmitterEvent::StatusChanged {
            channel_id,
            status: ChannelStatus::Running,
        });
        let tx = ChannelTransmitter::start(config, sink, inner.options, self.events.clone());
        inner.entries.entry(channel_id).or_default().transmitter = Some(tx);
    }
}

impl Default for TransmitterRegistry {
    fn default() -> Self {
        Self::new()
    }
}

async fn shutdown(mut tx: ChannelTransmitter) {
    tx.stop().await;
    tx.join().await;
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use can_frame::Frame;
    use tokio::sync::mpsc;

    use super::*;

    fn config(channel: u16, id: u32, interval_secs: u64) -> ChannelConfig {
        ChannelConfig::new(
            ChannelId(channel),
            Frame::new(id, &[0x01]).unwrap(),
            Duration::from_secs(interval_secs),
            false,
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_and_stop() {
        let registry = TransmitterRegistry::new();
        let (bus_tx, mut bus_rx) = mpsc::channel(64);
        let bus = Arc::new(bus_tx);

        registry
            .request_start(ChannelId(1), config(1, 0x64, 1), bus.clone())
            .await
            .unwrap();
        assert_eq!(registry.status(ChannelId(1)).await, ChannelStatus::Running);
        assert_eq!(registry.active_channels().await, vec![ChannelId(1)]);

        assert_eq!(bus_rx.recv().await.unwrap().arbitration_id(), 0x64);

        registry.request_stop(ChannelId(1)).await;
        assert_eq!(registry.status(ChannelId(1)).await, ChannelStatus::Idle);
        assert!(registry.active_channels().await.is_empty());
        assert_eq!(registry.sent_count(ChannelId(1)).await, None);
    }

    #[tokio::test]
    async fn test_stop_unknown_channel_is_noop() {
        let registry = TransmitterRegistry::new();
        registry.request_stop(ChannelId(9)).await;
        assert_eq!(registry.status(ChannelId(9)).await, ChannelStatus::Idle);
    }

    #[tokio::test]
    async fn test_mismatched_channel_rejected() {
        let registry = TransmitterRegistry::new();
        let mut events = registry.subscribe();
        let (bus_tx, _bus_rx) = mpsc::channel(4);

        let err = registry
            .request_start(ChannelId(2), config(1, 0x64, 1), Arc::new(bus_tx))
            .await
            .unwrap_err();
        assert!(matches!(err, RegistryError::InvalidConfig(_)));
        assert_eq!(registry.status(ChannelId(2)).await, ChannelStatus::Idle);

        let event = events.recv().await.unwrap();
        assert!(matches!(
            event,
            TransmitterEvent::Error { channel_id: ChannelId(2), .. }
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_from_input() {
        let registry = TransmitterRegistry::new();
        let mut events = registry.subscribe();
        let (bus_tx, mut bus_rx) = mpsc::channel(4);
        let bus = Arc::new(bus_tx);

        let bad = ChannelInput {
            arbitration_id: "ZZZ".to_string(),
            data: vec![],
            interval: "1".to_string(),
            randomize: false,
        };
        let err = registry
            .request_start_from_input(ChannelId(1), &bad, bus.clone())
            .await
            .unwrap_err();
        assert!(matches!(err, RegistryError::InvalidConfig(_)));
        assert!(matches!(
            events.recv().await.unwrap(),
            TransmitterEvent::Error { channel_id: ChannelId(1), .. }
        ));

        let good = ChannelInput {
            arbitration_id: "6E".to_string(),
            ..bad
        };
        registry
            .request_start_from_input(ChannelId(1), &good, bus)
            .await
            .unwrap();
        assert_eq!(bus_rx.recv().await.unwrap().arbitration_id(), 0x6E);
        registry.stop_all().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_all() {
        let registry = TransmitterRegistry::new();
        let (bus_tx, _bus_rx) = mpsc::channel(256);
        let bus = Arc::new(bus_tx);

        for channel in 1..=4u16 {
            let id = 0x64 + 10 * u32::from(channel - 1);
            registry
                .request_start(ChannelId(channel), config(channel, id, 3), bus.clone())
                .await
                .unwrap();
        }
        assert_eq!(registry.active_channels().await.len(), 4);

        registry.stop_all().await;
        assert!(registry.active_channels().await.is_empty());
        for channel in 1..=4u16 {
            assert_eq!(
                registry.status(ChannelId(channel)).await,
                ChannelStatus::Idle
            );
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_try_start_fails_while_busy() {
        let registry = TransmitterRegistry::new();
        let (bus_tx, _bus_rx) = mpsc::channel(8);
        let bus = Arc::new(bus_tx);

        // Hold the channel gate as a concurrent stop would
        let gate = registry.gate(ChannelId(1)).await;
        let guard = gate.lock().await;
        let err = registry
            .try_request_start(ChannelId(1), config(1, 0x64, 1), bus.clone())
            .await
            .unwrap_err();
        assert_eq!(err, RegistryError::AlreadyStopping(ChannelId(1)));

        // Other channels are not held up
        registry
            .try_request_start(ChannelId(2), config(2, 0x6E, 1), bus.clone())
            .await
            .unwrap();
        assert_eq!(registry.status(ChannelId(2)).await, ChannelStatus::Running);
        drop(guard);

        registry
            .try_request_start(ChannelId(1), config(1, 0x64, 1), bus)
            .await
            .unwrap();
        registry.stop_all().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_status_events() {
        let registry = TransmitterRegistry::new();
        let mut events = registry.subscribe();
        let (bus_tx, _bus_rx) = mpsc::channel(64);

        registry
            .request_start(ChannelId(3), config(3, 0x78, 1), Arc::new(bus_tx))
            .await
            .unwrap();
        registry.request_stop(ChannelId(3)).await;

        let mut statuses = Vec::new();
        while let Ok(event) = events.try_recv() {
            if let Some(status) = event.status() {
                statuses.push(status);
            }
        }
        assert_eq!(statuses, vec![ChannelStatus::Running, ChannelStatus::Idle]);
    }
}
