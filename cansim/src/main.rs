//! CAN Frame Transmission Simulator
//!
//! Starts the configured channels on a virtual bus, prints the traffic and
//! stops every channel on Ctrl-C.
//!
//! Usage: `cansim [settings.json]`. Without an argument the settings are
//! read from `$XDG_CONFIG_HOME/cansim/settings.json`, or four default
//! channels are used.

mod monitor;
mod settings;

use std::future::Future;
use std::path::Path;
use std::sync::Arc;

use can_sched::{ChannelId, TransmitterRegistry};
use can_sim::VirtualBus;
use monitor::{run_monitor, MonitorSummary};
use settings::Settings;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "cansim=info,can_frame=info,can_sched=info,can_sim=info".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let settings = match std::env::args().nth(1) {
        Some(path) => Settings::load_from(Path::new(&path))?,
        None => Settings::load(),
    };

    info!(
        "Starting CAN simulator on {} with {} channels",
        settings.interface,
        settings.channels.len()
    );

    let summary = run_simulation(settings, async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl-C: {}", e);
        }
    })
    .await;

    info!(
        "Simulator stopped after {} frames ({} errors)",
        summary.total_frames(),
        summary.errors
    );
    Ok(())
}

/// Run every configured channel until `shutdown` completes
async fn run_simulation<F>(settings: Settings, shutdown: F) -> MonitorSummary
where
    F: Future<Output = ()>,
{
    let registry = TransmitterRegistry::with_event_capacity(settings.event_buffer);
    registry.set_options(settings.transmitter_options()).await;
    let bus = Arc::new(
        VirtualBus::new(settings.interface.clone()).with_history(settings.bus_history),
    );
    let monitor = tokio::spawn(run_monitor(registry.subscribe()));

    for channel in &settings.channels {
        let channel_id = ChannelId(channel.channel_id);
        if let Err(e) = registry
            .request_start_from_input(channel_id, &channel.input, bus.clone())
            .await
        {
            error!("Channel {} not started: {}", channel_id, e);
        }
    }

    shutdown.await;
    info!("Shutting down");
    registry.stop_all().await;

    // Closing the event channel ends the monitor
    drop(registry);
    match monitor.await {
        Ok(summary) => summary,
        Err(e) => {
            error!("Traffic monitor failed: {}", e);
            MonitorSummary::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use can_frame::ChannelInput;
    use can_sched::ChannelStatus;

    use super::*;
    use settings::ChannelSettings;

    fn channel(channel_id: u16, id: &str, interval: &str) -> ChannelSettings {
        ChannelSettings {
            channel_id,
            input: ChannelInput {
                arbitration_id: id.to_string(),
                data: vec!["01".to_string(), "02".to_string()],
                interval: interval.to_string(),
                randomize: false,
            },
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_simulation() {
        let settings = Settings {
            channels: vec![
                channel(1, "64", "1"),
                channel(2, "6E", "0"),
                channel(3, "ZZZ", "1"),
            ],
            ..Settings::default()
        };

        let summary = run_simulation(
            settings,
            tokio::time::sleep(Duration::from_millis(2500)),
        )
        .await;

        assert_eq!(summary.frames.get(&ChannelId(1)), Some(&3));
        assert_eq!(summary.frames.get(&ChannelId(2)), Some(&1));
        assert_eq!(summary.frames.get(&ChannelId(3)), None);
        assert_eq!(summary.errors, 1);
        assert_eq!(
            summary.statuses.get(&ChannelId(1)),
            Some(&ChannelStatus::Idle)
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_single_shot_channels_end_idle() {
        let settings = Settings {
            channels: (1..=8).map(|ch| channel(ch, "6E", "0")).collect(),
            ..Settings::default()
        };

        let summary = run_simulation(
            settings,
            tokio::time::sleep(Duration::from_millis(200)),
        )
        .await;

        assert_eq!(summary.total_frames(), 8);
        for ch in 1..=8 {
            assert_eq!(
                summary.statuses.get(&ChannelId(ch)),
                Some(&ChannelStatus::Idle)
            );
        }
    }
}
