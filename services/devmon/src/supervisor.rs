//! Starts one monitor task per enabled device and waits for them to stop

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::config::{Config, DeviceConfig};
use crate::dispatcher::NotificationDispatcher;
use crate::fetcher::StateFetcher;
use crate::monitor::{DeviceMonitor, MonitorStats};
use crate::status::StatusBoard;

/// Builds the state fetcher for a device
pub type FetcherFactory =
    Arc<dyn Fn(&DeviceConfig) -> crate::Result<Arc<dyn StateFetcher>> + Send + Sync>;

/// Owns the monitors until they are spawned
#[derive(Debug)]
pub struct MonitorSupervisor {
    monitors: Vec<DeviceMonitor>,
    board: StatusBoard,
}

impl MonitorSupervisor {
    /// Create a monitor for every enabled device. Disabled devices are skipped entirely.
    pub fn from_config(
        config: &Config,
        fetcher_factory: &FetcherFactory,
        dispatcher: Arc<NotificationDispatcher>,
    ) -> crate::Result<Self> {
        let groups = Arc::new(config.groups.clone());
        let mut monitors = Vec::new();

        for device in &config.devices {
            if !device.enabled {
                tracing::debug!("Device '{}' is disabled, not monitoring", device.name);
                continue;
            }

            let fetcher = fetcher_factory(device)?;
            let monitor = DeviceMonitor::new(
                device.clone(),
                fetcher,
                Arc::clone(&dispatcher),
                Arc::clone(&groups),
            )
            .with_shutdown_grace(config.shutdown_grace);
            monitors.push(monitor);
        }

        let board = StatusBoard::new(monitors.iter().map(DeviceMonitor::subscribe).collect());
        Ok(Self { monitors, board })
    }

    pub fn from_monitors(monitors: Vec<DeviceMonitor>) -> Self {
        let board = StatusBoard::new(monitors.iter().map(DeviceMonitor::subscribe).collect());
        Self { monitors, board }
    }

    pub fn len(&self) -> usize {
        self.monitors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.monitors.is_empty()
    }

    pub fn status_board(&self) -> StatusBoard {
        self.board.clone()
    }

    /// Run every monitor until cancellation. Returns the final counters of
    /// the monitors that stopped normally.
    pub async fn run(self, cancel: CancellationToken) -> Vec<MonitorStats> {
        if self.monitors.is_empty() {
            tracing::warn!("No enabled devices to monitor");
            cancel.cancelled().await;
            return Vec::new();
        }

        let mut handles = Vec::new();
        for monitor in self.monitors {
            let name = monitor.device().name.clone();
            let cancel = cancel.clone();
            handles.push((name, tokio::spawn(monitor.run(cancel))));
        }
        tracing::info!("Started {} device monitors", handles.len());

        let mut finished = Vec::new();
        for (name, handle) in handles {
            match handle.await {
                Ok(stats) => finished.push(stats),
                Err(e) => tracing::error!("Monitor task for '{}' ended abnormally: {}", name, e),
            }
        }
        finished
    }
}
