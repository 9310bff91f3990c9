//! Read-only view over every monitor's published counters

use std::time::Instant;

use tokio::sync::watch;

use crate::monitor::MonitorStats;

/// Cloneable handle to the latest counters of every running monitor
#[derive(Debug, Clone)]
pub struct StatusBoard {
    receivers: Vec<watch::Receiver<MonitorStats>>,
    started_at: Instant,
}

impl StatusBoard {
    pub fn new(receivers: Vec<watch::Receiver<MonitorStats>>) -> Self {
        Self {
            receivers,
            started_at: Instant::now(),
        }
    }

    /// Current counters, one entry per monitor in configuration order
    pub fn snapshot(&self) -> Vec<MonitorStats> {
        self.receivers.iter().map(|rx| rx.borrow().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.receivers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.receivers.is_empty()
    }

    pub fn uptime_secs(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }
}
