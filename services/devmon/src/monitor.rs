//! Per-device poll loop: fetch, diff against the baseline, route, dispatch, sleep

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use futures::FutureExt;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::config::{DeviceConfig, GroupTable};
use crate::diff::{diff, ChangeSet, StateSnapshot};
use crate::dispatcher::{DispatchSummary, NotificationDispatcher};
use crate::fetcher::StateFetcher;
use crate::router;
use crate::schedule::PollScheduler;

/// Consecutive fetch failures after which a louder warning is logged
const FETCH_ERROR_WARN_THRESHOLD: u32 = 5;

const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Cumulative per-device counters, published after every cycle
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonitorStats {
    pub device: String,
    pub endpoint: String,
    /// Successful fetches, including the baseline
    pub polls_total: u64,
    pub polls_unchanged: u64,
    pub polls_changed: u64,
    pub fetch_errors: u64,
    pub consecutive_fetch_errors: u32,
    pub notifications_sent: u64,
    pub notifications_failed: u64,
    pub last_poll_epoch_ms: Option<u64>,
    pub last_change_epoch_ms: Option<u64>,
    pub last_error: Option<String>,
}

/// What a single cycle did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// No snapshot this cycle; the baseline is untouched
    FetchFailed,
    /// First successful fetch, stored without routing
    Baseline,
    Unchanged,
    Changed {
        changes: ChangeSet,
        recipients: usize,
        summary: DispatchSummary,
    },
}

/// Monitors one device. Owns its baseline and counters exclusively.
pub struct DeviceMonitor {
    device: DeviceConfig,
    fetcher: Arc<dyn StateFetcher>,
    dispatcher: Arc<NotificationDispatcher>,
    groups: Arc<GroupTable>,
    scheduler: PollScheduler,
    shutdown_grace: Duration,
    baseline: Option<StateSnapshot>,
    stats: MonitorStats,
    publisher: watch::Sender<MonitorStats>,
}

impl std::fmt::Debug for DeviceMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceMonitor")
            .field("device", &self.device.name)
            .field("scheduler", &self.scheduler)
            .field("stats", &self.stats)
            .finish()
    }
}

impl DeviceMonitor {
    pub fn new(
        device: DeviceConfig,
        fetcher: Arc<dyn StateFetcher>,
        dispatcher: Arc<NotificationDispatcher>,
        groups: Arc<GroupTable>,
    ) -> Self {
        let stats = MonitorStats {
            device: device.name.clone(),
            endpoint: format!("{}:{}", device.address, device.port),
            ..MonitorStats::default()
        };
        let (publisher, _) = watch::channel(stats.clone());

        Self {
            scheduler: PollScheduler::new(&device.poll_interval),
            device,
            fetcher,
            dispatcher,
            groups,
            shutdown_grace: DEFAULT_SHUTDOWN_GRACE,
            baseline: None,
            stats,
            publisher,
        }
    }

    pub fn with_scheduler(mut self, scheduler: PollScheduler) -> Self {
        self.scheduler = scheduler;
        self
    }

    pub fn with_shutdown_grace(mut self, grace: Duration) -> Self {
        self.shutdown_grace = grace;
        self
    }

    pub fn device(&self) -> &DeviceConfig {
        &self.device
    }

    pub fn stats(&self) -> &MonitorStats {
        &self.stats
    }

    pub fn baseline(&self) -> Option<&StateSnapshot> {
        self.baseline.as_ref()
    }

    /// Receiver that always holds the latest published counters
    pub fn subscribe(&self) -> watch::Receiver<MonitorStats> {
        self.publisher.subscribe()
    }

    /// Run one fetch/diff/route/dispatch cycle
    pub async fn poll_once(&mut self) -> CycleOutcome {
        tracing::debug!("Polling {}", self.device.identity());

        let outcome = match self.fetcher.fetch().await {
            Err(e) => {
                self.stats.fetch_errors += 1;
                self.stats.consecutive_fetch_errors += 1;
                self.stats.last_error = Some(e.to_string());
                if e.is_fetch_error() {
                    tracing::warn!("Fetch from {} failed: {}", self.device.identity(), e);
                } else {
                    tracing::error!("Unexpected error polling {}: {}", self.device.identity(), e);
                }
                if self.stats.consecutive_fetch_errors == FETCH_ERROR_WARN_THRESHOLD {
                    tracing::warn!(
                        "{} has failed {} consecutive polls",
                        self.device.identity(),
                        FETCH_ERROR_WARN_THRESHOLD
                    );
                }
                CycleOutcome::FetchFailed
            }
            Ok(snapshot) => {
                let now_ms = current_epoch_ms();
                self.stats.polls_total += 1;
                self.stats.consecutive_fetch_errors = 0;
                self.stats.last_poll_epoch_ms = Some(now_ms);

                let outcome = match &self.baseline {
                    None => {
                        tracing::info!(
                            "Baseline for {} holds {} fields",
                            self.device.identity(),
                            snapshot.len()
                        );
                        CycleOutcome::Baseline
                    }
                    Some(previous) => {
                        let changes = diff(previous, &snapshot);
                        if changes.is_empty() {
                            self.stats.polls_unchanged += 1;
                            CycleOutcome::Unchanged
                        } else {
                            self.stats.polls_changed += 1;
                            self.stats.last_change_epoch_ms = Some(now_ms);
                            tracing::info!(
                                "{} changed: {}",
                                self.device.identity(),
                                changes
                                    .iter()
                                    .map(|(k, v)| format!("{}={}", k, v))
                                    .collect::<Vec<_>>()
                                    .join(", ")
                            );

                            let recipients = router::resolve(&self.device, &changes, &self.groups);
                            if recipients.is_empty() {
                                tracing::debug!(
                                    "No recipients subscribed to the changes on '{}'",
                                    self.device.name
                                );
                            }
                            let summary = self
                                .dispatcher
                                .dispatch(&self.device, &changes, &recipients)
                                .await;
                            self.stats.notifications_sent += summary.sent();
                            self.stats.notifications_failed += summary.failed();

                            CycleOutcome::Changed {
                                changes,
                                recipients: recipients.len(),
                                summary,
                            }
                        }
                    }
                };

                self.baseline = Some(snapshot);
                outcome
            }
        };

        self.publisher.send_replace(self.stats.clone());
        tracing::debug!(
            "Poll of '{}' done: {} total, {} changed, {} unchanged, {} fetch errors",
            self.device.name,
            self.stats.polls_total,
            self.stats.polls_changed,
            self.stats.polls_unchanged,
            self.stats.fetch_errors
        );
        outcome
    }

    /// Poll until cancelled. Returns the final counters.
    pub async fn run(mut self, cancel: CancellationToken) -> MonitorStats {
        tracing::info!("Monitoring {}", self.device.identity());

        loop {
            if cancel.is_cancelled() || !self.cycle_or_shutdown(&cancel).await {
                break;
            }

            let delay = self.scheduler.next_delay();
            tracing::debug!(
                "Next poll of '{}' in {}",
                self.device.name,
                humantime::format_duration(delay)
            );

            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = cancel.cancelled() => break,
            }
        }

        tracing::info!("Stopped monitoring {}", self.device.identity());
        self.stats
    }

    /// Run one cycle. On cancellation the cycle gets the grace period to
    /// finish; returns false once shutdown has been requested. A panic inside
    /// the cycle is logged and the monitor keeps going.
    async fn cycle_or_shutdown(&mut self, cancel: &CancellationToken) -> bool {
        let grace = self.shutdown_grace;
        let identity = self.device.identity().to_string();

        let cycle = AssertUnwindSafe(self.poll_once()).catch_unwind();
        tokio::pin!(cycle);

        tokio::select! {
            result = &mut cycle => {
                if let Err(payload) = result {
                    tracing::error!(
                        "Poll of {} panicked: {}",
                        identity,
                        panic_message(payload.as_ref())
                    );
                }
                return true;
            }
            _ = cancel.cancelled() => {}
        }

        match tokio::time::timeout(grace, &mut cycle).await {
            Ok(Ok(_)) => {
                tracing::debug!("In-flight poll of {} finished during shutdown", identity)
            }
            Ok(Err(payload)) => tracing::error!(
                "Poll of {} panicked during shutdown: {}",
                identity,
                panic_message(payload.as_ref())
            ),
            Err(_) => tracing::warn!(
                "Abandoning in-flight poll of {} after {} grace period",
                identity,
                humantime::format_duration(grace)
            ),
        }
        false
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message
    } else {
        "unknown panic payload"
    }
}

fn current_epoch_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
