//! Devmon - device state polling and change notification service
//!
//! Polls HTTP devices for an XML state document, detects field changes, and
//! notifies the recipients subscribed to the changed fields by email and SMS.

pub mod channel;
pub mod config;
pub mod dashboard;
pub mod diff;
pub mod dispatcher;
pub mod error;
pub mod fetcher;
pub mod io;
pub mod monitor;
pub mod render;
pub mod router;
pub mod schedule;
pub mod sendgrid;
pub mod smtp;
pub mod status;
pub mod supervisor;
pub mod twilio;

pub use config::{load_config, Config};
pub use error::{DevmonError, Result};

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::channel::Channel;
use crate::config::DeviceConfig;
use crate::dispatcher::NotificationDispatcher;
use crate::fetcher::{HttpStateFetcher, StateFetcher};
use crate::io::{HttpClient, HttpClientOptions, ReqwestHttpClient};
use crate::sendgrid::SendGridChannel;
use crate::smtp::SmtpChannel;
use crate::status::StatusBoard;
use crate::supervisor::{FetcherFactory, MonitorSupervisor};
use crate::twilio::TwilioChannel;

/// Wires configuration into a runnable [`Devmon`], with injection points for tests
pub struct DevmonBuilder {
    config: Config,
    http_client: Option<Arc<dyn HttpClient>>,
    fetcher_factory: Option<FetcherFactory>,
    channels: Option<Vec<Arc<dyn Channel>>>,
    cancel: Option<CancellationToken>,
}

impl DevmonBuilder {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            http_client: None,
            fetcher_factory: None,
            channels: None,
            cancel: None,
        }
    }

    /// Use one HTTP client for every device fetch and every HTTP-based channel
    pub fn with_http_client(mut self, http: Arc<dyn HttpClient>) -> Self {
        self.http_client = Some(http);
        self
    }

    pub fn with_fetcher_factory(mut self, factory: FetcherFactory) -> Self {
        self.fetcher_factory = Some(factory);
        self
    }

    /// Replace the channels built from the `global` section
    pub fn with_channels(mut self, channels: Vec<Arc<dyn Channel>>) -> Self {
        self.channels = Some(channels);
        self
    }

    pub fn with_cancellation_token(mut self, cancel: CancellationToken) -> Self {
        self.cancel = Some(cancel);
        self
    }

    pub async fn build(self) -> Result<Devmon> {
        for (device, field, group) in self.config.dangling_group_refs() {
            tracing::warn!(
                "Field '{}' of device '{}' refers to unknown group '{}'",
                field,
                device,
                group
            );
        }

        let channels = match self.channels {
            Some(channels) => channels,
            None => {
                let http: Arc<dyn HttpClient> = match &self.http_client {
                    Some(http) => Arc::clone(http),
                    None => Arc::new(ReqwestHttpClient::new(HttpClientOptions::default())?),
                };
                build_channels(&self.config, http)?
            }
        };
        tracing::debug!(
            "Configured channels: {:?}",
            channels.iter().map(|c| c.kind()).collect::<Vec<_>>()
        );
        let dispatcher = Arc::new(NotificationDispatcher::new(channels));

        let factory = match (self.fetcher_factory, self.http_client) {
            (Some(factory), _) => factory,
            (None, Some(http)) => shared_client_factory(http),
            (None, None) => per_device_client_factory(),
        };

        let supervisor = MonitorSupervisor::from_config(&self.config, &factory, dispatcher)?;
        tracing::debug!("Built {} device monitors", supervisor.len());

        Ok(Devmon {
            config: self.config,
            supervisor,
            cancel: self.cancel.unwrap_or_default(),
        })
    }
}

/// Build a channel client for every channel that has settings in `global`
fn build_channels(config: &Config, http: Arc<dyn HttpClient>) -> Result<Vec<Arc<dyn Channel>>> {
    let global = &config.global;
    let mut channels: Vec<Arc<dyn Channel>> = Vec::new();

    if !global.sendgrid.api_key.is_empty() {
        channels.push(Arc::new(SendGridChannel::new(
            &global.sendgrid,
            Arc::clone(&http),
        )));
    }
    if !global.twilio.account_sid.is_empty() {
        channels.push(Arc::new(TwilioChannel::new(&global.twilio, Arc::clone(&http))));
    }
    if !global.smtp.host.is_empty() {
        channels.push(Arc::new(SmtpChannel::new(&global.smtp)?));
    }
    Ok(channels)
}

fn shared_client_factory(http: Arc<dyn HttpClient>) -> FetcherFactory {
    Arc::new(move |device: &DeviceConfig| -> Result<Arc<dyn StateFetcher>> {
        Ok(Arc::new(HttpStateFetcher::new(device, Arc::clone(&http))))
    })
}

/// Each device gets its own client carrying its TLS policy and timeout
fn per_device_client_factory() -> FetcherFactory {
    Arc::new(|device: &DeviceConfig| -> Result<Arc<dyn StateFetcher>> {
        let http = ReqwestHttpClient::new(HttpClientOptions::for_device(device))?;
        Ok(Arc::new(HttpStateFetcher::new(device, Arc::new(http))))
    })
}

/// A built service, ready to run
#[derive(Debug)]
pub struct Devmon {
    config: Config,
    supervisor: MonitorSupervisor,
    cancel: CancellationToken,
}

impl Devmon {
    pub fn status_board(&self) -> StatusBoard {
        self.supervisor.status_board()
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Run until Ctrl-C or until the cancellation token is cancelled
    pub async fn start(self) -> Result<()> {
        let cancel_for_signal = self.cancel.clone();
        tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    tracing::info!("Shutdown signal received");
                    cancel_for_signal.cancel();
                }
                Err(e) => tracing::error!("Failed to listen for ctrl-c: {}", e),
            }
        });

        if self.config.dashboard.enabled {
            let board = self.supervisor.status_board();
            let port = self.config.dashboard.port;
            let cancel_for_dashboard = self.cancel.clone();
            tokio::spawn(async move {
                if let Err(e) = dashboard::serve(board, port, cancel_for_dashboard).await {
                    tracing::error!("{}. Continuing without dashboard.", e);
                }
            });
        }

        tracing::info!("Devmon started");
        let stats = self.supervisor.run(self.cancel).await;
        for s in &stats {
            tracing::info!(
                "'{}': {} polls ({} changed, {} unchanged), {} fetch errors, {} sent, {} failed",
                s.device,
                s.polls_total,
                s.polls_changed,
                s.polls_unchanged,
                s.fetch_errors,
                s.notifications_sent,
                s.notifications_failed
            );
        }
        tracing::info!("Devmon stopped");

        Ok(())
    }
}
