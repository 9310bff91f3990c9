//! BDD test world for devmon service

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use cucumber::World;
use devmon::channel::Channel;
use devmon::config::{ChannelKind, Config, DeviceConfig};
use devmon::io::{HttpAuth, HttpClient, HttpResponse};
use devmon::monitor::{CycleOutcome, DeviceMonitor};
use devmon::render::Digest;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Default, World)]
pub struct DevmonWorld {
    // Monitoring a single device
    pub config: Config,
    pub http: Arc<ScriptedHttpClient>,
    pub failing_channels: Vec<ChannelKind>,
    pub channels: Vec<Arc<RecordingChannel>>,
    pub monitor: Option<DeviceMonitor>,
    pub outcomes: Vec<CycleOutcome>,

    // Builder and lifecycle
    pub lifecycle_cancel: Option<CancellationToken>,
    pub lifecycle_build_succeeded: Option<bool>,
    pub lifecycle_start_succeeded: Option<bool>,
    pub lifecycle_board_len: Option<usize>,
}

impl DevmonWorld {
    pub fn device_mut(&mut self) -> &mut DeviceConfig {
        self.config
            .devices
            .first_mut()
            .expect("no device configured; add a 'Given a device' step")
    }

    pub fn channel(&self, kind: ChannelKind) -> Arc<RecordingChannel> {
        self.channels
            .iter()
            .find(|c| c.kind == kind)
            .cloned()
            .unwrap_or_else(|| panic!("no {} channel was created", kind))
    }
}

/// Parse a channel name as written in configuration files
pub fn channel_kind(word: &str) -> ChannelKind {
    serde_json::from_value(serde_json::Value::String(word.to_string()))
        .unwrap_or_else(|e| panic!("unknown channel '{}': {}", word, e))
}

// --- Test doubles ---

/// Serves queued responses to GET requests in order
#[derive(Debug, Default)]
pub struct ScriptedHttpClient {
    responses: Mutex<VecDeque<HttpResponse>>,
    pub requests: Mutex<Vec<String>>,
}

impl ScriptedHttpClient {
    pub fn push(&self, status: u16, body: &str) {
        self.responses.lock().unwrap().push_back(HttpResponse {
            status,
            body: body.to_string(),
        });
    }
}

#[async_trait::async_trait]
impl HttpClient for ScriptedHttpClient {
    async fn get(&self, url: &str) -> devmon::Result<HttpResponse> {
        self.requests.lock().unwrap().push(url.to_string());
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| devmon::DevmonError::Http(format!("no scripted response for {}", url)))
    }

    async fn post_form(
        &self,
        url: &str,
        _auth: &HttpAuth,
        _params: &[(&str, &str)],
    ) -> devmon::Result<HttpResponse> {
        Err(devmon::DevmonError::Http(format!("unexpected POST {}", url)))
    }

    async fn post_json(
        &self,
        url: &str,
        _auth: &HttpAuth,
        _body: &serde_json::Value,
    ) -> devmon::Result<HttpResponse> {
        Err(devmon::DevmonError::Http(format!("unexpected POST {}", url)))
    }
}

/// One attempted delivery
#[derive(Debug, Clone)]
pub struct Delivery {
    pub to: String,
    pub digest: Digest,
    pub success: bool,
}

/// Channel that records every delivery attempt and optionally fails them all
#[derive(Debug)]
pub struct RecordingChannel {
    pub kind: ChannelKind,
    pub succeed: bool,
    pub deliveries: Mutex<Vec<Delivery>>,
}

impl RecordingChannel {
    pub fn new(kind: ChannelKind, succeed: bool) -> Self {
        Self {
            kind,
            succeed,
            deliveries: Mutex::new(Vec::new()),
        }
    }

    pub fn delivered_to(&self, address: &str) -> Vec<Digest> {
        self.deliveries
            .lock()
            .unwrap()
            .iter()
            .filter(|d| d.success && d.to == address)
            .map(|d| d.digest.clone())
            .collect()
    }

    pub fn successful(&self) -> usize {
        self.deliveries
            .lock()
            .unwrap()
            .iter()
            .filter(|d| d.success)
            .count()
    }

    pub fn attempts(&self) -> usize {
        self.deliveries.lock().unwrap().len()
    }
}

#[async_trait::async_trait]
impl Channel for RecordingChannel {
    fn kind(&self) -> ChannelKind {
        self.kind
    }

    async fn send(&self, to: &str, digest: &Digest) -> devmon::Result<()> {
        self.deliveries.lock().unwrap().push(Delivery {
            to: to.to_string(),
            digest: digest.clone(),
            success: self.succeed,
        });
        if self.succeed {
            Ok(())
        } else {
            Err(devmon::DevmonError::Channel {
                channel: self.kind.to_string(),
                message: "simulated outage".to_string(),
            })
        }
    }
}
