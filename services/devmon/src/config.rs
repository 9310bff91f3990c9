//! Configuration types for the devmon service

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Prefix marking a secret that is read from the environment
const ENV_SECRET_PREFIX: &str = "env:";

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub global: GlobalConfig,
    #[serde(default)]
    pub devices: Vec<DeviceConfig>,
    #[serde(default)]
    pub groups: GroupTable,
    #[serde(default)]
    pub dashboard: DashboardConfig,
    /// How long an in-flight poll cycle may keep running after shutdown is requested
    #[serde(default = "default_shutdown_grace", with = "humantime_serde")]
    pub shutdown_grace: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            global: GlobalConfig::default(),
            devices: Vec::new(),
            groups: GroupTable::new(),
            dashboard: DashboardConfig::default(),
            shutdown_grace: default_shutdown_grace(),
        }
    }
}

/// Group name to group configuration, shared read-only by every monitor
pub type GroupTable = BTreeMap<String, GroupConfig>;

/// Settings shared by all outbound channel clients
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GlobalConfig {
    #[serde(default)]
    pub sendgrid: SendGridConfig,
    #[serde(default)]
    pub twilio: TwilioConfig,
    #[serde(default)]
    pub smtp: SmtpConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SendGridConfig {
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub from_address: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TwilioConfig {
    #[serde(default)]
    pub account_sid: String,
    #[serde(default)]
    pub auth_token: String,
    #[serde(default)]
    pub from_number: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmtpConfig {
    #[serde(default)]
    pub host: String,
    #[serde(default = "default_smtp_port")]
    pub port: u16,
    /// Upgrade the connection with STARTTLS
    #[serde(default)]
    pub use_tls: bool,
    #[serde(default)]
    pub use_auth: bool,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub from_address: String,
    #[serde(default = "default_smtp_timeout", with = "humantime_serde")]
    pub timeout: Duration,
}

impl Default for SmtpConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: default_smtp_port(),
            use_tls: false,
            use_auth: false,
            username: String::new(),
            password: String::new(),
            from_address: String::new(),
            timeout: default_smtp_timeout(),
        }
    }
}

/// A polled device
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceConfig {
    pub name: String,
    #[serde(default)]
    pub enabled: bool,
    pub address: String,
    #[serde(default = "default_device_port")]
    pub port: u16,
    #[serde(default)]
    pub use_tls: bool,
    /// Devices commonly serve self-signed certificates
    #[serde(default = "default_true")]
    pub accept_invalid_certs: bool,
    #[serde(default = "default_resource_path")]
    pub resource_path: String,
    #[serde(default = "default_request_timeout", with = "humantime_serde")]
    pub request_timeout: Duration,
    #[serde(default)]
    pub poll_interval: PollIntervalConfig,
    #[serde(default)]
    pub fields: Vec<FieldConfig>,
}

impl DeviceConfig {
    /// URL of the device's state document
    pub fn request_url(&self) -> String {
        let scheme = if self.use_tls { "https" } else { "http" };
        format!(
            "{}://{}:{}/{}",
            scheme,
            self.address,
            self.port,
            self.resource_path.trim_start_matches('/')
        )
    }

    /// Short identity used in log lines and notification headers
    pub fn identity(&self) -> DeviceIdentity<'_> {
        DeviceIdentity(self)
    }
}

/// Displays a device as `name (address:port)`
#[derive(Debug, Clone, Copy)]
pub struct DeviceIdentity<'a>(&'a DeviceConfig);

impl fmt::Display for DeviceIdentity<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}:{})", self.0.name, self.0.address, self.0.port)
    }
}

/// Poll interval with jitter bounds; the wait is `base + uniform(jitter_min..=jitter_max)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollIntervalConfig {
    #[serde(default = "default_poll_base", with = "humantime_serde")]
    pub base: Duration,
    #[serde(default, with = "humantime_serde")]
    pub jitter_min: Duration,
    #[serde(default = "default_jitter_max", with = "humantime_serde")]
    pub jitter_max: Duration,
}

impl Default for PollIntervalConfig {
    fn default() -> Self {
        Self {
            base: default_poll_base(),
            jitter_min: Duration::ZERO,
            jitter_max: default_jitter_max(),
        }
    }
}

/// One field of a device's state document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldConfig {
    pub name: String,
    #[serde(default)]
    pub enabled: bool,
    pub group: String,
}

/// A subscription unit referenced by fields
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GroupConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub notification_methods: Vec<NotificationMethodConfig>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationMethodConfig {
    #[serde(rename = "type")]
    pub kind: ChannelKind,
    pub address: String,
    #[serde(default)]
    pub enabled: bool,
}

/// The closed set of outbound channels
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelKind {
    /// Transactional email through the SendGrid v3 API
    #[serde(rename = "sendgrid")]
    SendGrid,
    /// SMS through the Twilio Messages API
    Twilio,
    /// Email through an SMTP relay
    Smtp,
}

impl fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChannelKind::SendGrid => write!(f, "sendgrid"),
            ChannelKind::Twilio => write!(f, "twilio"),
            ChannelKind::Smtp => write!(f, "smtp"),
        }
    }
}

/// Status dashboard configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_dashboard_port")]
    pub port: u16,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            port: default_dashboard_port(),
        }
    }
}

impl Config {
    /// Replace `env:NAME` secrets with the value of the environment variable `NAME`
    pub fn resolve_secrets(&mut self) -> crate::Result<()> {
        let global = &mut self.global;
        for (label, value) in [
            ("sendgrid.api_key", &mut global.sendgrid.api_key),
            ("twilio.account_sid", &mut global.twilio.account_sid),
            ("twilio.auth_token", &mut global.twilio.auth_token),
            ("smtp.password", &mut global.smtp.password),
        ] {
            if let Some(var) = value.strip_prefix(ENV_SECRET_PREFIX) {
                let resolved = std::env::var(var).map_err(|_| {
                    crate::DevmonError::Config(format!(
                        "{} refers to environment variable {} which is not set",
                        label, var
                    ))
                })?;
                tracing::debug!("Resolved {} from environment variable {}", label, var);
                *value = resolved;
            }
        }
        Ok(())
    }

    /// Devices that should be monitored
    pub fn enabled_devices(&self) -> impl Iterator<Item = &DeviceConfig> {
        self.devices.iter().filter(|d| d.enabled)
    }

    /// `(device, field, group)` for every field whose group is not in the group table
    pub fn dangling_group_refs(&self) -> Vec<(String, String, String)> {
        self.devices
            .iter()
            .flat_map(|device| {
                device
                    .fields
                    .iter()
                    .filter(|field| !self.groups.contains_key(&field.group))
                    .map(|field| {
                        (
                            device.name.clone(),
                            field.name.clone(),
                            field.group.clone(),
                        )
                    })
            })
            .collect()
    }

    /// A sample configuration showing every section
    pub fn example() -> Self {
        let field = |name: &str, enabled: bool, group: &str| FieldConfig {
            name: name.to_string(),
            enabled,
            group: group.to_string(),
        };
        let method = |kind: ChannelKind, address: &str, enabled: bool| NotificationMethodConfig {
            kind,
            address: address.to_string(),
            enabled,
        };

        let mut groups = GroupTable::new();
        groups.insert(
            "Group1".to_string(),
            GroupConfig {
                enabled: true,
                notification_methods: vec![
                    method(ChannelKind::SendGrid, "to@address.com", true),
                    method(ChannelKind::Smtp, "to@address.com", false),
                ],
            },
        );
        groups.insert(
            "Group2".to_string(),
            GroupConfig {
                enabled: true,
                notification_methods: vec![
                    method(ChannelKind::Twilio, "+15615551212", true),
                    method(ChannelKind::Twilio, "+15615557777", false),
                ],
            },
        );

        Self {
            global: GlobalConfig {
                sendgrid: SendGridConfig {
                    api_key: "env:SENDGRID_API_KEY".to_string(),
                    from_address: "from@address.com".to_string(),
                },
                twilio: TwilioConfig {
                    account_sid: "env:TWILIO_ACCOUNT_SID".to_string(),
                    auth_token: "env:TWILIO_AUTH_TOKEN".to_string(),
                    from_number: "+15615550100".to_string(),
                },
                smtp: SmtpConfig {
                    host: "smtp.server.com".to_string(),
                    from_address: "from@address.com".to_string(),
                    ..SmtpConfig::default()
                },
            },
            devices: vec![
                DeviceConfig {
                    name: "Example 1".to_string(),
                    enabled: true,
                    address: "192.168.1.50".to_string(),
                    port: 80,
                    use_tls: false,
                    accept_invalid_certs: true,
                    resource_path: "stateFull.xml".to_string(),
                    request_timeout: default_request_timeout(),
                    poll_interval: PollIntervalConfig::default(),
                    fields: vec![
                        field("input0state", true, "Group1"),
                        field("input1state", true, "Group2"),
                    ],
                },
                DeviceConfig {
                    name: "Example 2".to_string(),
                    enabled: false,
                    address: "192.168.1.51".to_string(),
                    port: 443,
                    use_tls: true,
                    accept_invalid_certs: true,
                    resource_path: "state.xml".to_string(),
                    request_timeout: default_request_timeout(),
                    poll_interval: PollIntervalConfig::default(),
                    fields: vec![
                        field("input0state", false, "Group1"),
                        field("input1state", true, "Group2"),
                    ],
                },
            ],
            groups,
            dashboard: DashboardConfig::default(),
            shutdown_grace: default_shutdown_grace(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_device_port() -> u16 {
    80
}

fn default_resource_path() -> String {
    "state.xml".to_string()
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_poll_base() -> Duration {
    Duration::from_secs(60)
}

fn default_jitter_max() -> Duration {
    Duration::from_secs(5)
}

fn default_smtp_port() -> u16 {
    25
}

fn default_smtp_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_dashboard_port() -> u16 {
    11120
}

fn default_shutdown_grace() -> Duration {
    Duration::from_secs(5)
}

/// Load configuration from a JSON file
pub fn load_config(path: &Path) -> crate::Result<Config> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        crate::DevmonError::Config(format!("Failed to read config file {:?}: {}", path, e))
    })?;
    let config: Config = serde_json::from_str(&content)?;
    Ok(config)
}
