use std::net::SocketAddr;
use std::time::Duration;

use anyhow::Context;
use tracing::trace;

use crate::WorkloadKind;
use crate::actors::ingest::DEFAULT_QUEUE_CAPACITY;

/// Sink backend selection
#[derive(Debug, Clone, PartialEq, serde::Deserialize)]
#[serde(tag = "backend", rename_all = "lowercase")]
pub enum SinkBackend {
    /// In-memory sink (no persistence)
    #[serde(rename = "none")]
    None,

    /// InfluxDB 1.x over HTTP
    Influxdb {
        #[serde(default = "default_influx_url")]
        url: String,
        username: Option<String>,
        password: Option<String>,
        #[serde(default = "default_skip_tls_verify")]
        skip_tls_verify: bool,
    },
}

impl Default for SinkBackend {
    fn default() -> Self {
        SinkBackend::Influxdb {
            url: default_influx_url(),
            username: None,
            password: None,
            skip_tls_verify: default_skip_tls_verify(),
        }
    }
}

/// Time-series sink configuration
#[derive(Debug, Clone, PartialEq, serde::Deserialize)]
pub struct SinkConfig {
    #[serde(flatten)]
    pub backend: SinkBackend,

    /// Database every sample is written to
    #[serde(default = "default_database")]
    pub database: String,

    /// Deadline for every sink call, in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl SinkConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self {
            backend: SinkBackend::default(),
            database: default_database(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Alert {
    Email(Email),
    Webhook(Webhook),
}

#[derive(Debug, Clone, PartialEq, serde::Deserialize)]
pub struct Email {
    /// `host:port` of the SMTP relay
    pub smtp_server: String,
    pub username: String,
    pub password: String,
    /// Sender address, defaults to `username`
    pub from: Option<String>,
    pub to: String,
}

#[derive(Debug, Clone, PartialEq, serde::Deserialize)]
pub struct Webhook {
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, serde::Deserialize)]
pub struct Config {
    /// Address the control API binds to
    #[serde(default = "default_listen_address")]
    pub listen_address: SocketAddr,

    #[serde(default)]
    pub sink: SinkConfig,

    /// Seconds between two container listings
    #[serde(default = "default_poll_interval")]
    pub poll_interval: u64,

    /// Seconds between two dedup ticks
    #[serde(default = "default_monitor_interval")]
    pub monitor_interval: u64,

    /// Kinds to poll and alert on
    #[serde(default = "default_kinds")]
    pub kinds: Vec<WorkloadKind>,

    /// Also record containers that match no kind
    #[serde(default)]
    pub record_unmatched: bool,

    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// Where down notifications go (none = alerts are only logged)
    pub alert: Option<Alert>,

    /// Seconds one notification may take before it counts as failed
    #[serde(default = "default_alert_timeout_secs")]
    pub alert_timeout_secs: u64,

    /// Base of the restart link put into notifications
    #[serde(default = "default_restart_base_url")]
    pub restart_base_url: String,

    /// Docker socket path, local defaults when unset
    pub docker_socket: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_address: default_listen_address(),
            sink: SinkConfig::default(),
            poll_interval: default_poll_interval(),
            monitor_interval: default_monitor_interval(),
            kinds: default_kinds(),
            record_unmatched: false,
            queue_capacity: default_queue_capacity(),
            alert: None,
            alert_timeout_secs: default_alert_timeout_secs(),
            restart_base_url: default_restart_base_url(),
            docker_socket: None,
        }
    }
}

impl Config {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval)
    }

    pub fn monitor_interval(&self) -> Duration {
        Duration::from_secs(self.monitor_interval)
    }

    pub fn alert_timeout(&self) -> Duration {
        Duration::from_secs(self.alert_timeout_secs)
    }

    /// Reject values the tasks cannot run with.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.poll_interval == 0 || self.monitor_interval == 0 {
            anyhow::bail!("poll_interval and monitor_interval must be at least 1 second");
        }
        if self.sink.timeout_secs == 0 {
            anyhow::bail!("sink.timeout_secs must be at least 1 second");
        }
        if self.alert_timeout_secs == 0 {
            anyhow::bail!("alert_timeout_secs must be at least 1 second");
        }
        if self.queue_capacity == 0 {
            anyhow::bail!("queue_capacity must be at least 1");
        }
        if self.kinds.is_empty() {
            anyhow::bail!("at least one kind must be monitored");
        }
        Ok(())
    }
}

fn default_listen_address() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 8088))
}

fn default_influx_url() -> String {
    "http://influxdb:8086".to_string()
}

fn default_skip_tls_verify() -> bool {
    true
}

fn default_database() -> String {
    "containers".to_string()
}

fn default_timeout_secs() -> u64 {
    60
}

fn default_alert_timeout_secs() -> u64 {
    30
}

fn default_poll_interval() -> u64 {
    30
}

fn default_monitor_interval() -> u64 {
    10
}

fn default_kinds() -> Vec<WorkloadKind> {
    WorkloadKind::ALL.to_vec()
}

fn default_queue_capacity() -> usize {
    DEFAULT_QUEUE_CAPACITY
}

fn default_restart_base_url() -> String {
    "http://localhost:8088".to_string()
}

pub fn read_config_file(path: &str) -> anyhow::Result<Config> {
    let file_content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read configuration file {path}"))?;
    let config: Config = serde_json::from_str(&file_content)
        .with_context(|| format!("invalid configuration file {path}"))?;
    config.validate()?;
    trace!("loaded config: {config:?}");
    Ok(config)
}
