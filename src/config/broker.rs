//! Message broker configuration.

use std::env;
use std::time::Duration;

/// Default public broker.
pub const DEFAULT_BROKER_HOST: &str = "broker.emqx.io";

/// Default plain-TCP MQTT port.
pub const DEFAULT_BROKER_PORT: u16 = 1883;

/// Prefix of the client identifier presented to the broker.
pub const CLIENT_ID_PREFIX: &str = "WindChime_";

/// Inbound event topic.
pub const TOPIC_EVENTS: &str = "windchime/events";

/// Status snapshot topic.
pub const TOPIC_STATUS: &str = "windchime/status";

/// Liveness topic.
pub const TOPIC_HEARTBEAT: &str = "windchime/heartbeat";

/// Maximum broker username/password length.
pub const MAX_CREDENTIAL_LEN: usize = 63;

/// Broker endpoint, topics and session timing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokerConfig {
    pub host: String,
    pub port: u16,
    pub client_id_prefix: String,
    pub keep_alive: Duration,
    /// Largest packet the transport buffers; bigger inbound payloads are dropped.
    pub buffer_size: usize,
    pub events_topic: String,
    pub status_topic: String,
    pub heartbeat_topic: String,
    /// Delay between failed handshake attempts.
    pub reconnect_interval: Duration,
    /// Upper bound the transport may spend on one handshake.
    pub connect_timeout: Duration,
    pub heartbeat_interval: Duration,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_BROKER_HOST.to_string(),
            port: DEFAULT_BROKER_PORT,
            client_id_prefix: CLIENT_ID_PREFIX.to_string(),
            keep_alive: Duration::from_secs(60),
            buffer_size: 1024,
            events_topic: TOPIC_EVENTS.to_string(),
            status_topic: TOPIC_STATUS.to_string(),
            heartbeat_topic: TOPIC_HEARTBEAT.to_string(),
            reconnect_interval: Duration::from_secs(5),
            connect_timeout: Duration::from_secs(10),
            heartbeat_interval: Duration::from_secs(30),
        }
    }
}

impl BrokerConfig {
    /// Defaults with host and port taken from `WINDCHIME_BROKER_HOST` and
    /// `WINDCHIME_BROKER_PORT` when set.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(host) = env::var("WINDCHIME_BROKER_HOST") {
            if !host.is_empty() {
                config.host = host;
            }
        }
        if let Ok(port) = env::var("WINDCHIME_BROKER_PORT") {
            match port.parse() {
                Ok(port) => config.port = port,
                Err(e) => log::warn!("Ignoring WINDCHIME_BROKER_PORT '{}': {}", port, e),
            }
        }
        config
    }

    /// Broker credentials from `WINDCHIME_BROKER_USER` / `WINDCHIME_BROKER_PASS`.
    pub fn credentials_from_env() -> Option<(String, String)> {
        let user = env::var("WINDCHIME_BROKER_USER").ok()?;
        let pass = env::var("WINDCHIME_BROKER_PASS").unwrap_or_default();
        Some((user, pass))
    }

    /// `host:port` for display.
    pub fn broker_info(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Topic for the one-time device descriptor.
    pub fn device_info_topic(&self, device_id: &str) -> String {
        format!("windchime/device/{}/info", device_id)
    }
}
