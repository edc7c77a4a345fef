//! Device configuration.
//!
//! # Components
//!
//! - [`link`] - saved network credentials and link timing
//! - [`broker`] - broker endpoint, topics and session timing
//! - [`device`] - device identity for telemetry

mod broker;
mod device;
mod link;

pub use broker::{
    BrokerConfig, CLIENT_ID_PREFIX, DEFAULT_BROKER_HOST, DEFAULT_BROKER_PORT,
    MAX_CREDENTIAL_LEN, TOPIC_EVENTS, TOPIC_HEARTBEAT, TOPIC_STATUS,
};
pub use device::DeviceInfo;
pub use link::{
    validate_identifier, validate_secret, ConfigError, LinkConfig, CONNECT_TIMEOUT,
    HEALTH_CHECK_PERIOD, MAX_IDENTIFIER_LEN, MAX_SECRET_LEN, MIN_SECRET_LEN, SCAN_INTERVAL,
    SCAN_TIMEOUT,
};
