//! MQTT Session Manager.
//!
//! - [`manager`] - the session state machine
//! - [`transport`] - broker transport trait
//! - [`loopback`] - in-process broker for tests
//! - `mqtt` - `rumqttc` transport (host feature)
//! - `esp` - ESP-IDF MQTT client transport (ESP32 only)

#[cfg(feature = "esp32")]
mod esp;
pub mod loopback;
pub mod manager;
#[cfg(feature = "host")]
mod mqtt;
pub mod transport;

#[cfg(feature = "esp32")]
pub use esp::EspMqttTransport;
pub use loopback::LoopbackBroker;
pub use manager::{EventHandler, SessionError, SessionManager, SessionStatus, SessionStatusHandler};
#[cfg(feature = "host")]
pub use mqtt::MqttTransport;
pub use transport::{BrokerTransport, InboundMessage};
