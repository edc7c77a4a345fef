//! WindChime ESP32 connectivity library.
//!
//! Keeps the appliance's wireless link and its broker session in a
//! consistent, recoverable state, decodes inbound events and publishes
//! device telemetry. Everything outside the `esp32` and `host` back ends is
//! platform-independent and tested on the host.
//!
//! One control loop owns both managers and ticks them in order:
//!
//! ```
//! use std::sync::Arc;
//! use windchime_esp32::clock::SystemClock;
//! use windchime_esp32::config::{BrokerConfig, DeviceInfo};
//! use windchime_esp32::link::{event_channel, LinkManager, SimulatedRadio};
//! use windchime_esp32::session::{LoopbackBroker, SessionManager};
//! use windchime_esp32::store::MemoryStore;
//!
//! let clock = Arc::new(SystemClock);
//! let (tx, rx) = event_channel();
//! let mut link = LinkManager::new(SimulatedRadio::new(tx), MemoryStore::new(), rx, clock.clone());
//! let mut session = SessionManager::new(
//!     LoopbackBroker::new(),
//!     BrokerConfig::default(),
//!     DeviceInfo::new([0x24, 0x6f, 0x28, 0, 0, 1]),
//!     clock,
//! );
//!
//! link.update();
//! session.update(&link.snapshot());
//! ```

pub mod clock;
pub mod config;
pub mod event;
pub mod link;
pub mod session;
pub mod store;
pub mod telemetry;

// Re-export commonly used items
pub use config::{BrokerConfig, ConfigError, DeviceInfo, LinkConfig};
pub use event::{decode_event, CircleStyle, DataSource, DecodeError, EventRecord};
pub use link::{LinkError, LinkManager, LinkNetwork, LinkSnapshot, LinkStatus};
pub use session::{BrokerTransport, SessionError, SessionManager, SessionStatus};
pub use store::{CredentialStore, StoreError};
