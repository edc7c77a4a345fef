//! WiFi Link Manager.
//!
//! - [`status`] - link status, scan results and snapshots
//! - [`radio`] - driver trait and event queue
//! - [`manager`] - the link state machine
//! - [`sim`] - in-memory driver for tests and the host simulator
//! - `esp` - ESP-IDF station driver (ESP32 only)

#[cfg(feature = "esp32")]
mod esp;
pub mod manager;
pub mod radio;
pub mod sim;
pub mod status;

#[cfg(feature = "esp32")]
pub use esp::EspRadio;
pub use manager::{LinkError, LinkManager, LinkStatusHandler, ScanHandler};
pub use radio::{
    event_channel, RadioDriver, RadioError, RadioEvent, RadioEventReceiver, RadioEventSender,
};
pub use sim::SimulatedRadio;
pub use status::{signal_bars, AuthMode, LinkNetwork, LinkSnapshot, LinkStatus};
