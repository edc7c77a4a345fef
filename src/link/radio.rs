//! Radio driver seam.
//!
//! The driver accepts commands and answers queries synchronously on the
//! control loop, but reports link changes asynchronously from its own
//! context. Those reports go through an unbounded queue so the sending side
//! never blocks and the Link Manager applies them in order from `update()`.

use super::status::LinkNetwork;
use log::debug;
use std::fmt;
use std::net::Ipv4Addr;
use tokio::sync::mpsc;

/// Asynchronous notification from the radio driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RadioEvent {
    /// Station interface started.
    Started,
    /// Associated with the access point (no address yet).
    LinkUp,
    /// DHCP finished; the link is usable.
    AddressAcquired(Ipv4Addr),
    /// Association lost or attempt rejected.
    LinkDown,
    /// A scan finished and its results can be fetched.
    ScanDone,
}

/// Commands and queries the Link Manager needs from a radio.
pub trait RadioDriver {
    /// Begin an asynchronous scan; completion arrives as [`RadioEvent::ScanDone`].
    fn start_scan(&mut self) -> Result<(), RadioError>;

    /// Abort a running scan and discard its results.
    fn stop_scan(&mut self);

    /// Take the results of the last completed scan.
    fn scan_results(&mut self) -> Vec<LinkNetwork>;

    /// Begin joining a network; progress arrives as events.
    fn connect(&mut self, identifier: &str, secret: &str) -> Result<(), RadioError>;

    fn disconnect(&mut self) -> Result<(), RadioError>;

    /// Live association flag.
    fn is_connected(&self) -> bool;

    /// Signal level of the current association in dBm.
    fn signal_level(&self) -> i32;

    fn address(&self) -> Option<Ipv4Addr>;

    fn connected_identifier(&self) -> Option<String>;
}

/// Create the queue between a radio driver and its Link Manager.
pub fn event_channel() -> (RadioEventSender, RadioEventReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    (RadioEventSender(tx), RadioEventReceiver(rx))
}

/// Driver-side handle. Cheap to clone, safe to use from any thread.
#[derive(Debug, Clone)]
pub struct RadioEventSender(mpsc::UnboundedSender<RadioEvent>);

impl RadioEventSender {
    /// Queue an event. Never blocks.
    pub fn send(&self, event: RadioEvent) {
        if self.0.send(event).is_err() {
            debug!("Radio event {:?} dropped: link manager gone", event);
        }
    }
}

/// Manager-side handle.
#[derive(Debug)]
pub struct RadioEventReceiver(mpsc::UnboundedReceiver<RadioEvent>);

impl RadioEventReceiver {
    /// Next queued event, if any.
    pub fn try_recv(&mut self) -> Option<RadioEvent> {
        self.0.try_recv().ok()
    }
}

/// Errors reported by radio commands.
#[derive(Debug)]
pub enum RadioError {
    /// Identifier or passphrase rejected by the driver.
    InvalidCredentials,
    /// The driver refused or failed the command.
    Command(String),
    /// ESP-IDF error.
    #[cfg(feature = "esp32")]
    Esp(esp_idf_sys::EspError),
}

impl fmt::Display for RadioError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidCredentials => write!(f, "credentials rejected by driver"),
            Self::Command(msg) => write!(f, "radio command failed: {}", msg),
            #[cfg(feature = "esp32")]
            Self::Esp(e) => write!(f, "ESP error: {:?}", e),
        }
    }
}

impl std::error::Error for RadioError {}

#[cfg(feature = "esp32")]
impl From<esp_idf_sys::EspError> for RadioError {
    fn from(e: esp_idf_sys::EspError) -> Self {
        Self::Esp(e)
    }
}
