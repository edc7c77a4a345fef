//! Link Manager state machine.
//!
//! Owns the wireless link lifecycle: scanning, joining, leaving, auto-connect
//! from saved credentials, timeout detection and status notification.
//!
//! Two pieces of state are kept apart on purpose: the [`LinkStatus`] enum and
//! the `scan_active` flag. A scan can run while the link stays `Connected`;
//! driver drops reported during a scan are suppressed, and when the scan ends
//! the status is rebuilt from the driver's live connection flag.

use super::radio::{RadioDriver, RadioError, RadioEvent, RadioEventReceiver};
use super::status::{LinkNetwork, LinkSnapshot, LinkStatus};
use crate::clock::Clock;
use crate::config::{
    validate_identifier, validate_secret, ConfigError, LinkConfig, CONNECT_TIMEOUT,
    HEALTH_CHECK_PERIOD, SCAN_INTERVAL, SCAN_TIMEOUT,
};
use crate::store::{
    clear_link_config, load_link_config, save_link_config, CredentialStore, StoreError,
};
use log::{debug, info, warn};
use std::fmt;
use std::net::Ipv4Addr;
use std::sync::Arc;
use std::time::Instant;

/// Observer for link status transitions: new status and a human-readable reason.
pub type LinkStatusHandler = Box<dyn FnMut(LinkStatus, &str) + Send>;

/// One-shot receiver of scan results.
pub type ScanHandler = Box<dyn FnOnce(&[LinkNetwork]) + Send>;

/// Wireless link manager.
pub struct LinkManager<R: RadioDriver, S: CredentialStore> {
    radio: R,
    store: S,
    events: RadioEventReceiver,
    clock: Arc<dyn Clock>,
    status: LinkStatus,
    status_handler: Option<LinkStatusHandler>,
    scan_active: bool,
    scan_started: Option<Instant>,
    scan_handler: Option<ScanHandler>,
    connect_started: Option<Instant>,
    /// A drop caused by our own disconnect command is still in the queue.
    absorb_drop: bool,
    address: Option<Ipv4Addr>,
    last_check: Option<Instant>,
}

impl<R: RadioDriver, S: CredentialStore> LinkManager<R, S> {
    /// Create a manager around a driver and the receiving end of its event queue.
    pub fn new(radio: R, store: S, events: RadioEventReceiver, clock: Arc<dyn Clock>) -> Self {
        let status = if radio.is_connected() {
            LinkStatus::Connected
        } else {
            LinkStatus::Disconnected
        };
        let address = radio.address();
        info!("Link manager initialized ({})", status);

        Self {
            radio,
            store,
            events,
            clock,
            status,
            status_handler: None,
            scan_active: false,
            scan_started: None,
            scan_handler: None,
            connect_started: None,
            absorb_drop: false,
            address,
            last_check: None,
        }
    }

    /// Register the status observer. Replaces any previous one.
    ///
    /// The handler runs on the control loop inside manager calls and must not
    /// block.
    pub fn set_status_handler(&mut self, handler: impl FnMut(LinkStatus, &str) + Send + 'static) {
        self.status_handler = Some(Box::new(handler));
    }

    /// Start an asynchronous scan.
    ///
    /// Returns `false` without side effects when a scan is already in flight,
    /// the previous scan started less than [`SCAN_INTERVAL`] ago, or a connect
    /// attempt is in progress. A scan started while `Connected` leaves the
    /// status at `Connected`.
    pub fn start_scan(&mut self, handler: impl FnOnce(&[LinkNetwork]) + Send + 'static) -> bool {
        let now = self.clock.now();

        if self.scan_active {
            debug!("Scan request ignored - scan already in flight");
            return false;
        }
        if let Some(started) = self.scan_started {
            if now.duration_since(started) < SCAN_INTERVAL {
                debug!("Scan request ignored - minimum interval not elapsed");
                return false;
            }
        }
        if self.status == LinkStatus::Connecting {
            debug!("Scan request ignored - connect in progress");
            return false;
        }

        if let Err(e) = self.radio.start_scan() {
            warn!("Failed to start scan: {}", e);
            return false;
        }

        self.scan_active = true;
        self.scan_started = Some(now);
        self.scan_handler = Some(Box::new(handler));

        if self.status != LinkStatus::Connected {
            self.transition(LinkStatus::Scanning, "Scanning for networks...");
        }
        info!("Started network scan");
        true
    }

    /// Abort the running scan, if any.
    pub fn stop_scan(&mut self) {
        self.reset_scan_state();
        if self.status == LinkStatus::Scanning {
            self.transition(LinkStatus::Disconnected, "Scan stopped");
        }
    }

    /// Force the scan-in-flight state back to idle without touching the status.
    pub fn reset_scan_state(&mut self) {
        if self.scan_active {
            self.radio.stop_scan();
        }
        self.scan_active = false;
        self.scan_handler = None;
        debug!("Scan state reset");
    }

    /// Join a network.
    ///
    /// Fails with [`LinkError::InvalidArgument`] for a malformed identifier or
    /// passphrase and with [`LinkError::Busy`] while a connect or scan is
    /// active; neither changes the status. With `save`, the credentials are
    /// stored with auto-connect enabled.
    pub fn connect(&mut self, identifier: &str, secret: &str, save: bool) -> Result<(), LinkError> {
        validate_identifier(identifier)?;
        validate_secret(secret)?;

        if self.status == LinkStatus::Connecting || self.scan_active {
            debug!("Connect to {} refused - link busy", identifier);
            return Err(LinkError::Busy);
        }

        info!("Connecting to {}", identifier);

        if self.status == LinkStatus::Connected {
            self.drop_current_link();
        }

        if save {
            match LinkConfig::new(identifier, secret, true) {
                Ok(config) => {
                    if let Err(e) = save_link_config(&mut self.store, &config) {
                        warn!("Failed to save link config: {}", e);
                    }
                }
                Err(e) => warn!("Not saving link config: {}", e),
            }
        }

        self.connect_started = Some(self.clock.now());
        self.transition(LinkStatus::Connecting, "Connecting...");

        if let Err(e) = self.radio.connect(identifier, secret) {
            self.connect_started = None;
            self.transition(LinkStatus::Failed, &format!("Connection failed: {}", e));
            return Err(LinkError::Radio(e));
        }
        Ok(())
    }

    /// Leave the current network.
    pub fn disconnect(&mut self) {
        info!("Disconnecting");
        self.drop_current_link();
        self.connect_started = None;
        self.transition(LinkStatus::Disconnected, "Disconnected");
    }

    /// Join the saved network if it has auto-connect enabled.
    ///
    /// Returns `true` if a connect attempt was started.
    pub fn auto_connect_from_saved(&mut self) -> bool {
        if self.scan_active {
            info!("Skipping auto connect - scan in progress");
            return false;
        }

        match load_link_config(&self.store) {
            Some(config) if config.auto_connect => {
                info!("Auto connecting to {}", config.identifier);
                match self.connect(&config.identifier, &config.secret, false) {
                    Ok(()) => true,
                    Err(e) => {
                        warn!("Auto connect failed: {}", e);
                        false
                    }
                }
            }
            _ => {
                info!("No auto connect configuration found");
                false
            }
        }
    }

    /// Drain driver events, then run timeout and health checks at most once
    /// per [`HEALTH_CHECK_PERIOD`]. Call from the control loop.
    pub fn update(&mut self) {
        while let Some(event) = self.events.try_recv() {
            self.handle_event(event);
        }

        let now = self.clock.now();
        if let Some(last) = self.last_check {
            if now.duration_since(last) < HEALTH_CHECK_PERIOD {
                return;
            }
        }
        self.last_check = Some(now);

        self.check_timeouts(now);
        self.check_health();
    }

    pub fn status(&self) -> LinkStatus {
        self.status
    }

    pub fn status_str(&self) -> &'static str {
        self.status.as_str()
    }

    /// True while a scan is in flight, whatever the status.
    pub fn is_scanning(&self) -> bool {
        self.scan_active
    }

    /// Identifier of the joined network, only while `Connected`.
    pub fn connected_identifier(&self) -> Option<String> {
        if self.status != LinkStatus::Connected {
            return None;
        }
        self.radio.connected_identifier()
    }

    /// Signal level in dBm while `Connected`, otherwise 0.
    pub fn signal_level(&self) -> i32 {
        if self.status != LinkStatus::Connected {
            return 0;
        }
        self.radio.signal_level()
    }

    /// Local address while `Connected`.
    pub fn address(&self) -> Option<Ipv4Addr> {
        if self.status != LinkStatus::Connected {
            return None;
        }
        self.address.or_else(|| self.radio.address())
    }

    /// Everything the Session Manager needs to know about the link.
    pub fn snapshot(&self) -> LinkSnapshot {
        LinkSnapshot {
            status: self.status,
            identifier: self.connected_identifier(),
            signal_level: self.signal_level(),
            address: self.address(),
        }
    }

    pub fn save_config(&mut self, config: &LinkConfig) -> Result<(), StoreError> {
        save_link_config(&mut self.store, config)
    }

    pub fn load_config(&self) -> Option<LinkConfig> {
        load_link_config(&self.store)
    }

    pub fn clear_config(&mut self) -> Result<(), StoreError> {
        clear_link_config(&mut self.store)
    }

    pub fn radio(&self) -> &R {
        &self.radio
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Dump the manager state to the log.
    pub fn log_status(&self) {
        info!("Link manager status:");
        info!("  Status: {}", self.status);
        info!("  Scanning: {}", if self.scan_active { "yes" } else { "no" });
        info!("  Driver connected: {}", self.radio.is_connected());
        if let Some(identifier) = self.connected_identifier() {
            info!("  Network: {}", identifier);
        }
        if let Some(address) = self.address() {
            info!("  Address: {}", address);
        }
    }

    fn handle_event(&mut self, event: RadioEvent) {
        match event {
            RadioEvent::Started => debug!("Radio started"),
            RadioEvent::LinkUp => debug!("Radio associated"),
            RadioEvent::AddressAcquired(address) => {
                info!("Got address: {}", address);
                self.absorb_drop = false;
                self.address = Some(address);
                self.connect_started = None;
                self.transition(LinkStatus::Connected, "Connected successfully");
            }
            RadioEvent::LinkDown => self.handle_link_down(),
            RadioEvent::ScanDone => self.handle_scan_done(),
        }
    }

    fn handle_link_down(&mut self) {
        if self.absorb_drop {
            self.absorb_drop = false;
            debug!("Ignoring link drop caused by our own disconnect");
            return;
        }
        if self.scan_active {
            debug!("Ignoring link drop during scan");
            return;
        }

        match self.status {
            LinkStatus::Connecting => {
                self.connect_started = None;
                self.transition(LinkStatus::Failed, "Connection failed");
            }
            LinkStatus::Connected => {
                self.address = None;
                self.transition(LinkStatus::Disconnected, "Link dropped");
            }
            _ => debug!("Link drop while {}", self.status),
        }
    }

    fn handle_scan_done(&mut self) {
        if !self.scan_active {
            debug!("Discarding results of a cancelled scan");
            self.radio.stop_scan();
            return;
        }

        self.scan_active = false;
        let networks = self.radio.scan_results();
        info!("Scan completed, found {} networks", networks.len());

        if let Some(handler) = self.scan_handler.take() {
            handler(networks.as_slice());
        }

        self.reconcile_after_scan("Scan completed");
    }

    /// Rebuild the status from the driver's live flag once no scan is in flight.
    fn reconcile_after_scan(&mut self, reason: &str) {
        if self.status == LinkStatus::Connecting {
            return;
        }

        if self.radio.is_connected() {
            if self.status != LinkStatus::Connected {
                self.address = self.radio.address();
            }
            self.transition(LinkStatus::Connected, &format!("{} - still connected", reason));
        } else {
            self.address = None;
            self.transition(LinkStatus::Disconnected, reason);
        }
    }

    fn check_timeouts(&mut self, now: Instant) {
        if self.status == LinkStatus::Connecting {
            if let Some(started) = self.connect_started {
                if now.duration_since(started) > CONNECT_TIMEOUT {
                    warn!("Connection timeout");
                    self.connect_started = None;
                    if let Err(e) = self.radio.disconnect() {
                        warn!("Failed to abort connect: {}", e);
                    }
                    self.transition(LinkStatus::Failed, "Connection timeout");
                }
            }
        }

        if self.scan_active {
            if let Some(started) = self.scan_started {
                if now.duration_since(started) > SCAN_TIMEOUT {
                    warn!("Scan timeout, resetting scan state");
                    self.reset_scan_state();
                    self.reconcile_after_scan("Scan timeout");
                }
            }
        }
    }

    fn check_health(&mut self) {
        if self.scan_active {
            return;
        }

        let live = self.radio.is_connected();
        match self.status {
            LinkStatus::Connected if !live => {
                warn!("Connection lost, updating status");
                self.address = None;
                self.transition(LinkStatus::Disconnected, "Connection lost");
            }
            LinkStatus::Disconnected if live && !self.absorb_drop => {
                info!("Connection restored, updating status");
                self.address = self.radio.address();
                self.transition(LinkStatus::Connected, "Connection restored");
            }
            _ => {}
        }
    }

    fn drop_current_link(&mut self) {
        let was_connected = self.radio.is_connected();
        match self.radio.disconnect() {
            // Only a disconnect the radio accepted will report a drop
            Ok(()) => self.absorb_drop = was_connected,
            Err(e) => warn!("Radio disconnect failed: {}", e),
        }
        self.address = None;
    }

    fn transition(&mut self, status: LinkStatus, reason: &str) {
        if self.status == status {
            debug!("Link status unchanged ({}) - {}", status, reason);
            return;
        }
        self.status = status;
        info!("Link status changed to {} - {}", status, reason);
        if let Some(handler) = self.status_handler.as_mut() {
            handler(status, reason);
        }
    }
}

/// Errors returned by Link Manager operations.
#[derive(Debug)]
pub enum LinkError {
    /// Identifier or passphrase failed validation.
    InvalidArgument(ConfigError),
    /// A connect or scan is already active.
    Busy,
    /// The radio refused the command.
    Radio(RadioError),
}

impl fmt::Display for LinkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidArgument(e) => write!(f, "invalid argument: {}", e),
            Self::Busy => write!(f, "link busy"),
            Self::Radio(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for LinkError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::InvalidArgument(e) => Some(e),
            Self::Radio(e) => Some(e),
            Self::Busy => None,
        }
    }
}

impl From<ConfigError> for LinkError {
    fn from(e: ConfigError) -> Self {
        Self::InvalidArgument(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::link::radio::event_channel;
    use crate::link::sim::SimulatedRadio;
    use crate::link::status::AuthMode;
    use crate::store::{MemoryStore, KEY_IDENTIFIER};
    use std::sync::Mutex;
    use std::time::Duration;

    const ADDR: Ipv4Addr = Ipv4Addr::new(192, 168, 1, 50);

    struct Harness {
        link: LinkManager<SimulatedRadio, MemoryStore>,
        radio: SimulatedRadio,
        clock: ManualClock,
        transitions: Arc<Mutex<Vec<(LinkStatus, String)>>>,
    }

    impl Harness {
        fn new() -> Self {
            Self::with_store(MemoryStore::new())
        }

        fn with_store(store: MemoryStore) -> Self {
            let _ = env_logger::builder().is_test(true).try_init();
            let (tx, rx) = event_channel();
            let radio = SimulatedRadio::new(tx);
            radio.set_networks(vec![
                LinkNetwork::new("HomeNet", -48, AuthMode::Wpa2),
                LinkNetwork::new("Cafe", -72, AuthMode::Open),
            ]);
            let clock = ManualClock::new();
            let mut link = LinkManager::new(radio.clone(), store, rx, Arc::new(clock.clone()));
            let transitions = Arc::new(Mutex::new(Vec::new()));
            let sink = transitions.clone();
            link.set_status_handler(move |status, reason| {
                sink.lock().unwrap().push((status, reason.to_string()));
            });
            Self {
                link,
                radio,
                clock,
                transitions,
            }
        }

        fn tick(&mut self) {
            self.clock.advance(Duration::from_secs(1));
            self.link.update();
        }

        fn connect_home(&mut self) {
            self.link.connect("HomeNet", "password123", false).unwrap();
            self.radio.acquire_address(ADDR);
            self.tick();
            assert_eq!(self.link.status(), LinkStatus::Connected);
        }

        fn statuses(&self) -> Vec<LinkStatus> {
            self.transitions.lock().unwrap().iter().map(|(s, _)| *s).collect()
        }
    }

    #[test]
    fn test_starts_disconnected() {
        let h = Harness::new();
        assert_eq!(h.link.status(), LinkStatus::Disconnected);
        assert_eq!(h.link.address(), None);
        assert_eq!(h.link.signal_level(), 0);
    }

    #[test]
    fn test_connect_success() {
        let mut h = Harness::new();
        h.link.connect("HomeNet", "password123", false).unwrap();
        assert_eq!(h.link.status(), LinkStatus::Connecting);

        h.radio.acquire_address(ADDR);
        h.link.update();

        assert_eq!(h.link.status(), LinkStatus::Connected);
        assert_eq!(h.link.address(), Some(ADDR));
        assert_eq!(h.link.connected_identifier().as_deref(), Some("HomeNet"));
        assert_eq!(h.link.signal_level(), -48);
        assert_eq!(
            h.statuses(),
            vec![LinkStatus::Connecting, LinkStatus::Connected]
        );
    }

    #[test]
    fn test_empty_identifier_rejected_without_state_change() {
        let mut h = Harness::new();
        let result = h.link.connect("", "password123", true);
        assert!(matches!(
            result,
            Err(LinkError::InvalidArgument(ConfigError::IdentifierEmpty))
        ));
        assert_eq!(h.link.status(), LinkStatus::Disconnected);
        assert!(h.statuses().is_empty());
        assert_eq!(h.radio.connect_attempts(), 0);
        assert!(h.link.store().is_empty());
    }

    #[test]
    fn test_connect_while_connecting_is_busy() {
        let mut h = Harness::new();
        h.link.connect("HomeNet", "password123", false).unwrap();
        let result = h.link.connect("Cafe", "", false);
        assert!(matches!(result, Err(LinkError::Busy)));
        assert_eq!(h.radio.connect_attempts(), 1);
        assert_eq!(h.radio.target().as_deref(), Some("HomeNet"));
    }

    #[test]
    fn test_connect_saves_credentials() {
        let mut h = Harness::new();
        h.link.connect("HomeNet", "password123", true).unwrap();
        let saved = h.link.load_config().expect("config saved");
        assert_eq!(saved.identifier, "HomeNet");
        assert!(saved.auto_connect);
    }

    #[test]
    fn test_drop_while_connecting_fails() {
        let mut h = Harness::new();
        h.link.connect("HomeNet", "wrongpassword", false).unwrap();
        h.radio.drop_link();
        h.link.update();
        assert_eq!(h.link.status(), LinkStatus::Failed);
    }

    #[test]
    fn test_connect_timeout() {
        let mut h = Harness::new();
        h.link.update();
        h.link.connect("HomeNet", "password123", false).unwrap();

        h.clock.advance(Duration::from_secs(10));
        h.link.update();
        assert_eq!(h.link.status(), LinkStatus::Connecting);

        h.clock.advance(Duration::from_secs(6));
        h.link.update();
        assert_eq!(h.link.status(), LinkStatus::Failed);
        assert_eq!(
            h.transitions.lock().unwrap().last().unwrap().1,
            "Connection timeout"
        );
    }

    #[test]
    fn test_retry_after_failure() {
        let mut h = Harness::new();
        h.link.connect("HomeNet", "password123", false).unwrap();
        h.radio.drop_link();
        h.link.update();
        assert_eq!(h.link.status(), LinkStatus::Failed);

        h.link.connect("HomeNet", "password123", false).unwrap();
        assert_eq!(h.link.status(), LinkStatus::Connecting);
    }

    #[test]
    fn test_unsolicited_drop_disconnects() {
        let mut h = Harness::new();
        h.connect_home();
        h.radio.drop_link();
        h.link.update();
        assert_eq!(h.link.status(), LinkStatus::Disconnected);
        assert_eq!(h.link.address(), None);
    }

    #[test]
    fn test_scan_from_disconnected() {
        let mut h = Harness::new();
        let found = Arc::new(Mutex::new(Vec::new()));
        let sink = found.clone();
        assert!(h.link.start_scan(move |networks| {
            sink.lock().unwrap().extend_from_slice(networks);
        }));
        assert_eq!(h.link.status(), LinkStatus::Scanning);
        assert!(h.link.is_scanning());

        h.radio.finish_scan();
        h.link.update();

        assert_eq!(h.link.status(), LinkStatus::Disconnected);
        assert!(!h.link.is_scanning());
        let found = found.lock().unwrap();
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].identifier, "HomeNet");
        assert_eq!(found[0].bars(), 4);
    }

    #[test]
    fn test_scan_while_connected_keeps_status() {
        let mut h = Harness::new();
        h.connect_home();
        let before = h.statuses().len();

        assert!(h.link.start_scan(|_| {}));
        assert_eq!(h.link.status(), LinkStatus::Connected);

        h.radio.finish_scan();
        h.link.update();
        assert_eq!(h.link.status(), LinkStatus::Connected);
        assert_eq!(h.statuses().len(), before);
    }

    #[test]
    fn test_transient_drop_during_scan_suppressed() {
        let mut h = Harness::new();
        h.connect_home();
        h.link.start_scan(|_| {});

        // Scan-induced blip: drop reported but association survives
        h.radio.drop_link();
        h.radio.set_connected_silently(true);
        h.link.update();
        assert_eq!(h.link.status(), LinkStatus::Connected);

        h.radio.finish_scan();
        h.link.update();
        assert_eq!(h.link.status(), LinkStatus::Connected);
        assert!(!h.statuses().contains(&LinkStatus::Disconnected));
    }

    #[test]
    fn test_real_drop_during_scan_resolved_from_live_flag() {
        let mut h = Harness::new();
        h.connect_home();
        h.link.start_scan(|_| {});

        h.radio.drop_link();
        h.link.update();
        assert_eq!(h.link.status(), LinkStatus::Connected);

        h.radio.finish_scan();
        h.link.update();
        assert_eq!(h.link.status(), LinkStatus::Disconnected);
    }

    #[test]
    fn test_second_scan_within_interval_is_noop() {
        let mut h = Harness::new();
        assert!(h.link.start_scan(|_| {}));
        assert!(!h.link.start_scan(|_| {}));
        assert_eq!(h.radio.scan_starts(), 1);
        assert!(h.radio.scan_in_progress());
        assert!(h.link.is_scanning());

        h.radio.finish_scan();
        h.link.update();
        // Finished, but the interval still gates the next request
        assert!(!h.link.start_scan(|_| {}));

        h.clock.advance(SCAN_INTERVAL);
        assert!(h.link.start_scan(|_| {}));
        assert_eq!(h.radio.scan_starts(), 2);
    }

    #[test]
    fn test_connect_refused_during_scan() {
        let mut h = Harness::new();
        h.link.start_scan(|_| {});
        assert!(matches!(
            h.link.connect("HomeNet", "password123", false),
            Err(LinkError::Busy)
        ));
        assert_eq!(h.link.status(), LinkStatus::Scanning);
    }

    #[test]
    fn test_scan_refused_while_connecting() {
        let mut h = Harness::new();
        h.link.connect("HomeNet", "password123", false).unwrap();
        assert!(!h.link.start_scan(|_| {}));
        assert_eq!(h.radio.scan_starts(), 0);
    }

    #[test]
    fn test_scan_timeout_recovers() {
        let mut h = Harness::new();
        h.link.update();
        h.link.start_scan(|_| {});

        h.clock.advance(SCAN_TIMEOUT + Duration::from_secs(1));
        h.link.update();

        assert!(!h.link.is_scanning());
        assert!(!h.radio.scan_in_progress());
        assert_eq!(h.link.status(), LinkStatus::Disconnected);
    }

    #[test]
    fn test_scan_timeout_while_connected_keeps_status() {
        let mut h = Harness::new();
        h.connect_home();
        let before = h.statuses().len();
        h.link.start_scan(|_| {});

        h.clock.advance(SCAN_TIMEOUT + Duration::from_secs(1));
        h.link.update();

        assert!(!h.link.is_scanning());
        assert_eq!(h.link.status(), LinkStatus::Connected);
        assert_eq!(h.statuses().len(), before);
    }

    #[test]
    fn test_scan_timeout_after_drop_disconnects() {
        let mut h = Harness::new();
        h.connect_home();
        h.link.start_scan(|_| {});
        h.radio.drop_link();
        h.link.update();
        assert_eq!(h.link.status(), LinkStatus::Connected);

        h.clock.advance(SCAN_TIMEOUT + Duration::from_secs(1));
        h.link.update();

        assert!(!h.link.is_scanning());
        assert_eq!(h.link.status(), LinkStatus::Disconnected);
        assert_eq!(h.link.address(), None);
    }

    #[test]
    fn test_stop_scan() {
        let mut h = Harness::new();
        h.link.start_scan(|_| {});
        h.link.stop_scan();
        assert_eq!(h.link.status(), LinkStatus::Disconnected);
        assert!(!h.link.is_scanning());

        // Late completion from the driver is discarded
        h.radio.finish_scan();
        h.link.update();
        assert_eq!(h.link.status(), LinkStatus::Disconnected);
    }

    #[test]
    fn test_disconnect() {
        let mut h = Harness::new();
        h.connect_home();
        h.link.disconnect();
        assert_eq!(h.link.status(), LinkStatus::Disconnected);
        h.link.update();
        assert_eq!(h.link.status(), LinkStatus::Disconnected);
    }

    #[test]
    fn test_reconnect_to_other_network_ignores_own_drop() {
        let mut h = Harness::new();
        h.connect_home();

        h.link.connect("Cafe", "", false).unwrap();
        assert_eq!(h.link.status(), LinkStatus::Connecting);

        // The drop of HomeNet is still queued; it must not fail the new attempt
        h.link.update();
        assert_eq!(h.link.status(), LinkStatus::Connecting);

        h.radio.acquire_address(Ipv4Addr::new(10, 0, 0, 9));
        h.link.update();
        assert_eq!(h.link.status(), LinkStatus::Connected);
        assert_eq!(h.link.connected_identifier().as_deref(), Some("Cafe"));
    }

    #[test]
    fn test_rejected_disconnect_leaves_no_pending_drop() {
        let mut h = Harness::new();
        h.connect_home();

        h.radio.set_reject_commands(true);
        h.link.disconnect();
        assert_eq!(h.link.status(), LinkStatus::Disconnected);
        h.radio.set_reject_commands(false);

        // The radio never left, so the health check brings the status back
        h.tick();
        assert!(h.radio.is_connected());
        assert_eq!(h.link.status(), LinkStatus::Connected);

        h.radio.drop_link();
        h.link.update();
        h.link.connect("Cafe", "", false).unwrap();
        h.radio.drop_link();
        h.link.update();
        assert_eq!(h.link.status(), LinkStatus::Failed);
    }

    #[test]
    fn test_health_check_detects_silent_loss() {
        let mut h = Harness::new();
        h.connect_home();
        h.radio.set_connected_silently(false);
        h.tick();
        assert_eq!(h.link.status(), LinkStatus::Disconnected);
        assert_eq!(
            h.transitions.lock().unwrap().last().unwrap().1,
            "Connection lost"
        );
    }

    #[test]
    fn test_health_check_restores_connection() {
        let mut h = Harness::new();
        h.radio.set_connected_silently(true);
        h.tick();
        assert_eq!(h.link.status(), LinkStatus::Connected);
    }

    #[test]
    fn test_auto_connect_from_saved() {
        let mut store = MemoryStore::new();
        save_link_config(
            &mut store,
            &LinkConfig::new("HomeNet", "password123", true).unwrap(),
        )
        .unwrap();
        let mut h = Harness::with_store(store);

        assert!(h.link.auto_connect_from_saved());
        assert_eq!(h.link.status(), LinkStatus::Connecting);
        assert_eq!(h.radio.target().as_deref(), Some("HomeNet"));
    }

    #[test]
    fn test_auto_connect_disabled_or_missing() {
        let mut h = Harness::new();
        assert!(!h.link.auto_connect_from_saved());

        let mut store = MemoryStore::new();
        save_link_config(
            &mut store,
            &LinkConfig::new("HomeNet", "password123", false).unwrap(),
        )
        .unwrap();
        let mut h = Harness::with_store(store);
        assert!(!h.link.auto_connect_from_saved());
        assert_eq!(h.link.status(), LinkStatus::Disconnected);
    }

    #[test]
    fn test_auto_connect_skipped_during_scan() {
        let mut store = MemoryStore::new();
        store.put(KEY_IDENTIFIER, "HomeNet").unwrap();
        let mut h = Harness::with_store(store);
        h.link.start_scan(|_| {});
        assert!(!h.link.auto_connect_from_saved());
    }

    #[test]
    fn test_clear_config() {
        let mut h = Harness::new();
        h.link.connect("HomeNet", "password123", true).unwrap();
        h.link.clear_config().unwrap();
        assert!(h.link.load_config().is_none());
    }

    #[test]
    fn test_radio_rejection_fails_connect() {
        let mut h = Harness::new();
        h.radio.set_reject_commands(true);
        let result = h.link.connect("HomeNet", "password123", false);
        assert!(matches!(result, Err(LinkError::Radio(_))));
        assert_eq!(h.link.status(), LinkStatus::Failed);
    }

    #[test]
    fn test_status_always_defined_under_event_storm() {
        let mut h = Harness::new();
        let valid = [
            LinkStatus::Disconnected,
            LinkStatus::Scanning,
            LinkStatus::Connecting,
            LinkStatus::Connected,
            LinkStatus::Failed,
        ];
        for i in 0..40u8 {
            match i % 5 {
                0 => {
                    let _ = h.link.connect("HomeNet", "password123", false);
                }
                1 => h.radio.acquire_address(ADDR),
                2 => {
                    h.link.start_scan(|_| {});
                }
                3 => h.radio.drop_link(),
                _ => h.radio.finish_scan(),
            }
            h.tick();
            assert!(valid.contains(&h.link.status()));
        }
    }
}
