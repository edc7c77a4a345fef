//! Session Manager state machine.
//!
//! Layers one broker session on the wireless link. The session only reaches
//! `Connected` while the link is `Connected`; every tick re-checks the link
//! snapshot first, so a link loss forces the session to `Failed` before any
//! broker traffic is attempted.

use super::transport::{BrokerTransport, InboundMessage};
use crate::clock::Clock;
use crate::config::{BrokerConfig, DeviceInfo, MAX_CREDENTIAL_LEN};
use crate::event::{decode_event, EventRecord};
use crate::link::{LinkSnapshot, LinkStatus};
use crate::telemetry::{DeviceDescriptor, Heartbeat, StatusSnapshot};
use log::{debug, info, warn};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use zeroize::Zeroizing;

/// Broker session state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionStatus {
    Disconnected,
    Connecting,
    Connected,
    Failed,
    Reconnecting,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Disconnected => "Disconnected",
            Self::Connecting => "Connecting",
            Self::Connected => "Connected",
            Self::Failed => "Failed",
            Self::Reconnecting => "Reconnecting",
        }
    }

    /// A session is wanted and not given up on.
    fn is_active(&self) -> bool {
        matches!(self, Self::Connecting | Self::Connected | Self::Reconnecting)
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Observer for session status transitions.
pub type SessionStatusHandler = Box<dyn FnMut(SessionStatus, &str) + Send>;

/// Receiver of decoded inbound events.
pub type EventHandler = Box<dyn FnMut(&EventRecord) + Send>;

struct Credentials {
    username: String,
    password: Zeroizing<String>,
}

/// Broker session manager.
pub struct SessionManager<T: BrokerTransport> {
    transport: T,
    config: BrokerConfig,
    device: DeviceInfo,
    clock: Arc<dyn Clock>,
    started: Instant,
    status: SessionStatus,
    status_handler: Option<SessionStatusHandler>,
    event_handler: Option<EventHandler>,
    credentials: Option<Credentials>,
    /// A session was requested and not explicitly closed.
    wanted: bool,
    next_attempt: Option<Instant>,
    last_heartbeat: Instant,
    link: LinkSnapshot,
}

impl<T: BrokerTransport> SessionManager<T> {
    pub fn new(
        transport: T,
        config: BrokerConfig,
        device: DeviceInfo,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let started = clock.now();
        info!(
            "Session manager initialized - broker {}, client id {}",
            config.broker_info(),
            device.client_id(&config.client_id_prefix)
        );

        Self {
            transport,
            config,
            device,
            clock,
            started,
            status: SessionStatus::Disconnected,
            status_handler: None,
            event_handler: None,
            credentials: None,
            wanted: false,
            next_attempt: None,
            last_heartbeat: started,
            link: LinkSnapshot::down(LinkStatus::Disconnected),
        }
    }

    /// Register the status observer. Replaces any previous one.
    pub fn set_status_handler(
        &mut self,
        handler: impl FnMut(SessionStatus, &str) + Send + 'static,
    ) {
        self.status_handler = Some(Box::new(handler));
    }

    /// Register the receiver of decoded events. Replaces any previous one.
    pub fn set_event_handler(&mut self, handler: impl FnMut(&EventRecord) + Send + 'static) {
        self.event_handler = Some(Box::new(handler));
    }

    /// Set the broker username and password used by the next handshake.
    ///
    /// An empty username clears the credentials.
    pub fn set_credentials(&mut self, username: &str, password: &str) -> Result<(), SessionError> {
        if username.len() > MAX_CREDENTIAL_LEN || password.len() > MAX_CREDENTIAL_LEN {
            return Err(SessionError::InvalidCredentials);
        }
        if username.is_empty() {
            self.credentials = None;
            info!("Broker credentials cleared");
            return Ok(());
        }
        self.credentials = Some(Credentials {
            username: username.to_string(),
            password: Zeroizing::new(password.to_string()),
        });
        info!("Broker credentials set for user {}", username);
        Ok(())
    }

    /// Request a broker session.
    ///
    /// Fails with [`SessionError::LinkNotReady`] and moves to `Failed` unless
    /// the link is `Connected`. Otherwise moves to `Connecting`; the handshake
    /// runs on the next [`update`](Self::update). A no-op while already
    /// `Connecting` or `Connected`.
    pub fn connect(&mut self, link: &LinkSnapshot) -> Result<(), SessionError> {
        self.link = link.clone();
        if !link.is_connected() {
            warn!("Cannot connect to broker - link is {}", link.status);
            self.transition(SessionStatus::Failed, "Link not ready");
            return Err(SessionError::LinkNotReady);
        }
        if matches!(self.status, SessionStatus::Connecting | SessionStatus::Connected) {
            debug!("Connect ignored - session already {}", self.status);
            return Ok(());
        }

        info!("Connecting to broker {}", self.config.broker_info());
        self.wanted = true;
        self.next_attempt = Some(self.clock.now());
        self.transition(SessionStatus::Connecting, "Connecting to broker...");
        Ok(())
    }

    /// Close the session and stop retrying.
    pub fn disconnect(&mut self) {
        info!("Disconnecting from broker");
        self.wanted = false;
        self.next_attempt = None;
        if self.transport.is_connected() {
            self.transport.disconnect();
        }
        self.transition(SessionStatus::Disconnected, "Disconnected");
    }

    pub fn subscribe(&mut self, topic: &str) -> Result<(), SessionError> {
        self.ensure_connected()?;
        if !self.transport.subscribe(topic) {
            warn!("Failed to subscribe to {}", topic);
            return Err(SessionError::Rejected("subscribe"));
        }
        info!("Subscribed to topic: {}", topic);
        Ok(())
    }

    pub fn unsubscribe(&mut self, topic: &str) -> Result<(), SessionError> {
        self.ensure_connected()?;
        if !self.transport.unsubscribe(topic) {
            warn!("Failed to unsubscribe from {}", topic);
            return Err(SessionError::Rejected("unsubscribe"));
        }
        info!("Unsubscribed from topic: {}", topic);
        Ok(())
    }

    /// Publish now or fail. Nothing is queued while disconnected.
    pub fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), SessionError> {
        self.ensure_connected()?;
        if !self.transport.publish(topic, payload) {
            warn!("Failed to publish to {}", topic);
            return Err(SessionError::Rejected("publish"));
        }
        debug!("Published {} bytes to {}", payload.len(), topic);
        Ok(())
    }

    /// Publish the current status snapshot.
    pub fn send_status_update(&mut self) -> Result<(), SessionError> {
        let snapshot = StatusSnapshot::new(
            &self.device,
            self.status.as_str(),
            &self.link,
            self.timestamp(),
        );
        let topic = self.config.status_topic.clone();
        self.publish_json(&topic, &snapshot)
    }

    /// Publish a heartbeat and restart the heartbeat clock.
    pub fn send_heartbeat(&mut self) -> Result<(), SessionError> {
        let heartbeat = Heartbeat::new(&self.device, &self.link, self.timestamp());
        let topic = self.config.heartbeat_topic.clone();
        self.publish_json(&topic, &heartbeat)?;
        self.last_heartbeat = self.clock.now();
        debug!("Heartbeat sent");
        Ok(())
    }

    /// Periodic tick: reconcile with the link, drive the transport, fire due
    /// handshakes and heartbeats, and dispatch inbound events.
    ///
    /// A tick that runs a handshake waits for the broker's acknowledgement and
    /// can hold the control loop for up to the transport's connect timeout
    /// (10 s by default). All other ticks return without waiting.
    pub fn update(&mut self, link: &LinkSnapshot) {
        let previous_link = self.link.status;
        self.link = link.clone();
        let now = self.clock.now();

        if !link.is_connected() {
            if self.status.is_active() {
                if self.transport.is_connected() {
                    self.transport.disconnect();
                }
                self.next_attempt = None;
                self.transition(SessionStatus::Failed, "Link lost");
            }
            return;
        }

        if previous_link != LinkStatus::Connected
            && self.status == SessionStatus::Failed
            && self.wanted
        {
            self.next_attempt = Some(now);
            self.transition(SessionStatus::Reconnecting, "Link restored, reconnecting");
        }

        match self.status {
            SessionStatus::Connected => {
                if !self.transport.is_connected() {
                    self.next_attempt = Some(now + self.config.reconnect_interval);
                    self.transition(SessionStatus::Reconnecting, "Broker connection lost");
                    return;
                }

                for message in self.transport.pump() {
                    self.handle_message(message);
                }

                if now.duration_since(self.last_heartbeat) >= self.config.heartbeat_interval {
                    if let Err(e) = self.send_heartbeat() {
                        warn!("Heartbeat failed: {}", e);
                    }
                }
            }
            SessionStatus::Connecting | SessionStatus::Reconnecting => {
                if self.next_attempt.is_some_and(|due| now >= due) {
                    self.attempt_connection(now);
                }
            }
            SessionStatus::Disconnected | SessionStatus::Failed => {}
        }
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn status_str(&self) -> &'static str {
        self.status.as_str()
    }

    /// `Connected` and the transport agrees.
    pub fn is_connected(&self) -> bool {
        self.status == SessionStatus::Connected && self.transport.is_connected()
    }

    /// `host:port` of the broker.
    pub fn broker_info(&self) -> String {
        self.config.broker_info()
    }

    pub fn config(&self) -> &BrokerConfig {
        &self.config
    }

    pub fn device(&self) -> &DeviceInfo {
        &self.device
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Dump the manager state to the log.
    pub fn log_status(&self) {
        info!("Session manager status:");
        info!("  Status: {}", self.status);
        info!("  Broker: {}", self.config.broker_info());
        info!(
            "  Client id: {}",
            self.device.client_id(&self.config.client_id_prefix)
        );
        info!(
            "  Transport connected: {}",
            if self.transport.is_connected() { "yes" } else { "no" }
        );
        info!("  Link: {}", self.link.status);
    }

    fn attempt_connection(&mut self, now: Instant) {
        let client_id = self.device.client_id(&self.config.client_id_prefix);
        info!(
            "Attempting broker connection to {} as {}",
            self.config.broker_info(),
            client_id
        );

        let (username, password) = match &self.credentials {
            Some(c) => (Some(c.username.as_str()), Some(c.password.as_str())),
            None => (None, None),
        };

        if self.transport.connect(&client_id, username, password) {
            self.next_attempt = None;
            self.transition(SessionStatus::Connected, "Connected to broker");
            self.on_session_established(now);
        } else {
            self.next_attempt = Some(now + self.config.reconnect_interval);
            self.transition(SessionStatus::Reconnecting, "Connection failed, will retry");
        }
    }

    fn on_session_established(&mut self, now: Instant) {
        let events_topic = self.config.events_topic.clone();
        if let Err(e) = self.subscribe(&events_topic) {
            warn!("Event subscription failed: {}", e);
        }

        let descriptor =
            DeviceDescriptor::new(&self.device, &self.config, &self.link, self.timestamp());
        let topic = self.config.device_info_topic(&self.device.device_id());
        if let Err(e) = self.publish_json(&topic, &descriptor) {
            warn!("Device info publish failed: {}", e);
        }

        if let Err(e) = self.send_status_update() {
            warn!("Status publish failed: {}", e);
        }

        self.last_heartbeat = now;
    }

    fn handle_message(&mut self, message: InboundMessage) {
        if message.topic != self.config.events_topic {
            debug!("Ignoring message on {}", message.topic);
            return;
        }

        match decode_event(&message.payload, self.config.buffer_size) {
            Ok(record) => {
                info!(
                    "Processed event - source: {}, intensity: {}",
                    record.source, record.intensity
                );
                if let Some(handler) = self.event_handler.as_mut() {
                    handler(&record);
                }
            }
            Err(e) => warn!("Dropping message on {}: {}", message.topic, e),
        }
    }

    fn publish_json<D: Serialize>(
        &mut self,
        topic: &str,
        document: &D,
    ) -> Result<(), SessionError> {
        let payload = serde_json::to_vec(document).map_err(SessionError::Encode)?;
        self.publish(topic, &payload)
    }

    fn ensure_connected(&self) -> Result<(), SessionError> {
        if self.is_connected() {
            Ok(())
        } else {
            Err(SessionError::NotConnected)
        }
    }

    /// Milliseconds since construction.
    fn timestamp(&self) -> u64 {
        let elapsed = self.clock.now().duration_since(self.started);
        u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX)
    }

    fn transition(&mut self, status: SessionStatus, reason: &str) {
        if self.status == status {
            debug!("Session status unchanged ({}) - {}", status, reason);
            return;
        }
        self.status = status;
        info!("Session status changed to {} - {}", status, reason);
        if let Some(handler) = self.status_handler.as_mut() {
            handler(status, reason);
        }
    }
}

/// Errors returned by Session Manager operations.
#[derive(Debug)]
pub enum SessionError {
    /// The wireless link is not `Connected`.
    LinkNotReady,
    /// Broker username or password out of bounds.
    InvalidCredentials,
    /// No broker session.
    NotConnected,
    /// The transport refused the operation.
    Rejected(&'static str),
    /// A telemetry document could not be serialized.
    Encode(serde_json::Error),
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LinkNotReady => write!(f, "link not ready"),
            Self::InvalidCredentials => {
                write!(f, "credentials exceed {} bytes", MAX_CREDENTIAL_LEN)
            }
            Self::NotConnected => write!(f, "not connected to broker"),
            Self::Rejected(operation) => write!(f, "{} rejected by transport", operation),
            Self::Encode(e) => write!(f, "encoding failed: {}", e),
        }
    }
}

impl std::error::Error for SessionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Encode(e) => Some(e),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::event::DataSource;
    use crate::link::{event_channel, LinkManager, SimulatedRadio};
    use crate::session::loopback::LoopbackBroker;
    use crate::store::MemoryStore;
    use std::net::Ipv4Addr;
    use std::sync::Mutex;
    use std::time::Duration;

    const MAC: [u8; 6] = [0x24, 0x6f, 0x28, 0xa1, 0x0b, 0x3c];

    fn link_up() -> LinkSnapshot {
        LinkSnapshot {
            status: LinkStatus::Connected,
            identifier: Some("HomeNet".into()),
            signal_level: -52,
            address: Some(Ipv4Addr::new(192, 168, 1, 50)),
        }
    }

    fn link_down() -> LinkSnapshot {
        LinkSnapshot::down(LinkStatus::Disconnected)
    }

    struct Harness {
        session: SessionManager<LoopbackBroker>,
        broker: LoopbackBroker,
        clock: ManualClock,
        transitions: Arc<Mutex<Vec<SessionStatus>>>,
        events: Arc<Mutex<Vec<EventRecord>>>,
    }

    impl Harness {
        fn new() -> Self {
            let broker = LoopbackBroker::new();
            let _ = env_logger::builder().is_test(true).try_init();
            let clock = ManualClock::new();
            let mut session = SessionManager::new(
                broker.clone(),
                BrokerConfig::default(),
                DeviceInfo::new(MAC),
                Arc::new(clock.clone()),
            );
            let transitions = Arc::new(Mutex::new(Vec::new()));
            let sink = transitions.clone();
            session.set_status_handler(move |status, _| sink.lock().unwrap().push(status));
            let events = Arc::new(Mutex::new(Vec::new()));
            let sink = events.clone();
            session.set_event_handler(move |record| sink.lock().unwrap().push(record.clone()));
            Self {
                session,
                broker,
                clock,
                transitions,
                events,
            }
        }

        fn tick(&mut self, link: &LinkSnapshot) {
            self.clock.advance(Duration::from_millis(100));
            self.session.update(link);
            assert!(
                self.session.status() != SessionStatus::Connected || link.is_connected(),
                "session Connected while link is {}",
                link.status
            );
        }

        fn connect(&mut self) {
            self.session.connect(&link_up()).unwrap();
            self.tick(&link_up());
            assert_eq!(self.session.status(), SessionStatus::Connected);
        }
    }

    #[test]
    fn test_connect_requires_link() {
        let mut h = Harness::new();
        let result = h.session.connect(&link_down());
        assert!(matches!(result, Err(SessionError::LinkNotReady)));
        assert_eq!(h.session.status(), SessionStatus::Failed);
        assert_eq!(h.broker.connect_attempts(), 0);
    }

    #[test]
    fn test_connect_flow() {
        let mut h = Harness::new();
        h.session.connect(&link_up()).unwrap();
        assert_eq!(h.session.status(), SessionStatus::Connecting);

        h.tick(&link_up());
        assert_eq!(h.session.status(), SessionStatus::Connected);
        assert!(h.session.is_connected());
        assert_eq!(h.broker.client_id().as_deref(), Some("WindChime_28A10B3C"));
        assert_eq!(h.broker.subscriptions(), vec!["windchime/events".to_string()]);

        let published = h.broker.published();
        assert_eq!(published.len(), 2);
        assert_eq!(published[0].topic, "windchime/device/24:6F:28:A1:0B:3C/info");
        assert_eq!(published[1].topic, "windchime/status");

        let status: serde_json::Value = serde_json::from_slice(&published[1].payload).unwrap();
        assert_eq!(status["mqtt_status"], "Connected");
        assert_eq!(status["wifi_status"], "Connected");
        assert_eq!(status["wifi_ssid"], "HomeNet");

        assert_eq!(
            *h.transitions.lock().unwrap(),
            vec![SessionStatus::Connecting, SessionStatus::Connected]
        );
    }

    #[test]
    fn test_connect_while_connected_is_noop() {
        let mut h = Harness::new();
        h.connect();
        h.session.connect(&link_up()).unwrap();
        assert_eq!(h.session.status(), SessionStatus::Connected);

        h.tick(&link_up());
        assert_eq!(h.broker.connect_attempts(), 1);
        assert_eq!(
            h.broker
                .published_on("windchime/device/24:6F:28:A1:0B:3C/info")
                .len(),
            1
        );
        assert_eq!(
            *h.transitions.lock().unwrap(),
            vec![SessionStatus::Connecting, SessionStatus::Connected]
        );
    }

    #[test]
    fn test_connect_while_connecting_is_noop() {
        let mut h = Harness::new();
        h.broker.set_reachable(false);
        h.session.connect(&link_up()).unwrap();
        h.session.connect(&link_up()).unwrap();
        assert_eq!(h.session.status(), SessionStatus::Connecting);
        assert_eq!(h.transitions.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_credentials_passed_to_transport() {
        let mut h = Harness::new();
        h.session.set_credentials("chime", "secret").unwrap();
        h.connect();
        assert_eq!(h.broker.username().as_deref(), Some("chime"));
    }

    #[test]
    fn test_credentials_bounds() {
        let mut h = Harness::new();
        let long = "u".repeat(MAX_CREDENTIAL_LEN + 1);
        assert!(matches!(
            h.session.set_credentials(&long, "p"),
            Err(SessionError::InvalidCredentials)
        ));
        h.session.set_credentials("", "").unwrap();
        h.connect();
        assert_eq!(h.broker.username(), None);
    }

    #[test]
    fn test_handshake_failure_backs_off() {
        let mut h = Harness::new();
        h.broker.set_reachable(false);
        h.session.connect(&link_up()).unwrap();
        h.tick(&link_up());
        assert_eq!(h.session.status(), SessionStatus::Reconnecting);
        assert_eq!(h.broker.connect_attempts(), 1);

        h.broker.set_reachable(true);
        h.clock.advance(Duration::from_secs(4));
        h.tick(&link_up());
        assert_eq!(h.broker.connect_attempts(), 1);

        h.clock.advance(Duration::from_secs(1));
        h.tick(&link_up());
        assert_eq!(h.broker.connect_attempts(), 2);
        assert_eq!(h.session.status(), SessionStatus::Connected);
    }

    #[test]
    fn test_publish_requires_session() {
        let mut h = Harness::new();
        assert!(matches!(
            h.session.publish("t", b"x"),
            Err(SessionError::NotConnected)
        ));
        assert!(matches!(
            h.session.subscribe("t"),
            Err(SessionError::NotConnected)
        ));
        assert!(h.broker.published().is_empty());
    }

    #[test]
    fn test_publish_and_unsubscribe() {
        let mut h = Harness::new();
        h.connect();
        h.session.publish("custom/topic", b"hello").unwrap();
        assert_eq!(h.broker.published_on("custom/topic"), vec![b"hello".to_vec()]);

        h.session.unsubscribe("windchime/events").unwrap();
        assert!(h.broker.subscriptions().is_empty());
    }

    #[test]
    fn test_inbound_event_dispatched() {
        let mut h = Harness::new();
        h.connect();
        assert!(h.broker.inject(
            "windchime/events",
            br#"{"data":{"source":"wiki","description_title":"X"}}"#.to_vec()
        ));
        h.tick(&link_up());

        let events = h.events.lock().unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].source, DataSource::Encyclopedia);
        assert_eq!(events[0].intensity, 60);
    }

    #[test]
    fn test_malformed_and_foreign_messages_dropped() {
        let mut h = Harness::new();
        h.connect();
        h.session.subscribe("other/topic").unwrap();
        h.broker.inject("windchime/events", b"{not json".to_vec());
        h.broker.inject("windchime/events", br#"{"nodata":1}"#.to_vec());
        h.broker.inject("windchime/events", vec![b' '; 2000]);
        h.broker
            .inject("other/topic", br#"{"data":{"source":"wind"}}"#.to_vec());
        h.tick(&link_up());

        assert!(h.events.lock().unwrap().is_empty());
        assert_eq!(h.session.status(), SessionStatus::Connected);
    }

    #[test]
    fn test_heartbeat_interval() {
        let mut h = Harness::new();
        h.connect();
        h.clock.advance(Duration::from_secs(29));
        h.tick(&link_up());
        assert!(h.broker.published_on("windchime/heartbeat").is_empty());

        h.clock.advance(Duration::from_secs(1));
        h.tick(&link_up());
        let beats = h.broker.published_on("windchime/heartbeat");
        assert_eq!(beats.len(), 1);
        let beat: serde_json::Value = serde_json::from_slice(&beats[0]).unwrap();
        assert_eq!(beat["wifi_rssi"], -52);
        assert_eq!(beat["uptime"], 30);

        h.tick(&link_up());
        assert_eq!(h.broker.published_on("windchime/heartbeat").len(), 1);
    }

    #[test]
    fn test_link_loss_fails_session_within_one_tick() {
        let mut h = Harness::new();
        h.connect();
        h.tick(&link_down());
        assert_eq!(h.session.status(), SessionStatus::Failed);
        assert!(!h.broker.is_connected());
    }

    #[test]
    fn test_link_restore_reconnects_without_backoff() {
        let mut h = Harness::new();
        h.connect();
        h.tick(&link_down());
        h.tick(&link_down());

        h.tick(&link_up());
        assert_eq!(h.broker.connect_attempts(), 2);
        assert_eq!(h.session.status(), SessionStatus::Connected);
        assert_eq!(
            *h.transitions.lock().unwrap(),
            vec![
                SessionStatus::Connecting,
                SessionStatus::Connected,
                SessionStatus::Failed,
                SessionStatus::Reconnecting,
                SessionStatus::Connected,
            ]
        );
    }

    #[test]
    fn test_link_restore_after_explicit_disconnect_stays_down() {
        let mut h = Harness::new();
        h.connect();
        h.session.disconnect();
        h.tick(&link_down());
        h.tick(&link_up());
        assert_eq!(h.session.status(), SessionStatus::Disconnected);
        assert_eq!(h.broker.connect_attempts(), 1);
    }

    #[test]
    fn test_broker_drop_reconnects_with_backoff() {
        let mut h = Harness::new();
        h.connect();
        h.broker.drop_session();
        h.tick(&link_up());
        assert_eq!(h.session.status(), SessionStatus::Reconnecting);

        h.tick(&link_up());
        assert_eq!(h.broker.connect_attempts(), 1);

        h.clock.advance(Duration::from_secs(5));
        h.tick(&link_up());
        assert_eq!(h.session.status(), SessionStatus::Connected);
        assert_eq!(h.broker.subscriptions(), vec!["windchime/events".to_string()]);
    }

    #[test]
    fn test_link_and_session_end_to_end() {
        let (tx, rx) = event_channel();
        let radio = SimulatedRadio::new(tx);
        let clock = ManualClock::new();
        let mut link = LinkManager::new(
            radio.clone(),
            MemoryStore::new(),
            rx,
            Arc::new(clock.clone()),
        );
        let broker = LoopbackBroker::new();
        let mut session = SessionManager::new(
            broker.clone(),
            BrokerConfig::default(),
            DeviceInfo::new(MAC),
            Arc::new(clock.clone()),
        );

        let tick = |link: &mut LinkManager<SimulatedRadio, MemoryStore>,
                        session: &mut SessionManager<LoopbackBroker>| {
            clock.advance(Duration::from_millis(500));
            link.update();
            let snapshot = link.snapshot();
            session.update(&snapshot);
            assert!(session.status() != SessionStatus::Connected || snapshot.is_connected());
        };

        link.connect("HomeNet", "password123", false).unwrap();
        radio.acquire_address(Ipv4Addr::new(192, 168, 1, 77));
        tick(&mut link, &mut session);
        assert_eq!(link.status(), LinkStatus::Connected);

        session.connect(&link.snapshot()).unwrap();
        tick(&mut link, &mut session);
        assert_eq!(session.status(), SessionStatus::Connected);

        radio.drop_link();
        tick(&mut link, &mut session);
        assert_eq!(link.status(), LinkStatus::Disconnected);
        assert_eq!(session.status(), SessionStatus::Failed);

        link.connect("HomeNet", "password123", false).unwrap();
        radio.acquire_address(Ipv4Addr::new(192, 168, 1, 77));
        tick(&mut link, &mut session);
        assert_eq!(session.status(), SessionStatus::Connected);
        assert_eq!(broker.connect_attempts(), 2);
    }
}
