//! MQTT transport for host builds.
//!
//! Uses the synchronous `rumqttc` client. The client owns a private
//! single-threaded runtime, so these calls must not be made from inside
//! another tokio runtime context.

use super::transport::{BrokerTransport, InboundMessage};
use crate::config::BrokerConfig;
use log::{debug, info, warn};
use rumqttc::{
    Client, ConnectReturnCode, Connection, Event, MqttOptions, Packet, QoS, TryRecvError,
};
use std::time::{Duration, Instant};

/// Requests queued between the client handle and its event loop.
const REQUEST_CAPACITY: usize = 16;

/// Upper bound on events handled by one `pump()`.
const MAX_EVENTS_PER_PUMP: usize = 64;

/// `rumqttc` transport.
pub struct MqttTransport {
    host: String,
    port: u16,
    keep_alive: Duration,
    connect_timeout: Duration,
    session: Option<(Client, Connection)>,
    connected: bool,
}

impl MqttTransport {
    pub fn new(config: &BrokerConfig) -> Self {
        Self {
            host: config.host.clone(),
            port: config.port,
            keep_alive: config.keep_alive,
            connect_timeout: config.connect_timeout,
            session: None,
            connected: false,
        }
    }

    fn client(&self) -> Option<&Client> {
        if !self.connected {
            return None;
        }
        self.session.as_ref().map(|(client, _)| client)
    }

    /// Poll the event loop until the broker answers the CONNECT.
    fn await_connack(connection: &mut Connection, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                warn!("Broker handshake timed out");
                return false;
            }
            match connection.recv_timeout(remaining) {
                Ok(Ok(Event::Incoming(Packet::ConnAck(ack)))) => {
                    if ack.code == ConnectReturnCode::Success {
                        return true;
                    }
                    warn!("Broker refused connection: {:?}", ack.code);
                    return false;
                }
                Ok(Ok(event)) => debug!("Handshake event: {:?}", event),
                Ok(Err(e)) => {
                    warn!("Broker handshake failed: {}", e);
                    return false;
                }
                Err(_) => {
                    warn!("Broker handshake timed out");
                    return false;
                }
            }
        }
    }
}

impl BrokerTransport for MqttTransport {
    fn connect(
        &mut self,
        client_id: &str,
        username: Option<&str>,
        password: Option<&str>,
    ) -> bool {
        self.disconnect();

        let mut options = MqttOptions::new(client_id, self.host.as_str(), self.port);
        options.set_keep_alive(self.keep_alive);
        options.set_clean_session(true);
        if let Some(username) = username {
            options.set_credentials(username, password.unwrap_or_default());
        }

        let (client, mut connection) = Client::new(options, REQUEST_CAPACITY);
        if !Self::await_connack(&mut connection, self.connect_timeout) {
            return false;
        }

        info!("MQTT session open to {}:{}", self.host, self.port);
        self.session = Some((client, connection));
        self.connected = true;
        true
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    fn publish(&mut self, topic: &str, payload: &[u8]) -> bool {
        match self.client() {
            Some(client) => client
                .try_publish(topic, QoS::AtMostOnce, false, payload.to_vec())
                .map_err(|e| warn!("MQTT publish failed: {}", e))
                .is_ok(),
            None => false,
        }
    }

    fn subscribe(&mut self, topic: &str) -> bool {
        match self.client() {
            Some(client) => client
                .try_subscribe(topic, QoS::AtMostOnce)
                .map_err(|e| warn!("MQTT subscribe failed: {}", e))
                .is_ok(),
            None => false,
        }
    }

    fn unsubscribe(&mut self, topic: &str) -> bool {
        match self.client() {
            Some(client) => client
                .try_unsubscribe(topic)
                .map_err(|e| warn!("MQTT unsubscribe failed: {}", e))
                .is_ok(),
            None => false,
        }
    }

    fn pump(&mut self) -> Vec<InboundMessage> {
        let mut messages = Vec::new();
        let Some((_, connection)) = self.session.as_mut() else {
            return messages;
        };

        for _ in 0..MAX_EVENTS_PER_PUMP {
            match connection.try_recv() {
                Ok(Ok(Event::Incoming(Packet::Publish(publish)))) => {
                    messages.push(InboundMessage::new(
                        publish.topic,
                        publish.payload.to_vec(),
                    ));
                }
                Ok(Ok(Event::Incoming(Packet::Disconnect))) => {
                    warn!("Broker closed the session");
                    self.connected = false;
                    break;
                }
                Ok(Ok(_)) => {}
                Ok(Err(e)) => {
                    warn!("MQTT connection error: {}", e);
                    self.connected = false;
                    break;
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    self.connected = false;
                    break;
                }
            }
        }

        if !self.connected {
            self.session = None;
        }
        messages
    }

    fn disconnect(&mut self) {
        if let Some((client, _)) = self.session.take() {
            if self.connected {
                if let Err(e) = client.try_disconnect() {
                    debug!("MQTT disconnect request failed: {}", e);
                }
            }
        }
        self.connected = false;
    }
}
