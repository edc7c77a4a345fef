//! ESP-IDF MQTT transport.
//!
//! The ESP-IDF client runs its own task and reports through a callback.
//! Session state is mirrored in an atomic flag and inbound messages are
//! queued for `pump()`, so the control loop never touches the client task's
//! context.

use super::transport::{BrokerTransport, InboundMessage};
use crate::config::BrokerConfig;
use esp_idf_hal::delay::FreeRtos;
use esp_idf_svc::mqtt::client::{EspMqttClient, EventPayload, MqttClientConfiguration, QoS};
use log::{debug, info, warn};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;

/// Poll step while waiting for the broker to accept a session.
const CONNECT_POLL: Duration = Duration::from_millis(50);

/// ESP-IDF MQTT client transport.
pub struct EspMqttTransport {
    url: String,
    keep_alive: Duration,
    buffer_size: usize,
    connect_timeout: Duration,
    client: Option<EspMqttClient<'static>>,
    connected: Arc<AtomicBool>,
    inbound: Option<mpsc::UnboundedReceiver<InboundMessage>>,
}

impl EspMqttTransport {
    pub fn new(config: &BrokerConfig) -> Self {
        Self {
            url: format!("mqtt://{}:{}", config.host, config.port),
            keep_alive: config.keep_alive,
            buffer_size: config.buffer_size,
            connect_timeout: config.connect_timeout,
            client: None,
            connected: Arc::new(AtomicBool::new(false)),
            inbound: None,
        }
    }
}

impl BrokerTransport for EspMqttTransport {
    fn connect(
        &mut self,
        client_id: &str,
        username: Option<&str>,
        password: Option<&str>,
    ) -> bool {
        self.disconnect();

        let conf = MqttClientConfiguration {
            client_id: Some(client_id),
            username,
            password,
            keep_alive_interval: Some(self.keep_alive),
            buffer_size: self.buffer_size,
            disable_clean_session: false,
            ..Default::default()
        };

        let (tx, rx) = mpsc::unbounded_channel();
        let connected = self.connected.clone();
        let client = EspMqttClient::new_cb(&self.url, &conf, move |event| {
            match event.payload() {
                EventPayload::Connected(_) => connected.store(true, Ordering::SeqCst),
                EventPayload::Disconnected => connected.store(false, Ordering::SeqCst),
                EventPayload::Received {
                    topic: Some(topic),
                    data,
                    ..
                } => {
                    let _ = tx.send(InboundMessage::new(topic, data));
                }
                EventPayload::Error(e) => warn!("MQTT error: {:?}", e),
                _ => {}
            }
        });

        let client = match client {
            Ok(client) => client,
            Err(e) => {
                warn!("Failed to create MQTT client: {:?}", e);
                return false;
            }
        };

        let deadline = Instant::now() + self.connect_timeout;
        while !self.connected.load(Ordering::SeqCst) {
            if Instant::now() >= deadline {
                warn!("Broker handshake timed out");
                return false;
            }
            FreeRtos::delay_ms(CONNECT_POLL.as_millis() as u32);
        }

        info!("MQTT session open to {}", self.url);
        self.client = Some(client);
        self.inbound = Some(rx);
        true
    }

    fn is_connected(&self) -> bool {
        self.client.is_some() && self.connected.load(Ordering::SeqCst)
    }

    fn publish(&mut self, topic: &str, payload: &[u8]) -> bool {
        if !self.is_connected() {
            return false;
        }
        match self.client.as_mut() {
            Some(client) => client
                .publish(topic, QoS::AtMostOnce, false, payload)
                .map_err(|e| warn!("MQTT publish failed: {:?}", e))
                .is_ok(),
            None => false,
        }
    }

    fn subscribe(&mut self, topic: &str) -> bool {
        if !self.is_connected() {
            return false;
        }
        match self.client.as_mut() {
            Some(client) => client
                .subscribe(topic, QoS::AtMostOnce)
                .map_err(|e| warn!("MQTT subscribe failed: {:?}", e))
                .is_ok(),
            None => false,
        }
    }

    fn unsubscribe(&mut self, topic: &str) -> bool {
        if !self.is_connected() {
            return false;
        }
        match self.client.as_mut() {
            Some(client) => client
                .unsubscribe(topic)
                .map_err(|e| warn!("MQTT unsubscribe failed: {:?}", e))
                .is_ok(),
            None => false,
        }
    }

    fn pump(&mut self) -> Vec<InboundMessage> {
        let mut messages = Vec::new();
        if let Some(rx) = self.inbound.as_mut() {
            while let Ok(message) = rx.try_recv() {
                messages.push(message);
            }
        }
        messages
    }

    fn disconnect(&mut self) {
        if self.client.take().is_some() {
            debug!("MQTT client dropped");
        }
        self.inbound = None;
        self.connected.store(false, Ordering::SeqCst);
    }
}
