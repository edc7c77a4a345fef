//! In-process broker for tests.
//!
//! Clones share one broker. A test keeps a handle to inject inbound messages,
//! take the broker offline or inspect what was published, while the Session
//! Manager owns another as its transport.

use super::transport::{BrokerTransport, InboundMessage};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

#[derive(Debug)]
struct LoopbackState {
    reachable: bool,
    connected: bool,
    client_id: Option<String>,
    username: Option<String>,
    subscriptions: Vec<String>,
    published: Vec<InboundMessage>,
    inbound: VecDeque<InboundMessage>,
    connect_attempts: usize,
}

/// Loopback broker transport.
#[derive(Debug, Clone)]
pub struct LoopbackBroker {
    state: Arc<Mutex<LoopbackState>>,
}

impl Default for LoopbackBroker {
    fn default() -> Self {
        Self::new()
    }
}

impl LoopbackBroker {
    /// A reachable broker with no session.
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(LoopbackState {
                reachable: true,
                connected: false,
                client_id: None,
                username: None,
                subscriptions: Vec::new(),
                published: Vec::new(),
                inbound: VecDeque::new(),
                connect_attempts: 0,
            })),
        }
    }

    fn state(&self) -> MutexGuard<'_, LoopbackState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Refuse (or accept again) new sessions.
    pub fn set_reachable(&self, reachable: bool) {
        self.state().reachable = reachable;
    }

    /// Kill the current session from the broker side.
    pub fn drop_session(&self) {
        let mut state = self.state();
        state.connected = false;
        state.subscriptions.clear();
    }

    /// Deliver a message to the client. Returns `false` if the client has no
    /// session or is not subscribed to `topic`.
    pub fn inject(&self, topic: &str, payload: impl Into<Vec<u8>>) -> bool {
        let mut state = self.state();
        if !state.connected || !state.subscriptions.iter().any(|t| t == topic) {
            return false;
        }
        state.inbound.push_back(InboundMessage::new(topic, payload));
        true
    }

    /// Every message the client published, oldest first.
    pub fn published(&self) -> Vec<InboundMessage> {
        self.state().published.clone()
    }

    /// Payloads published on one topic.
    pub fn published_on(&self, topic: &str) -> Vec<Vec<u8>> {
        self.state()
            .published
            .iter()
            .filter(|m| m.topic == topic)
            .map(|m| m.payload.clone())
            .collect()
    }

    pub fn subscriptions(&self) -> Vec<String> {
        self.state().subscriptions.clone()
    }

    pub fn connect_attempts(&self) -> usize {
        self.state().connect_attempts
    }

    pub fn client_id(&self) -> Option<String> {
        self.state().client_id.clone()
    }

    pub fn username(&self) -> Option<String> {
        self.state().username.clone()
    }
}

impl BrokerTransport for LoopbackBroker {
    fn connect(
        &mut self,
        client_id: &str,
        username: Option<&str>,
        _password: Option<&str>,
    ) -> bool {
        let mut state = self.state();
        state.connect_attempts += 1;
        if !state.reachable {
            return false;
        }
        state.connected = true;
        state.client_id = Some(client_id.to_string());
        state.username = username.map(str::to_string);
        state.subscriptions.clear();
        true
    }

    fn is_connected(&self) -> bool {
        self.state().connected
    }

    fn publish(&mut self, topic: &str, payload: &[u8]) -> bool {
        let mut state = self.state();
        if !state.connected {
            return false;
        }
        state.published.push(InboundMessage::new(topic, payload));
        true
    }

    fn subscribe(&mut self, topic: &str) -> bool {
        let mut state = self.state();
        if !state.connected {
            return false;
        }
        if !state.subscriptions.iter().any(|t| t == topic) {
            state.subscriptions.push(topic.to_string());
        }
        true
    }

    fn unsubscribe(&mut self, topic: &str) -> bool {
        let mut state = self.state();
        if !state.connected {
            return false;
        }
        state.subscriptions.retain(|t| t != topic);
        true
    }

    fn pump(&mut self) -> Vec<InboundMessage> {
        let mut state = self.state();
        if !state.connected {
            return Vec::new();
        }
        state.inbound.drain(..).collect()
    }

    fn disconnect(&mut self) {
        let mut state = self.state();
        state.connected = false;
        state.subscriptions.clear();
        state.inbound.clear();
    }
}
