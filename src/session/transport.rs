//! Broker transport seam.

/// One message received from the broker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub topic: String,
    pub payload: Vec<u8>,
}

impl InboundMessage {
    pub fn new(topic: impl Into<String>, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            topic: topic.into(),
            payload: payload.into(),
        }
    }
}

/// Publish/subscribe primitive the Session Manager drives.
///
/// Every method returns `false` on failure instead of an error: the Session
/// Manager treats all transport failures the same way, by retrying on its own
/// schedule.
pub trait BrokerTransport {
    /// Open a session. Returns once the broker accepted or refused it, or the
    /// transport's own connect timeout expired.
    fn connect(&mut self, client_id: &str, username: Option<&str>, password: Option<&str>)
        -> bool;

    /// Live session flag.
    fn is_connected(&self) -> bool;

    fn publish(&mut self, topic: &str, payload: &[u8]) -> bool;

    fn subscribe(&mut self, topic: &str) -> bool;

    fn unsubscribe(&mut self, topic: &str) -> bool;

    /// Service the connection and return the messages received since the last
    /// call. Must be called every tick while connected.
    fn pump(&mut self) -> Vec<InboundMessage>;

    fn disconnect(&mut self);
}
