//! Simulated radio for host runs and tests.
//!
//! Clones share state, so a test keeps one handle to play the access point
//! (acquire an address, drop the link, finish a scan) while the Link Manager
//! owns another as its driver. Events are delivered through the same queue a
//! real driver would use.

use super::radio::{RadioDriver, RadioError, RadioEvent, RadioEventSender};
use super::status::LinkNetwork;
use std::net::Ipv4Addr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

#[derive(Debug, Default)]
struct SimState {
    networks: Vec<LinkNetwork>,
    scanning: bool,
    pending_results: Vec<LinkNetwork>,
    target: Option<String>,
    connected: bool,
    address: Option<Ipv4Addr>,
    auto_complete: bool,
    reject_commands: bool,
    connect_attempts: usize,
    scan_starts: usize,
}

/// In-memory radio driver.
#[derive(Debug, Clone)]
pub struct SimulatedRadio {
    state: Arc<Mutex<SimState>>,
    events: RadioEventSender,
}

impl SimulatedRadio {
    pub fn new(events: RadioEventSender) -> Self {
        Self {
            state: Arc::new(Mutex::new(SimState::default())),
            events,
        }
    }

    fn state(&self) -> MutexGuard<'_, SimState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Networks the next scan will report.
    pub fn set_networks(&self, networks: Vec<LinkNetwork>) {
        self.state().networks = networks;
    }

    /// Complete scans and joins immediately instead of waiting for the test
    /// to drive them. Joins succeed only for networks set via
    /// [`set_networks`](Self::set_networks).
    pub fn set_auto_complete(&self, auto_complete: bool) {
        self.state().auto_complete = auto_complete;
    }

    /// Make every command fail.
    pub fn set_reject_commands(&self, reject: bool) {
        self.state().reject_commands = reject;
    }

    /// Finish the association and hand out an address.
    pub fn acquire_address(&self, address: Ipv4Addr) {
        {
            let mut state = self.state();
            state.connected = true;
            state.address = Some(address);
        }
        self.events.send(RadioEvent::LinkUp);
        self.events.send(RadioEvent::AddressAcquired(address));
    }

    /// Lose the association as if the access point went away.
    pub fn drop_link(&self) {
        {
            let mut state = self.state();
            state.connected = false;
            state.address = None;
        }
        self.events.send(RadioEvent::LinkDown);
    }

    /// Change the live association flag without emitting an event.
    pub fn set_connected_silently(&self, connected: bool) {
        let mut state = self.state();
        state.connected = connected;
        if !connected {
            state.address = None;
        }
    }

    /// Complete the running scan.
    pub fn finish_scan(&self) {
        {
            let mut state = self.state();
            state.scanning = false;
            state.pending_results = state.networks.clone();
        }
        self.events.send(RadioEvent::ScanDone);
    }

    pub fn scan_in_progress(&self) -> bool {
        self.state().scanning
    }

    pub fn connect_attempts(&self) -> usize {
        self.state().connect_attempts
    }

    pub fn scan_starts(&self) -> usize {
        self.state().scan_starts
    }

    /// Network the last connect command targeted.
    pub fn target(&self) -> Option<String> {
        self.state().target.clone()
    }

    fn next_address(&self) -> Ipv4Addr {
        Ipv4Addr::new(192, 168, 4, 2)
    }
}

impl RadioDriver for SimulatedRadio {
    fn start_scan(&mut self) -> Result<(), RadioError> {
        let auto = {
            let mut state = self.state();
            if state.reject_commands {
                return Err(RadioError::Command("scan rejected".into()));
            }
            if state.scanning {
                return Err(RadioError::Command("scan already running".into()));
            }
            state.scanning = true;
            state.scan_starts += 1;
            state.auto_complete
        };
        if auto {
            self.finish_scan();
        }
        Ok(())
    }

    fn stop_scan(&mut self) {
        let mut state = self.state();
        state.scanning = false;
        state.pending_results.clear();
    }

    fn scan_results(&mut self) -> Vec<LinkNetwork> {
        std::mem::take(&mut self.state().pending_results)
    }

    fn connect(&mut self, identifier: &str, _secret: &str) -> Result<(), RadioError> {
        let (auto, known) = {
            let mut state = self.state();
            if state.reject_commands {
                return Err(RadioError::Command("connect rejected".into()));
            }
            state.connect_attempts += 1;
            state.target = Some(identifier.to_string());
            let known = state.networks.iter().any(|n| n.identifier == identifier);
            (state.auto_complete, known)
        };
        if auto {
            if known {
                self.acquire_address(self.next_address());
            } else {
                self.events.send(RadioEvent::LinkDown);
            }
        }
        Ok(())
    }

    fn disconnect(&mut self) -> Result<(), RadioError> {
        let was_connected = {
            let mut state = self.state();
            if state.reject_commands {
                return Err(RadioError::Command("disconnect rejected".into()));
            }
            let was = state.connected;
            state.connected = false;
            state.address = None;
            state.target = None;
            was
        };
        if was_connected {
            self.events.send(RadioEvent::LinkDown);
        }
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.state().connected
    }

    fn signal_level(&self) -> i32 {
        let state = self.state();
        if !state.connected {
            return 0;
        }
        state
            .target
            .as_ref()
            .and_then(|t| state.networks.iter().find(|n| &n.identifier == t))
            .map(|n| n.signal_level)
            .unwrap_or(-55)
    }

    fn address(&self) -> Option<Ipv4Addr> {
        self.state().address
    }

    fn connected_identifier(&self) -> Option<String> {
        let state = self.state();
        if state.connected {
            state.target.clone()
        } else {
            None
        }
    }
}
