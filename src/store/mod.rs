//! Credential Store.
//!
//! A namespaced string key-value store that survives restarts, and the typed
//! helpers that keep the saved [`LinkConfig`] in it.
//!
//! # Back ends
//!
//! - [`MemoryStore`] - in-process map (tests, simulator)
//! - [`FileStore`] - JSON file under the user's home directory (host)
//! - `NvsStore` - ESP32 Non-Volatile Storage (ESP32 only)

mod file;
#[cfg(feature = "esp32")]
mod nvs;

pub use file::{default_store_path, FileStore};
#[cfg(feature = "esp32")]
pub use nvs::NvsStore;

use crate::config::LinkConfig;
use log::{info, warn};
use std::collections::HashMap;
use std::fmt;

/// Namespace the link credentials live in.
pub const NAMESPACE: &str = "wifi_config";

/// Key of the saved network identifier.
pub const KEY_IDENTIFIER: &str = "ssid";

/// Key of the saved passphrase.
pub const KEY_SECRET: &str = "password";

/// Key of the auto-connect flag (`"1"` / `"0"`).
pub const KEY_AUTO_CONNECT: &str = "auto_connect";

/// Every key written by [`save_link_config`].
pub const LINK_KEYS: [&str; 3] = [KEY_IDENTIFIER, KEY_SECRET, KEY_AUTO_CONNECT];

/// Persistent key-value storage scoped to one namespace.
pub trait CredentialStore {
    /// Read a value. Missing keys and unreadable entries both yield `None`.
    fn get(&self, key: &str) -> Option<String>;

    /// Write a value.
    fn put(&mut self, key: &str, value: &str) -> Result<(), StoreError>;

    /// Remove every key in the namespace.
    fn clear(&mut self) -> Result<(), StoreError>;
}

/// In-memory store.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    entries: HashMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl CredentialStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).cloned()
    }

    fn put(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn clear(&mut self) -> Result<(), StoreError> {
        self.entries.clear();
        Ok(())
    }
}

/// Load the saved network.
///
/// Returns `None` if nothing is saved or the stored entry fails validation.
pub fn load_link_config(store: &dyn CredentialStore) -> Option<LinkConfig> {
    let identifier = store.get(KEY_IDENTIFIER)?;
    if identifier.is_empty() {
        return None;
    }
    let secret = store.get(KEY_SECRET).unwrap_or_default();
    let auto_connect = matches!(
        store.get(KEY_AUTO_CONNECT).as_deref(),
        Some("1") | Some("true")
    );

    match LinkConfig::new(identifier, secret, auto_connect) {
        Ok(config) => Some(config),
        Err(e) => {
            warn!("Stored link config is invalid: {}", e);
            None
        }
    }
}

/// Persist the network so it can be joined at the next boot.
pub fn save_link_config(
    store: &mut dyn CredentialStore,
    config: &LinkConfig,
) -> Result<(), StoreError> {
    store.put(KEY_IDENTIFIER, &config.identifier)?;
    store.put(KEY_SECRET, &config.secret)?;
    store.put(
        KEY_AUTO_CONNECT,
        if config.auto_connect { "1" } else { "0" },
    )?;
    info!(
        "Link config saved - identifier: {}, auto: {}",
        config.identifier,
        if config.auto_connect { "yes" } else { "no" }
    );
    Ok(())
}

/// Forget the saved network.
pub fn clear_link_config(store: &mut dyn CredentialStore) -> Result<(), StoreError> {
    store.clear()?;
    info!("Link config cleared");
    Ok(())
}

/// Errors from a store back end.
#[derive(Debug)]
pub enum StoreError {
    /// File-system error (host).
    Io(std::io::Error),
    /// Stored document could not be (de)serialized.
    Serialization(serde_json::Error),
    /// Read-back after a write did not match.
    Verification(String),
    /// Platform storage error (ESP32 NVS).
    Platform(String),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "I/O error: {}", e),
            Self::Serialization(e) => write!(f, "serialization error: {}", e),
            Self::Verification(msg) => write!(f, "verification failed: {}", msg),
            Self::Platform(msg) => write!(f, "storage error: {}", msg),
        }
    }
}

impl std::error::Error for StoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::Serialization(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for StoreError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_save_load_roundtrip() {
        let mut store = MemoryStore::new();
        let config = LinkConfig::new("HomeNet", "password123", true).unwrap();
        save_link_config(&mut store, &config).unwrap();

        let loaded = load_link_config(&store).expect("config should load");
        assert_eq!(loaded, config);
        assert_eq!(store.get(KEY_AUTO_CONNECT).as_deref(), Some("1"));
    }

    #[test]
    fn test_load_empty_store() {
        let store = MemoryStore::new();
        assert!(load_link_config(&store).is_none());
    }

    #[test]
    fn test_load_empty_identifier() {
        let mut store = MemoryStore::new();
        store.put(KEY_IDENTIFIER, "").unwrap();
        assert!(load_link_config(&store).is_none());
    }

    #[test]
    fn test_missing_flag_means_no_auto_connect() {
        let mut store = MemoryStore::new();
        store.put(KEY_IDENTIFIER, "Cafe").unwrap();
        let loaded = load_link_config(&store).unwrap();
        assert!(loaded.is_open());
        assert!(!loaded.auto_connect);
    }

    #[test]
    fn test_corrupt_secret_is_rejected() {
        let mut store = MemoryStore::new();
        store.put(KEY_IDENTIFIER, "HomeNet").unwrap();
        store.put(KEY_SECRET, "short").unwrap();
        assert!(load_link_config(&store).is_none());
    }

    #[test]
    fn test_clear() {
        let mut store = MemoryStore::new();
        let config = LinkConfig::new("HomeNet", "password123", false).unwrap();
        save_link_config(&mut store, &config).unwrap();
        clear_link_config(&mut store).unwrap();
        assert!(store.is_empty());
        assert!(load_link_config(&store).is_none());
    }
}
