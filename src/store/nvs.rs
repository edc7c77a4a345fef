//! NVS credential store.
//!
//! Stores strings in ESP32's Non-Volatile Storage so they persist across
//! reboots.

use super::{CredentialStore, StoreError};
use esp_idf_svc::nvs::{EspDefaultNvsPartition, EspNvs, NvsDefault};
use esp_idf_sys::EspError;
use log::{info, warn};

/// Largest value read back from NVS (passphrase plus terminator, with margin).
const MAX_VALUE_LEN: usize = 96;

/// Credential store over one NVS namespace.
pub struct NvsStore {
    nvs: EspNvs<NvsDefault>,
    /// NVS has no per-namespace erase in the safe API; these keys are removed
    /// by `clear()`.
    keys: &'static [&'static str],
}

impl NvsStore {
    /// Open `namespace` on the default NVS partition.
    pub fn open(
        partition: EspDefaultNvsPartition,
        namespace: &str,
        keys: &'static [&'static str],
    ) -> Result<Self, EspError> {
        let nvs = EspNvs::new(partition, namespace, true)?;
        info!("NVS namespace '{}' opened", namespace);
        Ok(Self { nvs, keys })
    }
}

impl CredentialStore for NvsStore {
    fn get(&self, key: &str) -> Option<String> {
        let mut buf = [0u8; MAX_VALUE_LEN];
        match self.nvs.get_str(key, &mut buf) {
            Ok(value) => value.map(str::to_string),
            Err(e) => {
                warn!("Failed to read '{}' from NVS: {:?}", key, e);
                None
            }
        }
    }

    fn put(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
        self.nvs.set_str(key, value).map_err(platform)
    }

    fn clear(&mut self) -> Result<(), StoreError> {
        for key in self.keys {
            self.nvs.remove(key).map_err(platform)?;
        }
        Ok(())
    }
}

fn platform(e: EspError) -> StoreError {
    StoreError::Platform(format!("{:?}", e))
}
