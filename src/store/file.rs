//! File-backed credential store for host builds.
//!
//! Keeps one JSON object per namespace at
//! `~/.windchime-esp32/<namespace>.json` by default.

use super::{CredentialStore, StoreError};
use log::{debug, info, warn};
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Default file for a namespace.
pub fn default_store_path(namespace: &str) -> io::Result<PathBuf> {
    let home = std::env::var("HOME")
        .map_err(|_| io::Error::new(io::ErrorKind::NotFound, "HOME not set"))?;
    Ok(PathBuf::from(home)
        .join(".windchime-esp32")
        .join(format!("{}.json", namespace)))
}

/// JSON file store. Entries are cached in memory and written through.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    entries: BTreeMap<String, String>,
}

impl FileStore {
    /// Open the store at `path`, starting empty if the file is missing or corrupt.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let entries = match fs::read_to_string(&path) {
            Ok(s) => match serde_json::from_str(&s) {
                Ok(entries) => entries,
                Err(e) => {
                    warn!("Ignoring corrupt store {:?}: {}", path, e);
                    BTreeMap::new()
                }
            },
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!("No store file at {:?}", path);
                BTreeMap::new()
            }
            Err(e) => {
                warn!("Failed to read store file {:?}: {}", path, e);
                BTreeMap::new()
            }
        };
        Self { path, entries }
    }

    /// Open the default store for `namespace`.
    pub fn open_default(namespace: &str) -> io::Result<Self> {
        Ok(Self::open(default_store_path(namespace)?))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn flush(&self) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let json = serde_json::to_string_pretty(&self.entries)?;
        fs::write(&self.path, &json)?;

        // Read back to catch silent write failures
        let read_back = fs::read_to_string(&self.path)?;
        if read_back != json {
            return Err(StoreError::Verification(format!(
                "wrote {} bytes, read {} bytes",
                json.len(),
                read_back.len()
            )));
        }
        Ok(())
    }
}

impl CredentialStore for FileStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).cloned()
    }

    fn put(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
        self.entries.insert(key.to_string(), value.to_string());
        self.flush()
    }

    fn clear(&mut self) -> Result<(), StoreError> {
        self.entries.clear();
        match fs::remove_file(&self.path) {
            Ok(()) => {
                info!("Store {:?} cleared", self.path);
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
