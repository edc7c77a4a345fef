//! Wireless link configuration.
//!
//! Platform-independent types for the single saved network, plus the timing
//! constants the Link Manager runs on.
//!
//! # Example
//!
//! ```
//! use windchime_esp32::config::LinkConfig;
//!
//! let config = LinkConfig::new("MyNetwork", "MyPassword", true).unwrap();
//! assert!(config.validate().is_ok());
//! assert!(!config.is_open());
//! ```

use std::fmt;
use std::time::Duration;
use zeroize::Zeroizing;

/// Maximum network identifier length per IEEE 802.11.
pub const MAX_IDENTIFIER_LEN: usize = 32;

/// Maximum passphrase length for WPA2.
pub const MAX_SECRET_LEN: usize = 64;

/// Minimum passphrase length for WPA2.
pub const MIN_SECRET_LEN: usize = 8;

/// How long a connect attempt may stay in `Connecting`.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(15);

/// Minimum spacing between two scan requests.
pub const SCAN_INTERVAL: Duration = Duration::from_secs(5);

/// A scan that has not completed after this long is considered stuck.
pub const SCAN_TIMEOUT: Duration = Duration::from_secs(30);

/// Period of the timeout and health checks run from `update()`.
pub const HEALTH_CHECK_PERIOD: Duration = Duration::from_secs(1);

/// Credentials for the one network the device remembers.
#[derive(Clone, PartialEq, Eq)]
pub struct LinkConfig {
    /// Network identifier (1-32 bytes).
    pub identifier: String,
    /// Passphrase (8-64 bytes for WPA2, empty for open networks).
    pub secret: Zeroizing<String>,
    /// Whether to join this network at boot.
    pub auto_connect: bool,
}

impl LinkConfig {
    /// Create a validated configuration.
    pub fn new(
        identifier: impl Into<String>,
        secret: impl Into<String>,
        auto_connect: bool,
    ) -> Result<Self, ConfigError> {
        let config = Self {
            identifier: identifier.into(),
            secret: Zeroizing::new(secret.into()),
            auto_connect,
        };
        config.validate()?;
        Ok(config)
    }

    /// Check identifier and passphrase bounds.
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_identifier(&self.identifier)?;
        validate_secret(&self.secret)
    }

    /// True for networks without a passphrase.
    pub fn is_open(&self) -> bool {
        self.secret.is_empty()
    }
}

impl fmt::Debug for LinkConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LinkConfig")
            .field("identifier", &self.identifier)
            .field("secret", &"<redacted>")
            .field("auto_connect", &self.auto_connect)
            .finish()
    }
}

/// Validate a network identifier.
pub fn validate_identifier(identifier: &str) -> Result<(), ConfigError> {
    if identifier.is_empty() {
        return Err(ConfigError::IdentifierEmpty);
    }
    if identifier.len() > MAX_IDENTIFIER_LEN {
        return Err(ConfigError::IdentifierTooLong {
            len: identifier.len(),
            max: MAX_IDENTIFIER_LEN,
        });
    }
    Ok(())
}

/// Validate a passphrase. Empty is accepted for open networks.
pub fn validate_secret(secret: &str) -> Result<(), ConfigError> {
    if !secret.is_empty() && secret.len() < MIN_SECRET_LEN {
        return Err(ConfigError::SecretTooShort {
            len: secret.len(),
            min: MIN_SECRET_LEN,
        });
    }
    if secret.len() > MAX_SECRET_LEN {
        return Err(ConfigError::SecretTooLong {
            len: secret.len(),
            max: MAX_SECRET_LEN,
        });
    }
    Ok(())
}

/// Errors raised while building or restoring configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Network identifier is empty.
    IdentifierEmpty,
    /// Network identifier exceeds maximum length.
    IdentifierTooLong { len: usize, max: usize },
    /// Passphrase is too short for WPA2.
    SecretTooShort { len: usize, min: usize },
    /// Passphrase exceeds maximum length.
    SecretTooLong { len: usize, max: usize },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::IdentifierEmpty => write!(f, "network identifier cannot be empty"),
            Self::IdentifierTooLong { len, max } => {
                write!(f, "network identifier too long: {} bytes (max {})", len, max)
            }
            Self::SecretTooShort { len, min } => {
                write!(f, "passphrase too short: {} bytes (min {})", len, min)
            }
            Self::SecretTooLong { len, max } => {
                write!(f, "passphrase too long: {} bytes (max {})", len, max)
            }
        }
    }
}

impl std::error::Error for ConfigError {}
