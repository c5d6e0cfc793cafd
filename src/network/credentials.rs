//! Wi-Fi credential types and validation.
//!
//! Platform-independent, so the same rules are applied when a configuration
//! document is saved over HTTP and when the radio is brought up at boot.
//!
//! # Example
//!
//! ```
//! use modhub_esp32::network::Credentials;
//!
//! let creds = Credentials::new("MyNetwork", "MyPassword").unwrap();
//! assert!(!creds.is_open());
//! ```

use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Maximum SSID length per IEEE 802.11 standard.
pub const MAX_SSID_LEN: usize = 32;

/// Maximum password length for WPA2.
pub const MAX_PASSWORD_LEN: usize = 64;

/// Minimum password length for WPA2.
pub const MIN_PASSWORD_LEN: usize = 8;

/// SSID and password for one network identity.
///
/// The password is wiped from memory when the value is dropped.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct Credentials {
    /// Network SSID (up to 32 bytes).
    pub ssid: String,
    /// Network password (8-64 bytes for WPA2, empty for open networks).
    pub password: String,
}

impl Credentials {
    /// Credentials for a hosted WPA2 access point. The SSID must be non-empty
    /// and the password empty (open) or 8-64 bytes.
    pub fn new(
        ssid: impl Into<String>,
        password: impl Into<String>,
    ) -> Result<Self, CredentialError> {
        let creds = Self {
            ssid: ssid.into(),
            password: password.into(),
        };
        validate_ssid(&creds.ssid, false)?;
        validate_password(&creds.password)?;
        Ok(creds)
    }

    /// Credentials for joining an existing network.
    ///
    /// Only the length limits are enforced; the access point decides whether
    /// the password is acceptable.
    pub fn client(
        ssid: impl Into<String>,
        password: impl Into<String>,
    ) -> Result<Self, CredentialError> {
        let creds = Self {
            ssid: ssid.into(),
            password: password.into(),
        };
        validate_ssid(&creds.ssid, false)?;
        validate_client_password(&creds.password)?;
        Ok(creds)
    }

    /// Check if this is an open network (no password).
    pub fn is_open(&self) -> bool {
        self.password.is_empty()
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("ssid", &self.ssid)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Validate an SSID. An empty SSID is only accepted when `allow_empty` is set
/// (an empty client SSID means "no client network configured").
pub fn validate_ssid(ssid: &str, allow_empty: bool) -> Result<(), CredentialError> {
    if ssid.is_empty() && !allow_empty {
        return Err(CredentialError::SsidEmpty);
    }
    if ssid.len() > MAX_SSID_LEN {
        return Err(CredentialError::SsidTooLong {
            len: ssid.len(),
            max: MAX_SSID_LEN,
        });
    }
    Ok(())
}

/// Validate a password (empty is OK for open networks).
pub fn validate_password(password: &str) -> Result<(), CredentialError> {
    if !password.is_empty() && password.len() < MIN_PASSWORD_LEN {
        return Err(CredentialError::PasswordTooShort {
            len: password.len(),
            min: MIN_PASSWORD_LEN,
        });
    }
    if password.len() > MAX_PASSWORD_LEN {
        return Err(CredentialError::PasswordTooLong {
            len: password.len(),
            max: MAX_PASSWORD_LEN,
        });
    }
    Ok(())
}

/// Validate a password used to join a network (at most 64 bytes).
pub fn validate_client_password(password: &str) -> Result<(), CredentialError> {
    if password.len() > MAX_PASSWORD_LEN {
        return Err(CredentialError::PasswordTooLong {
            len: password.len(),
            max: MAX_PASSWORD_LEN,
        });
    }
    Ok(())
}

/// Credential validation failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialError {
    /// SSID is empty.
    SsidEmpty,
    /// SSID exceeds maximum length.
    SsidTooLong { len: usize, max: usize },
    /// Password is too short for WPA2.
    PasswordTooShort { len: usize, min: usize },
    /// Password exceeds maximum length.
    PasswordTooLong { len: usize, max: usize },
}

impl fmt::Display for CredentialError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SsidEmpty => write!(f, "SSID cannot be empty"),
            Self::SsidTooLong { len, max } => {
                write!(f, "SSID too long: {} bytes (max {})", len, max)
            }
            Self::PasswordTooShort { len, min } => {
                write!(f, "password too short: {} bytes (min {})", len, min)
            }
            Self::PasswordTooLong { len, max } => {
                write!(f, "password too long: {} bytes (max {})", len, max)
            }
        }
    }
}

impl std::error::Error for CredentialError {}
