//! Provider settings as handed over by the host.
//!
//! The host owns persistence and the settings form; this module only carries
//! the values and enforces the timeout bounds.

use crate::types::Credentials;

#[cfg(feature = "serde")]
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Timeout used when the host does not configure one.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Lowest timeout the provider will honor.
pub const MIN_TIMEOUT_SECS: u64 = 15;

/// Settings for one SourceSafe provider instance.
///
/// # Example
///
/// ```rust
/// use vsslens_core::ProviderConfig;
///
/// let config = ProviderConfig::new(r"\\server\vss\srcsafe.ini")
///     .credentials("builder", Some("secret"))
///     .timeout_secs(120);
/// assert_eq!(config.timeout().as_secs(), 120);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Deserialize))]
#[cfg_attr(feature = "serde", serde(default, rename_all = "camelCase"))]
pub struct ProviderConfig {
    /// Explicit location of `ss.exe`; when set it must exist.
    pub executable_path: Option<PathBuf>,
    pub username: Option<String>,
    pub password: Option<String>,
    /// Path to the database's `srcsafe.ini`.
    pub database_path: PathBuf,
    /// Requested timeout; see [`ProviderConfig::timeout`] for the effective value.
    pub timeout_secs: u64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        ProviderConfig {
            executable_path: None,
            username: None,
            password: None,
            database_path: PathBuf::new(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl ProviderConfig {
    /// Creates settings for the database at `database_path` with default values otherwise.
    pub fn new<P: AsRef<Path>>(database_path: P) -> Self {
        ProviderConfig {
            database_path: database_path.as_ref().to_path_buf(),
            ..Default::default()
        }
    }

    /// Sets an explicit `ss.exe` location, bypassing the install-path search.
    pub fn executable_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.executable_path = Some(path.as_ref().to_path_buf());
        self
    }

    pub fn credentials(mut self, username: &str, password: Option<&str>) -> Self {
        self.username = Some(username.to_string());
        self.password = password.map(str::to_string);
        self
    }

    pub fn timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    /// Effective timeout, never below [`MIN_TIMEOUT_SECS`].
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(MIN_TIMEOUT_SECS))
    }

    /// Credentials to pass with `-Y`, if a non-empty username is configured.
    pub fn credentials_for_invocation(&self) -> Option<Credentials> {
        self.username
            .as_deref()
            .filter(|username| !username.trim().is_empty())
            .map(|username| Credentials::new(username, self.password.clone()))
    }
}
