//! Relay configuration and builder.
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//! use cpterm_bridge::Relay;
//!
//! # fn example() -> cpterm_bridge::Result<()> {
//! let relay = Relay::builder()
//!     .native_host("/usr/local/bin/cpterm-host")
//!     .idle_shutdown(Duration::from_secs(30))
//!     .build()?;
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::error::{Error, Result};

use super::core::Relay;
use super::launcher::{NativeLauncher, ProcessLauncher};
use super::prefs::{MemoryPreferenceStore, PreferenceStore};

// ============================================================================
// Constants
// ============================================================================

/// Version the native host must announce in its handshake.
pub const HOST_PROTOCOL_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Delay between the last session leaving and the host being asked to quit.
pub const DEFAULT_IDLE_SHUTDOWN: Duration = Duration::from_secs(10);

/// How long a freshly launched host has to announce its version.
pub const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(30);

// ============================================================================
// RelayConfig
// ============================================================================

/// Validated relay configuration.
#[derive(Clone)]
pub struct RelayConfig {
    pub(crate) launcher: Arc<dyn NativeLauncher>,
    pub(crate) expected_version: String,
    pub(crate) idle_shutdown: Duration,
    pub(crate) handshake_timeout: Duration,
    pub(crate) preferences: Arc<dyn PreferenceStore>,
}

impl RelayConfig {
    /// Returns the version expected from the host.
    #[inline]
    #[must_use]
    pub fn expected_version(&self) -> &str {
        &self.expected_version
    }

    /// Returns the idle shutdown delay.
    #[inline]
    #[must_use]
    pub fn idle_shutdown(&self) -> Duration {
        self.idle_shutdown
    }

    /// Returns the handshake timeout.
    #[inline]
    #[must_use]
    pub fn handshake_timeout(&self) -> Duration {
        self.handshake_timeout
    }
}

impl fmt::Debug for RelayConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RelayConfig")
            .field("expected_version", &self.expected_version)
            .field("idle_shutdown", &self.idle_shutdown)
            .field("handshake_timeout", &self.handshake_timeout)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// RelayBuilder
// ============================================================================

/// Builder for a [`Relay`].
///
/// Use [`Relay::builder()`] to create one.
#[derive(Default, Clone)]
pub struct RelayBuilder {
    /// Host executable.
    native_host: Option<PathBuf>,
    /// Host arguments.
    args: Vec<String>,
    /// Custom launcher, overrides `native_host`.
    launcher: Option<Arc<dyn NativeLauncher>>,
    expected_version: Option<String>,
    idle_shutdown: Option<Duration>,
    handshake_timeout: Option<Duration>,
    preferences: Option<Arc<dyn PreferenceStore>>,
}

impl RelayBuilder {
    /// Creates a builder with no configuration.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the native host executable launched for each connection.
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the host (e.g., "/usr/local/bin/cpterm-host")
    #[inline]
    #[must_use]
    pub fn native_host(mut self, path: impl Into<PathBuf>) -> Self {
        self.native_host = Some(path.into());
        self
    }

    /// Sets the arguments passed to the native host.
    #[must_use]
    pub fn native_host_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Uses a custom launcher instead of spawning `native_host`.
    #[inline]
    #[must_use]
    pub fn launcher(mut self, launcher: Arc<dyn NativeLauncher>) -> Self {
        self.launcher = Some(launcher);
        self
    }

    /// Sets the version the host must announce.
    ///
    /// Defaults to [`HOST_PROTOCOL_VERSION`].
    #[inline]
    #[must_use]
    pub fn expected_version(mut self, version: impl Into<String>) -> Self {
        self.expected_version = Some(version.into());
        self
    }

    /// Sets the idle shutdown delay.
    ///
    /// Defaults to [`DEFAULT_IDLE_SHUTDOWN`].
    #[inline]
    #[must_use]
    pub fn idle_shutdown(mut self, delay: Duration) -> Self {
        self.idle_shutdown = Some(delay);
        self
    }

    /// Sets the handshake timeout.
    ///
    /// Defaults to [`DEFAULT_HANDSHAKE_TIMEOUT`].
    #[inline]
    #[must_use]
    pub fn handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = Some(timeout);
        self
    }

    /// Sets the preference store.
    ///
    /// Defaults to an empty [`MemoryPreferenceStore`].
    #[inline]
    #[must_use]
    pub fn preferences(mut self, store: Arc<dyn PreferenceStore>) -> Self {
        self.preferences = Some(store);
        self
    }

    /// Validates the configuration and creates the relay.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if no host is configured, the host path
    /// does not exist, a duration is zero, or the version is empty.
    pub fn build(self) -> Result<Relay> {
        let launcher = self.validate_launcher()?;
        let expected_version = self.validate_version()?;
        let idle_shutdown = Self::validate_duration(
            "Idle shutdown",
            self.idle_shutdown.unwrap_or(DEFAULT_IDLE_SHUTDOWN),
        )?;
        let handshake_timeout = Self::validate_duration(
            "Handshake timeout",
            self.handshake_timeout.unwrap_or(DEFAULT_HANDSHAKE_TIMEOUT),
        )?;
        let preferences = self
            .preferences
            .unwrap_or_else(|| Arc::new(MemoryPreferenceStore::new()));

        Ok(Relay::from_config(RelayConfig {
            launcher,
            expected_version,
            idle_shutdown,
            handshake_timeout,
            preferences,
        }))
    }
}

// ============================================================================
// Validation
// ============================================================================

impl RelayBuilder {
    /// Resolves the launcher.
    fn validate_launcher(&self) -> Result<Arc<dyn NativeLauncher>> {
        if let Some(launcher) = &self.launcher {
            return Ok(Arc::clone(launcher));
        }

        let path = self.native_host.clone().ok_or_else(|| {
            Error::config(
                "Native host path is required. Use .native_host() to set it.\n\
                 Example: Relay::builder().native_host(\"/usr/local/bin/cpterm-host\")",
            )
        })?;

        if !path.exists() {
            return Err(Error::config(format!(
                "Native host not found at: {}\n\
                 Ensure the host is installed.",
                path.display()
            )));
        }

        Ok(Arc::new(
            ProcessLauncher::new(path).args(self.args.iter().cloned()),
        ))
    }

    /// Validates the expected version.
    fn validate_version(&self) -> Result<String> {
        let version = self
            .expected_version
            .clone()
            .unwrap_or_else(|| HOST_PROTOCOL_VERSION.to_string());
        if version.trim().is_empty() {
            return Err(Error::config("Expected host version must not be empty"));
        }
        Ok(version)
    }

    fn validate_duration(what: &str, value: Duration) -> Result<Duration> {
        if value.is_zero() {
            return Err(Error::config(format!("{what} must be greater than zero")));
        }
        Ok(value)
    }
}

impl fmt::Debug for RelayBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RelayBuilder")
            .field("native_host", &self.native_host)
            .field("args", &self.args)
            .field("custom_launcher", &self.launcher.is_some())
            .field("expected_version", &self.expected_version)
            .field("idle_shutdown", &self.idle_shutdown)
            .field("handshake_timeout", &self.handshake_timeout)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use async_trait::async_trait;

    use crate::relay::launcher::NativeChannel;

    struct NeverLauncher;

    #[async_trait]
    impl NativeLauncher for NeverLauncher {
        async fn launch(&self) -> Result<NativeChannel> {
            Err(Error::connection("not launched in tests"))
        }
    }

    #[test]
    fn test_host_required() {
        let err = RelayBuilder::new().build().unwrap_err();
        assert!(matches!(err, Error::Config { .. }));
        assert!(err.to_string().contains(".native_host()"));
    }

    #[test]
    fn test_missing_host_path() {
        let err = RelayBuilder::new()
            .native_host("/nonexistent/cpterm-host")
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("/nonexistent/cpterm-host"));
    }

    #[test]
    fn test_existing_host_path() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let relay = RelayBuilder::new()
            .native_host(file.path())
            .native_host_args(["--stdio"])
            .build()
            .unwrap();
        assert_eq!(relay.config().idle_shutdown(), DEFAULT_IDLE_SHUTDOWN);
        assert_eq!(relay.config().expected_version(), HOST_PROTOCOL_VERSION);
    }

    #[test]
    fn test_zero_durations_rejected() {
        let err = RelayBuilder::new()
            .launcher(Arc::new(NeverLauncher))
            .idle_shutdown(Duration::ZERO)
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("Idle shutdown"));

        let err = RelayBuilder::new()
            .launcher(Arc::new(NeverLauncher))
            .handshake_timeout(Duration::ZERO)
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("Handshake timeout"));
    }

    #[test]
    fn test_empty_version_rejected() {
        let err = RelayBuilder::new()
            .launcher(Arc::new(NeverLauncher))
            .expected_version("  ")
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::Config { .. }));
    }

    #[test]
    fn test_custom_values() {
        let relay = RelayBuilder::new()
            .launcher(Arc::new(NeverLauncher))
            .expected_version("2.1.0")
            .idle_shutdown(Duration::from_secs(3))
            .handshake_timeout(Duration::from_secs(4))
            .build()
            .unwrap();
        let config = relay.config();
        assert_eq!(config.expected_version(), "2.1.0");
        assert_eq!(config.idle_shutdown(), Duration::from_secs(3));
        assert_eq!(config.handshake_timeout(), Duration::from_secs(4));
    }
}
