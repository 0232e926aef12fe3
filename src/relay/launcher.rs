//! Native host process launching.
//!
//! A [`NativeLauncher`] produces a fresh [`NativeChannel`] for every
//! connection the relay opens. [`ProcessLauncher`] spawns the real host
//! executable and talks to it over its stdio pipes.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::path::PathBuf;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::process::{Child, Command};
use tracing::{debug, info};

use crate::error::{Error, Result};

// ============================================================================
// Types
// ============================================================================

/// Boxed read half of a native channel.
pub type ChannelReader = Box<dyn AsyncRead + Send + Unpin>;

/// Boxed write half of a native channel.
pub type ChannelWriter = Box<dyn AsyncWrite + Send + Unpin>;

// ============================================================================
// NativeChannel
// ============================================================================

/// Byte streams to and from one native host instance.
pub struct NativeChannel {
    pub(crate) reader: ChannelReader,
    pub(crate) writer: ChannelWriter,
    pub(crate) child: Option<Child>,
}

impl NativeChannel {
    /// Creates a channel over arbitrary streams.
    pub fn new<R, W>(reader: R, writer: W) -> Self
    where
        R: AsyncRead + Send + Unpin + 'static,
        W: AsyncWrite + Send + Unpin + 'static,
    {
        Self {
            reader: Box::new(reader),
            writer: Box::new(writer),
            child: None,
        }
    }

    /// Attaches the process behind the streams.
    ///
    /// The relay waits for it to exit after a quit and kills it if it
    /// lingers.
    #[must_use]
    pub fn with_child(mut self, child: Child) -> Self {
        self.child = Some(child);
        self
    }
}

impl fmt::Debug for NativeChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeChannel")
            .field("pid", &self.child.as_ref().and_then(Child::id))
            .finish_non_exhaustive()
    }
}

// ============================================================================
// NativeLauncher
// ============================================================================

/// Starts native host instances.
#[async_trait]
pub trait NativeLauncher: Send + Sync {
    /// Starts a host and returns its channel.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Connection`] if the host cannot be started.
    async fn launch(&self) -> Result<NativeChannel>;
}

// ============================================================================
// ProcessLauncher
// ============================================================================

/// Launches the native host as a child process.
///
/// The host reads frames on stdin and writes frames on stdout. Its stderr
/// is inherited.
#[derive(Debug, Clone)]
pub struct ProcessLauncher {
    program: PathBuf,
    args: Vec<String>,
}

impl ProcessLauncher {
    /// Creates a launcher for `program` with no arguments.
    #[must_use]
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    /// Sets the arguments passed to the host.
    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Returns the host executable path.
    #[inline]
    #[must_use]
    pub fn program(&self) -> &std::path::Path {
        &self.program
    }
}

#[async_trait]
impl NativeLauncher for ProcessLauncher {
    async fn launch(&self) -> Result<NativeChannel> {
        debug!(program = %self.program.display(), args = ?self.args, "Spawning native host");

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                Error::connection(format!(
                    "Failed to start native host {}: {e}",
                    self.program.display()
                ))
            })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| Error::connection("Native host stdin was not captured"))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| Error::connection("Native host stdout was not captured"))?;

        info!(pid = ?child.id(), program = %self.program.display(), "Native host started");

        Ok(NativeChannel::new(stdout, stdin).with_child(child))
    }
}

// ============================================================================
// Tests
// ============================================================================
