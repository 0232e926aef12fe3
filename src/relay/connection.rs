//! Framed connection to one native host instance.
//!
//! Opening a connection performs the version handshake, then spawns two
//! tasks:
//!
//! - a reader that decodes inbound frames and hands them to an
//!   [`EventSink`]
//! - a writer that serializes outbound messages in submission order and
//!   performs the quit sequence
//!
//! Every [`NativeConnection`] carries a fresh [`ConnectionId`] so late
//! events from a replaced connection can be ignored.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::process::Child;
use tokio::sync::{mpsc, oneshot};
use tokio::time::timeout;
use tracing::{debug, info, trace, warn};

use crate::error::{Error, Result};
use crate::identifiers::ConnectionId;
use crate::protocol::codec::read_frame_body;
use crate::protocol::{CommandKind, Message, decode_frame, read_frame, write_frame};

use super::launcher::{ChannelReader, ChannelWriter, NativeChannel};

// ============================================================================
// Constants
// ============================================================================

/// How long a quitting host may take to exit before it is killed.
const QUIT_GRACE: Duration = Duration::from_secs(5);

// ============================================================================
// Types
// ============================================================================

/// Something that happened on a connection.
#[derive(Debug)]
pub(crate) enum ConnectionEvent {
    /// The host sent a message.
    Message(Message),
    /// The host stream ended. `error` is `None` after a requested quit.
    Closed { error: Option<String> },
}

/// Receives connection events. Called from the reader task.
pub(crate) type EventSink = Arc<dyn Fn(ConnectionId, ConnectionEvent) + Send + Sync>;

/// Internal commands for the writer task.
enum ConnectionCommand {
    /// Write a message and report the outcome.
    Send {
        message: Message,
        ack: oneshot::Sender<Result<()>>,
    },
    /// Write `command(quit)` and close the host's input.
    Quit,
}

// ============================================================================
// NativeConnection
// ============================================================================

/// Handle to an open native host connection.
#[derive(Clone)]
pub(crate) struct NativeConnection {
    id: ConnectionId,
    command_tx: mpsc::UnboundedSender<ConnectionCommand>,
    closed: Arc<AtomicBool>,
}

impl NativeConnection {
    /// Performs the handshake over `channel` and starts the I/O tasks.
    ///
    /// # Errors
    ///
    /// - [`Error::HandshakeTimeout`] if no first frame arrives in time
    /// - [`Error::VersionMismatch`] if the host announces another version
    /// - [`Error::Protocol`] if the first frame is not a version message
    /// - [`Error::ConnectionClosed`] if the host exits before the handshake
    pub(crate) async fn open(
        channel: NativeChannel,
        expected_version: &str,
        handshake_timeout: Duration,
        sink: EventSink,
    ) -> Result<Self> {
        let NativeChannel {
            mut reader,
            writer,
            mut child,
        } = channel;
        let id = ConnectionId::next();

        if let Err(e) = Self::handshake(&mut reader, expected_version, handshake_timeout).await {
            warn!(connection_id = %id, error = %e, "Native host handshake failed");
            if let Some(child) = child.as_mut() {
                let _ = child.start_kill();
            }
            return Err(e);
        }

        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let closed = Arc::new(AtomicBool::new(false));
        let quitting = Arc::new(AtomicBool::new(false));

        tokio::spawn(Self::run_reader(
            id,
            reader,
            sink,
            Arc::clone(&closed),
            Arc::clone(&quitting),
        ));
        tokio::spawn(Self::run_writer(
            id,
            writer,
            child,
            command_rx,
            Arc::clone(&closed),
            quitting,
        ));

        info!(connection_id = %id, version = expected_version, "Native host connected");

        Ok(Self {
            id,
            command_tx,
            closed,
        })
    }

    /// Reads the first frame and checks the announced version.
    async fn handshake(
        reader: &mut ChannelReader,
        expected_version: &str,
        handshake_timeout: Duration,
    ) -> Result<()> {
        let first = timeout(handshake_timeout, read_frame(reader))
            .await
            .map_err(|_| Error::handshake_timeout(handshake_timeout.as_millis() as u64))??;

        match first {
            Some(Message::Version { version }) if version == expected_version => {
                debug!(version = %version, "Version handshake completed");
                Ok(())
            }
            Some(Message::Version { version }) => {
                Err(Error::version_mismatch(expected_version, version))
            }
            Some(other) => Err(Error::protocol(format!(
                "Expected a version message, got {}",
                other.type_name()
            ))),
            None => Err(Error::ConnectionClosed),
        }
    }

    /// Returns the connection ID.
    #[inline]
    pub(crate) fn id(&self) -> ConnectionId {
        self.id
    }

    /// Returns `true` once the host stream has ended or the writer stopped.
    #[inline]
    pub(crate) fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire) || self.command_tx.is_closed()
    }

    /// Writes `message` and waits until it has been flushed.
    ///
    /// # Errors
    ///
    /// - [`Error::ConnectionClosed`] if the writer has stopped
    /// - [`Error::Connection`] if the write fails
    pub(crate) async fn send(&self, message: Message) -> Result<()> {
        let (ack, done) = oneshot::channel();
        self.command_tx
            .send(ConnectionCommand::Send { message, ack })
            .map_err(|_| Error::ConnectionClosed)?;
        done.await.map_err(|_| Error::ConnectionClosed)?
    }

    /// Asks the host to quit. Returns immediately.
    pub(crate) fn quit(&self) {
        let _ = self.command_tx.send(ConnectionCommand::Quit);
    }

    // ========================================================================
    // I/O Tasks
    // ========================================================================

    async fn run_reader(
        id: ConnectionId,
        mut reader: ChannelReader,
        sink: EventSink,
        closed: Arc<AtomicBool>,
        quitting: Arc<AtomicBool>,
    ) {
        let error = loop {
            match read_frame_body(&mut reader).await {
                Ok(Some(body)) => match decode_frame(&body) {
                    Ok(message) => {
                        trace!(connection_id = %id, kind = message.type_name(), "Host message");
                        sink(id, ConnectionEvent::Message(message));
                    }
                    Err(e) => warn!(connection_id = %id, error = %e, "Dropping malformed host frame"),
                },
                Ok(None) => break "Native host disconnected".to_string(),
                Err(e) => break e.to_string(),
            }
        };

        closed.store(true, Ordering::Release);
        let error = (!quitting.load(Ordering::Acquire)).then_some(error);
        debug!(connection_id = %id, ?error, "Reader stopped");
        sink(id, ConnectionEvent::Closed { error });
    }

    async fn run_writer(
        id: ConnectionId,
        mut writer: ChannelWriter,
        child: Option<Child>,
        mut command_rx: mpsc::UnboundedReceiver<ConnectionCommand>,
        closed: Arc<AtomicBool>,
        quitting: Arc<AtomicBool>,
    ) {
        while let Some(command) = command_rx.recv().await {
            match command {
                ConnectionCommand::Send { message, ack } => {
                    match write_frame(&mut writer, &message).await {
                        Ok(()) => {
                            let _ = ack.send(Ok(()));
                        }
                        Err(Error::Io(e)) => {
                            warn!(connection_id = %id, error = %e, "Write to native host failed");
                            let _ = ack.send(Err(Error::connection(e.to_string())));
                            break;
                        }
                        // Encoding failures leave the stream intact.
                        Err(e) => {
                            let _ = ack.send(Err(e));
                        }
                    }
                }
                ConnectionCommand::Quit => {
                    quitting.store(true, Ordering::Release);
                    let quit = Message::command(CommandKind::Quit);
                    if let Err(e) = write_frame(&mut writer, &quit).await {
                        debug!(connection_id = %id, error = %e, "Quit not delivered");
                    }
                    break;
                }
            }
        }

        closed.store(true, Ordering::Release);
        command_rx.close();
        let _ = writer.shutdown().await;
        drop(writer);

        if let Some(child) = child {
            Self::reap(id, child).await;
        }
    }

    /// Waits for the host process to exit, killing it after the grace period.
    async fn reap(id: ConnectionId, mut child: Child) {
        match timeout(QUIT_GRACE, child.wait()).await {
            Ok(Ok(status)) => debug!(connection_id = %id, %status, "Native host exited"),
            Ok(Err(e)) => warn!(connection_id = %id, error = %e, "Failed to wait for native host"),
            Err(_) => {
                warn!(connection_id = %id, "Native host did not exit, killing");
                if let Err(e) = child.kill().await {
                    warn!(connection_id = %id, error = %e, "Failed to kill native host");
                }
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
