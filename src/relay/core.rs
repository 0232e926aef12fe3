//! Session relay and native host lifecycle.
//!
//! The [`Relay`] multiplexes any number of page sessions onto at most one
//! native host connection.
//!
//! # Connection Lifecycle
//!
//! | State | Entered when |
//! |-------|--------------|
//! | Closed | Initially, after quit, after the host exits, after a failed open |
//! | Open | A session relays a message while Closed and the handshake succeeds |
//!
//! A session joins the live set with its first message, and leaves when its
//! port is dropped. When the last session leaves while Open, an idle timer
//! is armed. Non-keepAlive traffic or an explicit
//! [`register_session`](Relay::register_session) disarms it. A keepAlive
//! that finds the timer armed disarms it and goes no further. If the timer
//! expires the host is told to quit and the connection is dropped.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, trace, warn};

use crate::error::{Error, Result};
use crate::identifiers::{ConnectionId, SessionId};
use crate::protocol::Message;

use super::config::{RelayBuilder, RelayConfig};
use super::connection::{ConnectionEvent, EventSink, NativeConnection};
use super::port::PagePort;
use super::prefs::{PreferenceChanges, Preferences};

// ============================================================================
// Types
// ============================================================================

/// Pending idle shutdown.
struct IdleTimer {
    /// Distinguishes this timer from later ones.
    generation: u64,
    task: JoinHandle<()>,
}

#[derive(Default)]
struct RelayState {
    /// Live sessions and their inbound queues.
    sessions: FxHashMap<SessionId, mpsc::UnboundedSender<Message>>,
    connection: Option<NativeConnection>,
    idle_timer: Option<IdleTimer>,
    timer_generation: u64,
}

/// Shared relay state.
pub(crate) struct RelayInner {
    config: RelayConfig,
    state: Mutex<RelayState>,
    /// Serializes connection opens.
    open_gate: tokio::sync::Mutex<()>,
}

// ============================================================================
// Relay
// ============================================================================

/// Connection and session manager for the native host.
///
/// Cheap to clone; clones share state.
///
/// # Example
///
/// ```no_run
/// use cpterm_bridge::{Message, Relay};
///
/// # async fn example() -> cpterm_bridge::Result<()> {
/// let relay = Relay::builder()
///     .native_host("/usr/local/bin/cpterm-host")
///     .build()?;
///
/// let mut port = relay.connect();
/// port.send(Message::keep_alive())?;
/// while let Some(message) = port.recv().await {
///     println!("{}", message.type_name());
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Relay {
    inner: Arc<RelayInner>,
}

impl fmt::Debug for Relay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("Relay")
            .field("sessions", &state.sessions.len())
            .field("connected", &state.connection.is_some())
            .field("idle_timer_armed", &state.idle_timer.is_some())
            .finish()
    }
}

// ============================================================================
// Relay - Construction
// ============================================================================

impl Relay {
    /// Creates a configuration builder.
    #[inline]
    #[must_use]
    pub fn builder() -> RelayBuilder {
        RelayBuilder::new()
    }

    pub(crate) fn from_config(config: RelayConfig) -> Self {
        Self {
            inner: Arc::new(RelayInner {
                config,
                state: Mutex::new(RelayState::default()),
                open_gate: tokio::sync::Mutex::new(()),
            }),
        }
    }

    /// Returns the configuration.
    #[inline]
    #[must_use]
    pub fn config(&self) -> &RelayConfig {
        &self.inner.config
    }

    fn from_weak(weak: &Weak<RelayInner>) -> Option<Self> {
        weak.upgrade().map(|inner| Self { inner })
    }
}

// ============================================================================
// Relay - Sessions
// ============================================================================

impl Relay {
    /// Opens a new page session.
    ///
    /// Only creates the channels. A task joins the session to the live set
    /// when its first message arrives, forwards everything sent on the
    /// returned port through [`relay`](Self::relay) in order, and
    /// unregisters the session once the port's sender is dropped.
    ///
    /// Must be called within a tokio runtime.
    #[must_use]
    pub fn connect(&self) -> PagePort {
        let id = SessionId::next();
        let (to_page_tx, to_page_rx) = mpsc::unbounded_channel();
        let (from_page_tx, mut from_page_rx) = mpsc::unbounded_channel();

        let relay = self.clone();
        tokio::spawn(async move {
            let mut pending = Some(to_page_tx);
            while let Some(message) = from_page_rx.recv().await {
                if let Some(sender) = pending.take() {
                    relay.join_session(id, sender);
                }
                if let Err(e) = relay.relay(id, message).await {
                    debug!(session_id = %id, error = %e, "Relay failed");
                }
            }
            relay.unregister_session(id);
        });

        PagePort::new(id, from_page_tx, to_page_rx)
    }

    /// Adds a session to the live set.
    ///
    /// Disarms a pending idle shutdown.
    pub fn register_session(&self, id: SessionId, sender: mpsc::UnboundedSender<Message>) {
        let mut state = self.inner.state.lock();
        if Self::disarm_locked(&mut state) {
            debug!(session_id = %id, "Idle shutdown cancelled by new session");
        }
        Self::insert_session_locked(&mut state, id, sender);
    }

    /// Adds a session without touching the idle timer.
    ///
    /// The session's first message decides whether the timer is disarmed.
    fn join_session(&self, id: SessionId, sender: mpsc::UnboundedSender<Message>) {
        Self::insert_session_locked(&mut self.inner.state.lock(), id, sender);
    }

    fn insert_session_locked(
        state: &mut RelayState,
        id: SessionId,
        sender: mpsc::UnboundedSender<Message>,
    ) {
        state.sessions.insert(id, sender);
        info!(session_id = %id, sessions = state.sessions.len(), "Session registered");
    }

    /// Removes a session from the live set.
    ///
    /// Arms the idle shutdown when it was the last one.
    pub fn unregister_session(&self, id: SessionId) {
        let mut state = self.inner.state.lock();
        if state.sessions.remove(&id).is_none() {
            return;
        }
        info!(session_id = %id, sessions = state.sessions.len(), "Session unregistered");

        if state.sessions.is_empty() {
            self.arm_locked(&mut state);
        }
    }

    /// Returns the number of live sessions.
    #[must_use]
    pub fn session_count(&self) -> usize {
        self.inner.state.lock().sessions.len()
    }

    /// Sends `message` to every live session.
    pub fn broadcast_from_host(&self, message: Message) {
        let state = self.inner.state.lock();
        trace!(
            kind = message.type_name(),
            sessions = state.sessions.len(),
            "Broadcasting"
        );
        for (id, sender) in &state.sessions {
            if sender.send(message.clone()).is_err() {
                trace!(session_id = %id, "Session receiver dropped");
            }
        }
    }
}

// ============================================================================
// Relay - Forwarding
// ============================================================================

impl Relay {
    /// Forwards a message from `session` to the native host.
    ///
    /// A keepAlive that finds the idle timer armed only disarms it. Anything
    /// else disarms the timer, opens the connection if needed, and is
    /// written to the host.
    ///
    /// # Errors
    ///
    /// - [`Error::SessionNotFound`] if `session` is not registered
    /// - Any open error (launch, handshake, version), also broadcast to
    ///   every session as an error log entry
    /// - [`Error::Connection`] or [`Error::ConnectionClosed`] if the write
    ///   fails
    pub async fn relay(&self, session: SessionId, message: Message) -> Result<()> {
        {
            let mut state = self.inner.state.lock();
            if !state.sessions.contains_key(&session) {
                return Err(Error::session_not_found(session));
            }
            let was_armed = Self::disarm_locked(&mut state);
            if was_armed && message.is_keep_alive() {
                debug!(session_id = %session, "Keep-alive cancelled idle shutdown");
                return Ok(());
            }
        }

        let connection = self.ensure_connection().await?;
        trace!(
            session_id = %session,
            connection_id = %connection.id(),
            kind = message.type_name(),
            "Relaying"
        );

        match connection.send(message).await {
            Ok(()) => Ok(()),
            Err(e) if e.is_connection_error() => {
                warn!(connection_id = %connection.id(), error = %e, "Native host write failed");
                self.drop_connection(connection.id());
                self.broadcast_from_host(Message::log_error(e.to_string()));
                Err(e)
            }
            Err(e) => {
                warn!(session_id = %session, error = %e, "Message not relayed");
                Err(e)
            }
        }
    }

    /// Forwards preference changes if a connection is open.
    ///
    /// Removed preferences are sent as empty strings.
    pub async fn preferences_changed(&self, changes: PreferenceChanges) -> Result<()> {
        let Some(connection) = self.current_connection() else {
            debug!(count = changes.len(), "No native host, preference change dropped");
            return Ok(());
        };

        let prefs: Preferences = changes
            .into_iter()
            .map(|(key, change)| (key, change.new_value.unwrap_or_default()))
            .collect();
        connection.send(Message::set_prefs(prefs)).await
    }

    /// Forwards changes published by the preference store.
    ///
    /// Returns `None` if the store does not publish changes. The task ends
    /// when the store or the relay goes away.
    pub fn spawn_preference_watcher(&self) -> Option<JoinHandle<()>> {
        let mut changes = self.inner.config.preferences.subscribe()?;
        let weak = Arc::downgrade(&self.inner);

        Some(tokio::spawn(async move {
            loop {
                match changes.recv().await {
                    Ok(batch) => {
                        let Some(relay) = Self::from_weak(&weak) else {
                            break;
                        };
                        if let Err(e) = relay.preferences_changed(batch).await {
                            warn!(error = %e, "Failed to forward preferences");
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Preference watcher lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
            debug!("Preference watcher stopped");
        }))
    }
}

// ============================================================================
// Relay - Connection
// ============================================================================

impl Relay {
    /// Returns `true` if a host connection is open.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.inner
            .state
            .lock()
            .connection
            .as_ref()
            .is_some_and(|c| !c.is_closed())
    }

    /// Returns the open connection, forgetting one that has closed.
    fn current_connection(&self) -> Option<NativeConnection> {
        let mut state = self.inner.state.lock();
        if state.connection.as_ref().is_some_and(NativeConnection::is_closed) {
            state.connection = None;
        }
        state.connection.clone()
    }

    async fn ensure_connection(&self) -> Result<NativeConnection> {
        if let Some(connection) = self.current_connection() {
            return Ok(connection);
        }

        let _gate = self.inner.open_gate.lock().await;
        if let Some(connection) = self.current_connection() {
            return Ok(connection);
        }

        match self.open_connection().await {
            Ok(connection) => {
                let mut state = self.inner.state.lock();
                state.connection = Some(connection.clone());
                if state.sessions.is_empty() {
                    self.arm_locked(&mut state);
                }
                Ok(connection)
            }
            Err(e) => {
                error!(error = %e, "Failed to open native host");
                self.broadcast_from_host(Message::log_error(e.to_string()));
                Err(e)
            }
        }
    }

    /// Launches a host, handshakes, and sends the preference snapshot.
    async fn open_connection(&self) -> Result<NativeConnection> {
        let config = &self.inner.config;
        let channel = config.launcher.launch().await?;

        let weak = Arc::downgrade(&self.inner);
        let sink: EventSink = Arc::new(move |id, event| {
            if let Some(relay) = Self::from_weak(&weak) {
                relay.on_connection_event(id, event);
            }
        });

        let connection = NativeConnection::open(
            channel,
            &config.expected_version,
            config.handshake_timeout,
            sink,
        )
        .await?;

        let prefs = match config.preferences.get_all().await {
            Ok(prefs) => prefs,
            Err(e) => {
                warn!(error = %e, "Failed to read preferences");
                Preferences::new()
            }
        };
        if !prefs.is_empty() {
            debug!(count = prefs.len(), "Sending preference snapshot");
            connection.send(Message::set_prefs(prefs)).await?;
        }

        Ok(connection)
    }

    fn on_connection_event(&self, id: ConnectionId, event: ConnectionEvent) {
        match event {
            ConnectionEvent::Message(message) => self.broadcast_from_host(message),
            ConnectionEvent::Closed { error } => {
                self.drop_connection(id);
                info!(connection_id = %id, "Native host disconnected");
                if let Some(error) = error {
                    warn!(connection_id = %id, error = %error, "Native host connection lost");
                    self.broadcast_from_host(Message::log_error(error));
                }
            }
        }
    }

    /// Forgets the connection if it is still `id`.
    fn drop_connection(&self, id: ConnectionId) {
        let mut state = self.inner.state.lock();
        if state.connection.as_ref().is_some_and(|c| c.id() == id) {
            state.connection = None;
            Self::disarm_locked(&mut state);
        }
    }
}

// ============================================================================
// Relay - Idle Shutdown
// ============================================================================

impl Relay {
    /// Starts the idle shutdown timer, replacing any armed one.
    ///
    /// Does nothing while no connection is open.
    pub fn arm_idle_shutdown(&self) {
        let mut state = self.inner.state.lock();
        self.arm_locked(&mut state);
    }

    /// Cancels the idle shutdown timer.
    ///
    /// Returns `true` if a timer was armed.
    pub fn disarm_idle_shutdown(&self) -> bool {
        Self::disarm_locked(&mut self.inner.state.lock())
    }

    /// Returns `true` while an idle shutdown is pending.
    #[must_use]
    pub fn is_idle_timer_armed(&self) -> bool {
        self.inner.state.lock().idle_timer.is_some()
    }

    fn arm_locked(&self, state: &mut RelayState) {
        if state.connection.is_none() {
            trace!("No native host to shut down");
            return;
        }
        Self::disarm_locked(state);

        state.timer_generation += 1;
        let generation = state.timer_generation;
        let delay = self.inner.config.idle_shutdown;
        let weak = Arc::downgrade(&self.inner);

        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Some(relay) = Self::from_weak(&weak) {
                relay.idle_expired(generation);
            }
        });

        state.idle_timer = Some(IdleTimer { generation, task });
        debug!(idle_ms = delay.as_millis() as u64, "Idle shutdown armed");
    }

    fn disarm_locked(state: &mut RelayState) -> bool {
        match state.idle_timer.take() {
            Some(timer) => {
                timer.task.abort();
                true
            }
            None => false,
        }
    }

    fn idle_expired(&self, generation: u64) {
        let connection = {
            let mut state = self.inner.state.lock();
            if state.idle_timer.as_ref().map(|t| t.generation) != Some(generation) {
                return;
            }
            state.idle_timer = None;
            state.connection.take()
        };

        if let Some(connection) = connection {
            info!(connection_id = %connection.id(), "Idle timeout elapsed, stopping native host");
            connection.quit();
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;
    use tokio::io::{DuplexStream, duplex};

    use crate::protocol::{CommandKind, LogLevel, read_frame, write_frame};
    use crate::relay::launcher::{NativeChannel, NativeLauncher};
    use crate::relay::prefs::{MemoryPreferenceStore, PreferenceChange, PreferenceStore};

    // ------------------------------------------------------------------------
    // Scripted native host
    // ------------------------------------------------------------------------

    #[derive(Debug, PartialEq)]
    enum HostEvent {
        Received(usize, Message),
        StdinClosed(usize),
    }

    struct ScriptedLauncher {
        /// Version to announce; `None` stays silent.
        version: Option<String>,
        launches: AtomicUsize,
        writers: Mutex<Vec<Option<DuplexStream>>>,
        events: mpsc::UnboundedSender<HostEvent>,
    }

    impl ScriptedLauncher {
        fn new(version: Option<&str>) -> (Arc<Self>, mpsc::UnboundedReceiver<HostEvent>) {
            let (events, rx) = mpsc::unbounded_channel();
            let launcher = Arc::new(Self {
                version: version.map(str::to_string),
                launches: AtomicUsize::new(0),
                writers: Mutex::new(Vec::new()),
                events,
            });
            (launcher, rx)
        }

        fn launches(&self) -> usize {
            self.launches.load(Ordering::SeqCst)
        }

        fn take_writer(&self, index: usize) -> DuplexStream {
            self.writers.lock()[index].take().unwrap()
        }
    }

    #[async_trait]
    impl NativeLauncher for ScriptedLauncher {
        async fn launch(&self) -> Result<NativeChannel> {
            let index = self.launches.fetch_add(1, Ordering::SeqCst);
            let (relay_in, mut host_out) = duplex(64 * 1024);
            let (mut host_in, relay_out) = duplex(64 * 1024);

            if let Some(version) = &self.version {
                write_frame(&mut host_out, &Message::version(version.clone())).await?;
            }
            self.writers.lock().push(Some(host_out));

            let events = self.events.clone();
            tokio::spawn(async move {
                while let Ok(Some(message)) = read_frame(&mut host_in).await {
                    let _ = events.send(HostEvent::Received(index, message));
                }
                let _ = events.send(HostEvent::StdinClosed(index));
            });

            Ok(NativeChannel::new(relay_in, relay_out))
        }
    }

    fn relay_with(launcher: Arc<ScriptedLauncher>, store: Option<Arc<dyn PreferenceStore>>) -> Relay {
        let mut builder = Relay::builder()
            .launcher(launcher)
            .expected_version("1.0")
            .handshake_timeout(Duration::from_secs(1));
        if let Some(store) = store {
            builder = builder.preferences(store);
        }
        builder.build().unwrap()
    }

    async fn settle(mut done: impl FnMut() -> bool) {
        for _ in 0..200 {
            if done() {
                return;
            }
            tokio::task::yield_now().await;
        }
        panic!("condition not reached");
    }

    async fn next_host(events: &mut mpsc::UnboundedReceiver<HostEvent>) -> HostEvent {
        events.recv().await.unwrap()
    }

    /// Next message received by any host, skipping stdin closures.
    async fn next_received(events: &mut mpsc::UnboundedReceiver<HostEvent>) -> HostEvent {
        loop {
            match events.recv().await.unwrap() {
                HostEvent::StdinClosed(_) => continue,
                received => return received,
            }
        }
    }

    fn is_error_log(message: &Message, needle: &str) -> bool {
        matches!(
            message,
            Message::LogEntry { message_type: LogLevel::Error, message } if message.contains(needle)
        )
    }

    // ------------------------------------------------------------------------
    // Opening
    // ------------------------------------------------------------------------

    #[tokio::test]
    async fn test_first_message_opens_connection() {
        let (launcher, mut host) = ScriptedLauncher::new(Some("1.0"));
        let relay = relay_with(Arc::clone(&launcher), None);
        let port = relay.connect();
        assert!(!relay.is_connected());

        let mut prefs = Preferences::new();
        prefs.insert("theme".into(), "dark".into());
        port.send(Message::set_prefs(prefs.clone())).unwrap();

        assert_eq!(next_host(&mut host).await, HostEvent::Received(0, Message::set_prefs(prefs)));
        assert!(relay.is_connected());
        assert_eq!(launcher.launches(), 1);
    }

    #[tokio::test]
    async fn test_preference_snapshot_precedes_trigger() {
        let (launcher, mut host) = ScriptedLauncher::new(Some("1.0"));
        let store = Arc::new(MemoryPreferenceStore::with_values([("editor", "vim")]));
        let relay = relay_with(launcher, Some(store));
        let port = relay.connect();

        port.send(Message::set_code("int main() {}")).unwrap();

        let mut snapshot = Preferences::new();
        snapshot.insert("editor".into(), "vim".into());
        assert_eq!(next_host(&mut host).await, HostEvent::Received(0, Message::set_prefs(snapshot)));
        assert_eq!(
            next_host(&mut host).await,
            HostEvent::Received(0, Message::set_code("int main() {}"))
        );
    }

    #[tokio::test]
    async fn test_version_mismatch_notifies_session() {
        let (launcher, _host) = ScriptedLauncher::new(Some("0.1"));
        let relay = relay_with(launcher, None);
        let mut port = relay.connect();

        port.send(Message::set_code("x")).unwrap();

        let message = port.recv().await.unwrap();
        assert!(is_error_log(&message, "version mismatch"));
        assert!(!relay.is_connected());
    }

    #[tokio::test(start_paused = true)]
    async fn test_handshake_timeout_notifies_session() {
        let (launcher, _host) = ScriptedLauncher::new(None);
        let relay = relay_with(launcher, None);
        let mut port = relay.connect();

        port.send(Message::set_code("x")).unwrap();

        let message = port.recv().await.unwrap();
        assert!(is_error_log(&message, "timed out"));
        assert!(!relay.is_connected());
    }

    #[tokio::test]
    async fn test_unregistered_session_rejected() {
        let (launcher, _host) = ScriptedLauncher::new(Some("1.0"));
        let relay = relay_with(Arc::clone(&launcher), None);

        let err = relay
            .relay(SessionId::next(), Message::set_code("x"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::SessionNotFound { .. }));
        assert_eq!(launcher.launches(), 0);
    }

    // ------------------------------------------------------------------------
    // Ordering and broadcast
    // ------------------------------------------------------------------------

    #[tokio::test]
    async fn test_session_order_preserved() {
        let (launcher, mut host) = ScriptedLauncher::new(Some("1.0"));
        let relay = relay_with(launcher, None);
        let port = relay.connect();

        for i in 0..20 {
            port.send(Message::set_code(i.to_string())).unwrap();
        }
        for i in 0..20 {
            assert_eq!(
                next_host(&mut host).await,
                HostEvent::Received(0, Message::set_code(i.to_string()))
            );
        }
    }

    #[tokio::test]
    async fn test_host_messages_reach_every_session() {
        let (launcher, mut host) = ScriptedLauncher::new(Some("1.0"));
        let relay = relay_with(Arc::clone(&launcher), None);
        let mut first = relay.connect();
        let mut second = relay.connect();
        assert_eq!(relay.session_count(), 0);

        first.send(Message::set_code("open")).unwrap();
        next_host(&mut host).await;
        second.send(Message::set_code("join")).unwrap();
        assert_eq!(next_host(&mut host).await, HostEvent::Received(0, Message::set_code("join")));
        assert_eq!(relay.session_count(), 2);

        let mut writer = launcher.take_writer(0);
        write_frame(&mut writer, &Message::set_code("from host")).await.unwrap();
        write_frame(&mut writer, &Message::log_info("saved")).await.unwrap();

        for port in [&mut first, &mut second] {
            assert_eq!(port.recv().await.unwrap(), Message::set_code("from host"));
            assert_eq!(port.recv().await.unwrap(), Message::log_info("saved"));
        }
    }

    #[tokio::test]
    async fn test_host_exit_clears_connection() {
        let (launcher, mut host) = ScriptedLauncher::new(Some("1.0"));
        let relay = relay_with(Arc::clone(&launcher), None);
        let mut port = relay.connect();

        port.send(Message::set_code("a")).unwrap();
        next_host(&mut host).await;

        drop(launcher.take_writer(0));
        let message = port.recv().await.unwrap();
        assert!(is_error_log(&message, "disconnected"));
        assert!(!relay.is_connected());

        port.send(Message::set_code("b")).unwrap();
        assert_eq!(
            next_received(&mut host).await,
            HostEvent::Received(1, Message::set_code("b"))
        );
        assert_eq!(launcher.launches(), 2);
    }

    // ------------------------------------------------------------------------
    // Idle shutdown
    // ------------------------------------------------------------------------

    #[tokio::test(start_paused = true)]
    async fn test_last_session_leaving_quits_host() {
        let (launcher, mut host) = ScriptedLauncher::new(Some("1.0"));
        let relay = relay_with(launcher, None);
        let port = relay.connect();

        port.send(Message::set_code("a")).unwrap();
        next_host(&mut host).await;

        drop(port);
        settle(|| relay.is_idle_timer_armed()).await;
        assert_eq!(relay.session_count(), 0);
        assert!(relay.is_connected());

        tokio::time::sleep(Duration::from_millis(9_999)).await;
        assert!(relay.is_connected());
        assert!(relay.is_idle_timer_armed());
        assert!(host.try_recv().is_err());

        let nearly_due = tokio::time::Instant::now();
        assert_eq!(
            next_host(&mut host).await,
            HostEvent::Received(0, Message::command(CommandKind::Quit))
        );
        assert_eq!(nearly_due.elapsed(), Duration::from_millis(1));
        assert_eq!(next_host(&mut host).await, HostEvent::StdinClosed(0));
        assert!(!relay.is_connected());
        assert!(!relay.is_idle_timer_armed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_new_session_cancels_shutdown() {
        let (launcher, mut host) = ScriptedLauncher::new(Some("1.0"));
        let relay = relay_with(Arc::clone(&launcher), None);
        let port = relay.connect();
        port.send(Message::set_code("a")).unwrap();
        next_host(&mut host).await;

        drop(port);
        settle(|| relay.is_idle_timer_armed()).await;

        let port = relay.connect();
        assert!(relay.is_idle_timer_armed(), "a silent session does not count yet");

        port.send(Message::set_code("b")).unwrap();
        assert_eq!(next_host(&mut host).await, HostEvent::Received(0, Message::set_code("b")));
        assert!(!relay.is_idle_timer_armed());
        assert_eq!(relay.session_count(), 1);

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert!(relay.is_connected());
        assert_eq!(launcher.launches(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reopened_page_keep_alive_stays_local() {
        let (launcher, mut host) = ScriptedLauncher::new(Some("1.0"));
        let relay = relay_with(Arc::clone(&launcher), None);
        let port = relay.connect();
        port.send(Message::set_code("a")).unwrap();
        next_host(&mut host).await;

        drop(port);
        settle(|| relay.is_idle_timer_armed()).await;

        let port = relay.connect();
        port.send(Message::keep_alive()).unwrap();
        settle(|| !relay.is_idle_timer_armed()).await;
        assert_eq!(relay.session_count(), 1);

        // The keepAlive wrote nothing, so the next frame is this one.
        port.send(Message::set_code("b")).unwrap();
        assert_eq!(next_host(&mut host).await, HostEvent::Received(0, Message::set_code("b")));

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert!(relay.is_connected());
        assert_eq!(launcher.launches(), 1);

        drop(port);
        settle(|| relay.is_idle_timer_armed()).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_keep_alive_only_disarms() {
        let (launcher, mut host) = ScriptedLauncher::new(Some("1.0"));
        let relay = relay_with(launcher, None);
        let port = relay.connect();
        port.send(Message::set_code("a")).unwrap();
        next_host(&mut host).await;

        relay.arm_idle_shutdown();
        assert!(relay.is_idle_timer_armed());

        port.send(Message::keep_alive()).unwrap();
        settle(|| !relay.is_idle_timer_armed()).await;

        // Not armed now, so this one is forwarded.
        port.send(Message::keep_alive()).unwrap();
        assert_eq!(next_host(&mut host).await, HostEvent::Received(0, Message::keep_alive()));

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert!(relay.is_connected());
    }

    #[tokio::test(start_paused = true)]
    async fn test_disarm_reports_previous_state() {
        let (launcher, mut host) = ScriptedLauncher::new(Some("1.0"));
        let relay = relay_with(launcher, None);
        let port = relay.connect();

        relay.arm_idle_shutdown();
        assert!(!relay.is_idle_timer_armed(), "nothing to shut down while closed");

        port.send(Message::set_code("a")).unwrap();
        next_host(&mut host).await;

        relay.arm_idle_shutdown();
        assert!(relay.disarm_idle_shutdown());
        assert!(!relay.disarm_idle_shutdown());
    }

    // ------------------------------------------------------------------------
    // Preferences
    // ------------------------------------------------------------------------

    #[tokio::test]
    async fn test_preference_changes_need_open_connection() {
        let (launcher, mut host) = ScriptedLauncher::new(Some("1.0"));
        let relay = relay_with(Arc::clone(&launcher), None);

        let mut changes = PreferenceChanges::new();
        changes.insert("theme".into(), PreferenceChange::set("dark"));
        changes.insert("editor".into(), PreferenceChange::removed());

        relay.preferences_changed(changes.clone()).await.unwrap();
        assert_eq!(launcher.launches(), 0);

        let port = relay.connect();
        port.send(Message::set_code("a")).unwrap();
        next_host(&mut host).await;

        relay.preferences_changed(changes).await.unwrap();
        let mut expected = Preferences::new();
        expected.insert("editor".into(), String::new());
        expected.insert("theme".into(), "dark".into());
        assert_eq!(next_host(&mut host).await, HostEvent::Received(0, Message::set_prefs(expected)));
    }

    #[tokio::test]
    async fn test_preference_watcher_forwards_store_changes() {
        let (launcher, mut host) = ScriptedLauncher::new(Some("1.0"));
        let store = Arc::new(MemoryPreferenceStore::new());
        let relay = relay_with(launcher, Some(Arc::clone(&store) as Arc<dyn PreferenceStore>));
        let watcher = relay.spawn_preference_watcher().unwrap();

        let port = relay.connect();
        port.send(Message::set_code("a")).unwrap();
        next_host(&mut host).await;

        store.set("font", "mono");
        let mut expected = Preferences::new();
        expected.insert("font".into(), "mono".into());
        assert_eq!(next_host(&mut host).await, HostEvent::Received(0, Message::set_prefs(expected)));

        watcher.abort();
    }
}
