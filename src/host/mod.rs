//! Per-page scraper host.
//!
//! A [`ScraperHost`] owns the page's [`Scraper`], mounts the capture
//! button, and translates protocol messages into scraper calls.
//!
//! # States
//!
//! | State | `waiting` | Capture trigger |
//! |-------|-----------|-----------------|
//! | Idle | `false` | Emit `newProblem` now if ready, otherwise start waiting |
//! | Awaiting | `true` | Ignored; one wait is already in flight |
//!
//! # Inbound Messages
//!
//! | Message | Action |
//! |---------|--------|
//! | `setCode` | [`Scraper::set_code`] |
//! | `command(run)` | [`Scraper::run_tests`], reply `testResults` |
//! | `command(submit)` | [`Scraper::run_submit_tests`], reply `testResults` |
//! | `logEntry(error)` | Page alert |
//! | `logEntry(info)` | Log line |

// ============================================================================
// Submodules
// ============================================================================

/// Page events and host options.
pub mod events;

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use futures_util::{Stream, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::dom::{Dom, ObserveScope};
use crate::error::{Error, Result};
use crate::observe::Observation;
use crate::protocol::{CommandKind, LogLevel, Message, NewProblem, TestCases};
use crate::scraper::{Scraper, select_scraper};

pub use events::{HostOptions, Hotkey, KeyPress, PageEvent};

// ============================================================================
// WaitingGuard
// ============================================================================

/// Clears the waiting flag on every exit path.
struct WaitingGuard<'a>(&'a AtomicBool);

impl Drop for WaitingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

// ============================================================================
// ScraperHost
// ============================================================================

/// Drives one page's scraper on behalf of the relay.
pub struct ScraperHost {
    dom: Arc<dyn Dom>,
    scraper: Arc<dyn Scraper>,
    outbound: mpsc::UnboundedSender<Message>,
    waiting: AtomicBool,
    options: HostOptions,
}

impl ScraperHost {
    /// Creates a host around an already selected scraper.
    pub fn new(
        dom: Arc<dyn Dom>,
        scraper: Arc<dyn Scraper>,
        outbound: mpsc::UnboundedSender<Message>,
        options: HostOptions,
    ) -> Arc<Self> {
        Arc::new(Self {
            dom,
            scraper,
            outbound,
            waiting: AtomicBool::new(false),
            options,
        })
    }

    /// Creates a host for the page, selecting the scraper from its URL.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoScraper`] if the site is not supported.
    pub fn attach(
        dom: Arc<dyn Dom>,
        outbound: mpsc::UnboundedSender<Message>,
        options: HostOptions,
    ) -> Result<Arc<Self>> {
        let url = dom.url();
        let scraper =
            select_scraper(&url, Arc::clone(&dom)).ok_or_else(|| Error::no_scraper(url.as_str()))?;
        Ok(Self::new(dom, scraper, outbound, options))
    }

    /// Announces the page to the relay and mounts the capture button.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConnectionClosed`] if the relay session is gone.
    pub fn activate(&self) -> Result<()> {
        self.send(Message::keep_alive())?;
        self.dom.mount_button(&self.options.capture_label);
        info!(
            site = %self.scraper.site(),
            hotkey = %self.options.hotkey,
            "Scraper host activated"
        );
        Ok(())
    }

    /// Returns the page's scraper.
    #[inline]
    #[must_use]
    pub fn scraper(&self) -> &Arc<dyn Scraper> {
        &self.scraper
    }

    /// Returns `true` while a capture is waiting for the problem to load.
    #[inline]
    #[must_use]
    pub fn is_waiting(&self) -> bool {
        self.waiting.load(Ordering::Acquire)
    }

    fn send(&self, message: Message) -> Result<()> {
        debug!(kind = message.type_name(), "Page message queued");
        self.outbound.send(message).map_err(|_| Error::ConnectionClosed)
    }

    /// The current problem, if the page shows one with statement and code.
    fn ready_problem(&self) -> Option<NewProblem> {
        if !self.scraper.is_problem_page() {
            return None;
        }
        let statement = self.scraper.problem_statement();
        let code = self.scraper.code();
        if statement.trim().is_empty() || code.trim().is_empty() {
            return None;
        }
        Some(NewProblem::new(
            &statement,
            &code,
            &self.scraper.editor_language(),
            self.dom.url().as_str(),
            &self.scraper.problem_name(),
        ))
    }

    // ========================================================================
    // Capture
    // ========================================================================

    /// Sends the current problem, waiting for it to load if necessary.
    ///
    /// Returns `Ok(false)` if another capture is already waiting.
    ///
    /// # Errors
    ///
    /// - [`Error::Timeout`] if the problem does not load within
    ///   [`HostOptions::ready_timeout`]
    /// - [`Error::ConnectionClosed`] if the relay session is gone
    pub async fn capture(&self) -> Result<bool> {
        if self.is_waiting() {
            debug!("Capture already waiting");
            return Ok(false);
        }
        if let Some(problem) = self.ready_problem() {
            self.send(problem.into())?;
            return Ok(true);
        }
        if self
            .waiting
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Ok(false);
        }
        let _guard = WaitingGuard(&self.waiting);

        debug!("Waiting for problem to load");
        let root = self.dom.body().unwrap_or_else(|| self.dom.document());
        let problem = Observation::new(&*self.dom, root)
            .describe("problem to load")
            .scope(ObserveScope::subtree())
            .timeout(self.options.ready_timeout)
            .until(|| self.ready_problem())
            .await?;

        self.send(problem.into())?;
        Ok(true)
    }

    // ========================================================================
    // Dispatch
    // ========================================================================

    /// Handles a message from the relay.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConnectionClosed`] if a reply cannot be sent.
    pub async fn handle_message(&self, message: Message) -> Result<()> {
        match message {
            Message::SetCode { code } => {
                self.scraper.set_code(&code);
                Ok(())
            }
            Message::Command {
                command: CommandKind::Run,
            } => {
                let outcome = self.scraper.run_tests().await;
                self.report(CommandKind::Run, outcome)
            }
            Message::Command {
                command: CommandKind::Submit,
            } => {
                let outcome = self.scraper.run_submit_tests().await;
                self.report(CommandKind::Submit, outcome)
            }
            Message::LogEntry {
                message_type: LogLevel::Error,
                message,
            } => {
                warn!(%message, "Error from native host");
                self.dom.alert(&message);
                Ok(())
            }
            Message::LogEntry {
                message_type: LogLevel::Info,
                message,
            } => {
                info!(%message, "Native host");
                Ok(())
            }
            other => {
                debug!(kind = other.type_name(), "Ignoring message");
                Ok(())
            }
        }
    }

    fn report(&self, command: CommandKind, outcome: Result<TestCases>) -> Result<()> {
        match outcome {
            Ok(cases) => {
                debug!(%command, cases = cases.len(), "Harvest finished");
                self.send(Message::test_results(cases))
            }
            Err(e) => {
                warn!(%command, error = %e, "Harvest failed");
                self.send(Message::test_error(e.to_string()))
            }
        }
    }

    /// Handles a user or page event.
    ///
    /// # Errors
    ///
    /// Same as [`capture`](Self::capture).
    pub async fn handle_page_event(&self, event: PageEvent) -> Result<()> {
        match event {
            PageEvent::CaptureClicked => {
                self.capture().await?;
            }
            PageEvent::KeyUp(press) => {
                if self.options.hotkey.matches(&press) {
                    self.capture().await?;
                }
            }
            PageEvent::NavigationSettled => {
                self.scraper.invalidate_editor();
                self.capture().await?;
            }
        }
        Ok(())
    }

    // ========================================================================
    // Event Loop
    // ========================================================================

    /// Serves relay messages and page events until the relay session closes.
    ///
    /// Each message or event is handled on its own task so a long harvest
    /// never blocks a capture or a `setCode`.
    pub async fn run<S>(self: Arc<Self>, mut inbound: mpsc::UnboundedReceiver<Message>, events: S)
    where
        S: Stream<Item = PageEvent> + Send + 'static,
    {
        let mut events = Box::pin(events);
        let mut events_open = true;

        loop {
            tokio::select! {
                message = inbound.recv() => {
                    let Some(message) = message else {
                        debug!("Relay session closed");
                        break;
                    };
                    let host = Arc::clone(&self);
                    tokio::spawn(async move {
                        if let Err(e) = host.handle_message(message).await {
                            warn!(error = %e, "Failed to handle relay message");
                        }
                    });
                }

                event = events.next(), if events_open => {
                    let Some(event) = event else {
                        debug!("Page event stream ended");
                        events_open = false;
                        continue;
                    };
                    let host = Arc::clone(&self);
                    tokio::spawn(async move {
                        if let Err(e) = host.handle_page_event(event).await {
                            warn!(error = %e, "Failed to handle page event");
                        }
                    });
                }
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
