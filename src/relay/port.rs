//! Page side of a relay session.

use tokio::sync::mpsc;

use crate::error::{Error, Result};
use crate::identifiers::SessionId;
use crate::protocol::Message;

/// A page's connection to the [`Relay`](super::Relay).
///
/// Messages sent here reach the native host in order. Every message the
/// host sends arrives on [`recv`](Self::recv). Dropping the port ends the
/// session.
#[derive(Debug)]
pub struct PagePort {
    id: SessionId,
    sender: mpsc::UnboundedSender<Message>,
    receiver: mpsc::UnboundedReceiver<Message>,
}

impl PagePort {
    pub(crate) fn new(
        id: SessionId,
        sender: mpsc::UnboundedSender<Message>,
        receiver: mpsc::UnboundedReceiver<Message>,
    ) -> Self {
        Self {
            id,
            sender,
            receiver,
        }
    }

    /// Returns the session ID.
    #[inline]
    #[must_use]
    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Queues a message for the native host.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConnectionClosed`] if the session has ended.
    pub fn send(&self, message: Message) -> Result<()> {
        self.sender
            .send(message)
            .map_err(|_| Error::ConnectionClosed)
    }

    /// Receives the next message broadcast to this session.
    pub async fn recv(&mut self) -> Option<Message> {
        self.receiver.recv().await
    }

    /// Splits the port into its outbound sender and inbound receiver.
    ///
    /// This is the shape [`ScraperHost`](crate::host::ScraperHost) consumes.
    #[must_use]
    pub fn into_parts(
        self,
    ) -> (
        mpsc::UnboundedSender<Message>,
        mpsc::UnboundedReceiver<Message>,
    ) {
        (self.sender, self.receiver)
    }
}
