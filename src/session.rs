//! Session struct definition
//!
//! Server-side view of one connected socket: its id, the username it
//! claimed (if any), and the bounded queue feeding its writer task. The
//! frame reassembly buffer lives in the connection handler, which is the
//! only task that ever reads from the socket.

use tokio::sync::{mpsc, oneshot};

use crate::error::SendError;
use crate::message::Message;
use crate::types::SessionId;

/// Lifecycle state of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Connected, no username yet
    Anonymous,
    /// Username claimed and listed in the registry
    Registered,
}

/// Connected session information
#[derive(Debug)]
pub struct Session {
    /// Unique identifier for this connection
    pub id: SessionId,
    /// Username (None until registration succeeds, then fixed)
    username: Option<String>,
    /// Server → client message queue
    sender: mpsc::Sender<Message>,
    /// Dropped together with the session; tells the handler to hang up
    _hangup: Option<oneshot::Sender<()>>,
}

impl Session {
    /// Create a new anonymous session with the given ID and outbound queue
    pub fn new(id: SessionId, sender: mpsc::Sender<Message>) -> Self {
        Self {
            id,
            username: None,
            sender,
            _hangup: None,
        }
    }

    /// Attach a hangup signal that fires when the server forgets this session
    pub fn with_hangup(mut self, hangup: oneshot::Sender<()>) -> Self {
        self._hangup = Some(hangup);
        self
    }

    /// Queue a message for this session without waiting
    ///
    /// Never blocks the caller: a peer that lets its queue fill up gets
    /// [`SendError::QueueFull`] and is expected to be dropped.
    pub fn deliver(&self, msg: Message) -> Result<(), SendError> {
        self.sender.try_send(msg).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => SendError::QueueFull,
            mpsc::error::TrySendError::Closed(_) => SendError::ChannelClosed,
        })
    }

    pub fn username(&self) -> Option<&str> {
        self.username.as_deref()
    }

    /// Get the display name for this session, for logs
    pub fn display_name(&self) -> &str {
        self.username.as_deref().unwrap_or("<anonymous>")
    }

    pub fn state(&self) -> SessionState {
        if self.username.is_some() {
            SessionState::Registered
        } else {
            SessionState::Anonymous
        }
    }

    /// Bind the username; only the first call has any effect
    ///
    /// Returns false if the session was already registered.
    pub(crate) fn set_username(&mut self, username: String) -> bool {
        if self.username.is_some() {
            return false;
        }
        self.username = Some(username);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_session_creation() {
        let (tx, _rx) = mpsc::channel(32);
        let session = Session::new(SessionId::new(), tx);

        assert!(session.username().is_none());
        assert_eq!(session.state(), SessionState::Anonymous);
        assert_eq!(session.display_name(), "<anonymous>");
    }

    #[tokio::test]
    async fn test_username_set_once() {
        let (tx, _rx) = mpsc::channel(32);
        let mut session = Session::new(SessionId::new(), tx);

        assert!(session.set_username("Alice".to_string()));
        assert!(!session.set_username("Mallory".to_string()));

        assert_eq!(session.state(), SessionState::Registered);
        assert_eq!(session.display_name(), "Alice");
    }

    #[tokio::test]
    async fn test_deliver_full_queue() {
        let (tx, mut rx) = mpsc::channel(1);
        let session = Session::new(SessionId::new(), tx);

        assert_eq!(session.deliver(Message::Error("one".into())), Ok(()));
        assert_eq!(
            session.deliver(Message::Error("two".into())),
            Err(SendError::QueueFull)
        );
        assert_eq!(rx.recv().await, Some(Message::Error("one".into())));
    }

    #[tokio::test]
    async fn test_drop_fires_hangup() {
        let (tx, _rx) = mpsc::channel(1);
        let (hangup_tx, hangup_rx) = oneshot::channel();
        let session = Session::new(SessionId::new(), tx).with_hangup(hangup_tx);

        drop(session);
        assert!(hangup_rx.await.is_err());
    }

    #[tokio::test]
    async fn test_deliver_closed() {
        let (tx, rx) = mpsc::channel(1);
        let session = Session::new(SessionId::new(), tx);
        drop(rx);

        assert_eq!(
            session.deliver(Message::Error("gone".into())),
            Err(SendError::ChannelClosed)
        );
    }
}
