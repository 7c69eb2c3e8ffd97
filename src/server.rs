//! ChatServer Actor implementation
//!
//! The central actor that owns all shared state: the session registry, the
//! block graph and the history log. Every mutation and every fan-out read
//! happens inside this one task, so commands from handlers are serialized
//! without any locks.

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};

use crate::block::BlockGraph;
use crate::command::Command;
use crate::error::{AppError, SendError, StoreError};
use crate::history::HistoryLog;
use crate::message::{ChatMessage, Message, RegisterAck};
use crate::registry::SessionRegistry;
use crate::router;
use crate::session::Session;
use crate::store::{PersistedState, StateStore};
use crate::types::{Audience, SessionId, ALL_AUDIENCE};

/// Greeting sent with a successful registration
const WELCOME: &str = "Welcome to the server!";

/// Commands sent from handlers to the ChatServer actor
#[derive(Debug)]
pub enum ServerCommand {
    /// New connection accepted
    Connect {
        session_id: SessionId,
        sender: mpsc::Sender<Message>,
        hangup: oneshot::Sender<()>,
    },
    /// Connection closed (clean or abrupt)
    Disconnect { session_id: SessionId },
    /// Claim a username
    Register {
        session_id: SessionId,
        username: String,
    },
    /// Batch of chat entries
    Chat {
        session_id: SessionId,
        messages: Vec<ChatMessage>,
    },
    /// Stop the actor and save state
    Shutdown,
}

/// The main ChatServer actor
pub struct ChatServer {
    registry: SessionRegistry,
    blocks: BlockGraph,
    history: HistoryLog,
    store: Box<dyn StateStore>,
    /// Command receiver channel
    receiver: mpsc::Receiver<ServerCommand>,
    /// Sessions whose outbound queue overflowed during the current command
    unresponsive: Vec<SessionId>,
}

impl ChatServer {
    /// Create a ChatServer from already loaded state
    pub fn new(
        receiver: mpsc::Receiver<ServerCommand>,
        state: PersistedState,
        store: Box<dyn StateStore>,
    ) -> Self {
        Self {
            registry: SessionRegistry::with_known_users(state.all_users),
            blocks: state.blocks,
            history: state.history,
            store,
            receiver,
            unresponsive: Vec::new(),
        }
    }

    /// Load state from `store` and create a ChatServer around it
    ///
    /// # Errors
    /// Fails if the store cannot be read; the server must not start.
    pub fn open(
        receiver: mpsc::Receiver<ServerCommand>,
        store: impl StateStore,
    ) -> Result<Self, StoreError> {
        let state = store.load()?;
        info!(
            "Loaded {} history entries, {} known users",
            state.history.len(),
            state.all_users.len()
        );
        Ok(Self::new(receiver, state, Box::new(store)))
    }

    /// Run the ChatServer event loop
    ///
    /// Processes commands until `Shutdown` arrives or all senders are
    /// dropped, then saves state.
    pub async fn run(mut self) {
        info!("ChatServer started");

        while let Some(cmd) = self.receiver.recv().await {
            if matches!(cmd, ServerCommand::Shutdown) {
                break;
            }
            self.handle_command(cmd);
        }

        self.save();
        info!("ChatServer shutting down");
    }

    /// Process a single command
    fn handle_command(&mut self, cmd: ServerCommand) {
        match cmd {
            ServerCommand::Connect {
                session_id,
                sender,
                hangup,
            } => self.handle_connect(session_id, sender, hangup),
            ServerCommand::Disconnect { session_id } => self.drop_session(session_id),
            ServerCommand::Register {
                session_id,
                username,
            } => self.handle_register(session_id, username),
            ServerCommand::Chat {
                session_id,
                messages,
            } => self.handle_chat(session_id, messages),
            ServerCommand::Shutdown => {}
        }

        // Dropping a peer notifies others, which may overflow more queues
        while let Some(session_id) = self.unresponsive.pop() {
            warn!("Dropping unresponsive session {}", session_id);
            self.drop_session(session_id);
        }
    }

    /// Handle new connection
    fn handle_connect(
        &mut self,
        session_id: SessionId,
        sender: mpsc::Sender<Message>,
        hangup: oneshot::Sender<()>,
    ) {
        info!("Session {} connected", session_id);
        self.registry
            .connect(Session::new(session_id, sender).with_hangup(hangup));
        debug!(
            "Total connections: {}, online users: {}",
            self.registry.connection_count(),
            self.registry.online_count()
        );
    }

    /// Forget a session; announce the departure if it was registered
    ///
    /// Idempotent: a session dropped as unresponsive may still report its
    /// own disconnect later.
    fn drop_session(&mut self, session_id: SessionId) {
        let Some(state) = self.registry.get(session_id).map(Session::state) else {
            return;
        };
        debug!("Dropping {:?} session {}", state, session_id);

        let username = self.registry.unregister(session_id);
        self.registry.disconnect(session_id);

        match username {
            Some(name) => {
                info!("User '{}' ({}) left", name, session_id);
                for peer in router::peers(&self.registry, &self.blocks, &name) {
                    self.deliver(peer, Message::UsersLeft(vec![name.clone()]));
                }
                self.save();
            }
            None => info!("Anonymous session {} disconnected", session_id),
        }

        debug!(
            "Total connections: {}, online users: {}",
            self.registry.connection_count(),
            self.registry.online_count()
        );
    }

    /// Handle a username claim
    fn handle_register(&mut self, session_id: SessionId, username: String) {
        let Some(session) = self.registry.get(session_id) else {
            return;
        };

        if let Some(current) = session.username() {
            let err = AppError::AlreadyRegistered(current.to_string());
            self.deliver(session_id, err.into());
            return;
        }

        if let Err(reason) = validate_username(&username) {
            debug!("Session {} sent invalid username: {}", session_id, reason);
            self.deliver(
                session_id,
                Message::RegisterAck(RegisterAck::rejected(reason)),
            );
            return;
        }

        if !self.registry.register(&username, session_id) {
            info!("Session {} asked for taken username '{}'", session_id, username);
            self.deliver(
                session_id,
                Message::RegisterAck(RegisterAck::rejected("Username already taken")),
            );
            return;
        }

        info!("Session {} registered as '{}'", session_id, username);

        let ack = RegisterAck::accepted(
            WELCOME,
            self.registry.list(),
            self.history.entries().to_vec(),
        );
        self.deliver(session_id, Message::RegisterAck(ack));

        for peer in router::peers(&self.registry, &self.blocks, &username) {
            self.deliver(peer, Message::UsersJoined(vec![username.clone()]));
        }
    }

    /// Handle a batch of chat entries from one session
    ///
    /// Commands are answered and direct messages routed in batch order;
    /// entries for `ALL` are logged and broadcast together at the end.
    fn handle_chat(&mut self, session_id: SessionId, messages: Vec<ChatMessage>) {
        let Some(session) = self.registry.get(session_id) else {
            return;
        };
        let Some(sender) = session.username().map(str::to_string) else {
            self.deliver(session_id, AppError::UsernameRequired.into());
            return;
        };

        let mut broadcast = Vec::new();

        for mut message in messages {
            // The connection, not the payload, decides who is speaking
            message.sender = sender.clone();

            if let Some(command) = Command::parse(&message.body) {
                self.run_command(&sender, command, &message);
                continue;
            }

            match message.audience() {
                Audience::All => {
                    self.history.append(message.clone());
                    broadcast.push(message);
                }
                audience => self.route(&sender, &audience, Message::Chat(vec![message])),
            }
        }

        if !broadcast.is_empty() {
            self.route(&sender, &Audience::All, Message::Chat(broadcast));
        }
    }

    /// Execute a `/Command` and answer the sender directly
    fn run_command(&mut self, sender: &str, command: Command, request: &ChatMessage) {
        let Some(reply) = command.execute(sender, &self.registry, &mut self.blocks) else {
            debug!("Ignoring unknown command from '{}': {:?}", sender, command);
            return;
        };

        let response = ChatMessage::new(sender, sender, request.timestamp, reply);
        self.route(
            sender,
            &Audience::User(sender.to_string()),
            Message::Chat(vec![response]),
        );
    }

    /// Fan a message out to the audience, or report an unknown audience
    fn route(&mut self, sender: &str, audience: &Audience, msg: Message) {
        match router::recipients(&self.registry, &self.blocks, sender, audience) {
            Ok(targets) => {
                debug!(
                    "Routing {} from '{}' to '{}': {} recipient(s)",
                    msg.kind(),
                    sender,
                    audience,
                    targets.len()
                );
                for target in targets {
                    self.deliver(target, msg.clone());
                }
            }
            Err(err) => {
                debug!("Route from '{}' failed: {}", sender, err);
                if let Some(session_id) = self.registry.lookup(sender).map(|s| s.id) {
                    self.deliver(session_id, err.into());
                }
            }
        }
    }

    /// Queue a message for one session without blocking
    fn deliver(&mut self, session_id: SessionId, msg: Message) {
        let Some(session) = self.registry.get(session_id) else {
            return;
        };

        match session.deliver(msg) {
            Ok(()) => {}
            Err(SendError::QueueFull) => {
                warn!(
                    "Outbound queue full for {} ({})",
                    session_id,
                    session.display_name()
                );
                if !self.unresponsive.contains(&session_id) {
                    self.unresponsive.push(session_id);
                }
            }
            Err(SendError::ChannelClosed) => {
                debug!("Session {} writer already closed", session_id);
            }
        }
    }

    /// Persist history, known users and block lists
    fn save(&self) {
        let state = PersistedState {
            history: self.history.clone(),
            all_users: self.registry.all_users().clone(),
            blocks: self.blocks.clone(),
        };
        match self.store.save(&state) {
            Ok(()) => debug!("State saved"),
            Err(e) => error!("Failed to save state: {}", e),
        }
    }
}

/// Names must be usable as an audience and as a command argument
fn validate_username(name: &str) -> Result<(), &'static str> {
    if name.is_empty() {
        Err("Username must not be empty")
    } else if name == ALL_AUDIENCE {
        Err("Username is reserved")
    } else if name.chars().any(char::is_whitespace) {
        Err("Username must not contain whitespace")
    } else {
        Ok(())
    }
}
