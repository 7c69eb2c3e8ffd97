//! Length-prefixed TCP Chat Relay Library
//!
//! A single-process chat relay: clients claim a unique username, then
//! exchange broadcast and direct messages, with per-user block lists that
//! hide traffic in both directions.
//!
//! # Features
//! - `u32` big-endian length-prefixed JSON frames
//! - Unique username registration with history replay
//! - Broadcast (`ALL`) and direct messages
//! - In-band commands: `/Name`, `/Block`, `/UnBlock`, `/Blocked`,
//!   `/DisplayUsers`, `/DisplayAllUsers`
//! - Join/leave notices
//! - Pluggable persistence of history, known users and block lists
//! - Optional TLS on accepted connections
//!
//! # Architecture
//! Uses the Actor pattern with `mpsc` channels:
//! - `ChatServer` is the central actor owning the registry, block graph
//!   and history
//! - Each connection has a `handler` task that reassembles frames and
//!   forwards commands to the server
//! - Every session has a bounded outbound queue; a peer that stops reading
//!   is dropped instead of stalling everyone else
//!
//! # Example
//! ```ignore
//! use tokio::net::TcpListener;
//! use tokio::sync::mpsc;
//! use relay_chat::{serve, ChatServer, MemoryStore, ServerConfig};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = ServerConfig::default();
//!     let listener = TcpListener::bind("127.0.0.1:9000").await.unwrap();
//!     let (cmd_tx, cmd_rx) = mpsc::channel(config.command_buffer);
//!
//!     let server = ChatServer::open(cmd_rx, MemoryStore::default()).unwrap();
//!     tokio::spawn(server.run());
//!
//!     serve(listener, cmd_tx, config, None).await;
//! }
//! ```

pub mod block;
pub mod codec;
pub mod command;
pub mod config;
pub mod error;
pub mod handler;
pub mod history;
pub mod message;
pub mod registry;
pub mod router;
pub mod server;
pub mod session;
pub mod store;
pub mod tls;
pub mod types;

// Re-export main types for convenience
pub use block::BlockGraph;
pub use codec::FrameCodec;
pub use command::Command;
pub use config::ServerConfig;
pub use error::{AppError, ConfigError, FrameError, SendError, StoreError, TlsError};
pub use handler::{handle_connection, serve};
pub use history::HistoryLog;
pub use message::{ChatMessage, Message, RegisterAck, UserStatus};
pub use registry::SessionRegistry;
pub use server::{ChatServer, ServerCommand};
pub use session::{Session, SessionState};
pub use store::{JsonFileStore, MemoryStore, PersistedState, StateStore};
pub use tls::load_acceptor;
pub use types::{Audience, SessionId};
