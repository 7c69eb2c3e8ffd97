//! Error types for the relay server
//!
//! Defines application-level errors, framing errors, configuration and TLS
//! errors, outbound send errors and persistence errors. Uses thiserror for
//! ergonomic error definitions.

use thiserror::Error;

/// Application-level errors
///
/// Covers both fatal errors (connection termination) and
/// business errors (send an error message to the client).
#[derive(Debug, Error)]
pub enum AppError {
    /// IO error (fatal)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// Broken length prefix (fatal for the connection)
    #[error("Malformed frame: {0}")]
    Frame(#[from] FrameError),

    /// Unusable server limits
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    /// Persistence store failure
    #[error("Persistence error: {0}")]
    Store(#[from] StoreError),

    /// Channel send error (fatal - internal channel broken)
    #[error("Channel send error")]
    ChannelSend,

    /// Chat traffic before a username was claimed
    #[error("Username required")]
    UsernameRequired,

    /// Second registration attempt on an already registered session
    #[error("Already registered as {0}")]
    AlreadyRegistered(String),

    /// Direct message addressed to someone who is not online
    #[error("Unknown audience: {0}")]
    UnknownAudience(String),
}

/// Frame codec errors
#[derive(Debug, Error)]
pub enum FrameError {
    /// Declared (or requested) payload length exceeds the configured maximum
    #[error("frame of {length} bytes exceeds maximum of {max} bytes")]
    FrameTooLarge { length: usize, max: usize },

    /// Underlying stream failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Invalid server limits
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// A queue or buffer size of zero
    #[error("{0} must be at least 1")]
    ZeroCapacity(&'static str),
}

/// TLS setup errors
#[derive(Debug, Error)]
pub enum TlsError {
    /// Certificate or key file could not be read
    #[error("TLS file error: {0}")]
    Io(#[from] std::io::Error),

    /// No PEM certificate found in the file
    #[error("no certificates found in {0}")]
    NoCertificates(String),

    /// No PEM private key found in the file
    #[error("no private key found in {0}")]
    NoPrivateKey(String),

    /// Certificate and key were rejected
    #[error("TLS configuration error: {0}")]
    Rustls(#[from] tokio_rustls::rustls::Error),
}

/// Outbound queue errors
///
/// Occurs when the server tries to hand a message to a session's writer.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SendError {
    /// The session's outbound queue is full; the peer is not keeping up
    #[error("Outbound queue full")]
    QueueFull,

    /// The receiving end of the channel has been closed
    #[error("Channel closed")]
    ChannelClosed,
}

/// Persistence store errors
#[derive(Debug, Error)]
pub enum StoreError {
    /// Store file could not be read or written
    #[error("store IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Store contents could not be (de)serialized
    #[error("store format error: {0}")]
    Json(#[from] serde_json::Error),
}
