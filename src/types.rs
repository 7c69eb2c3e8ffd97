//! Basic type definitions for the relay server
//!
//! Provides small wrappers for type safety:
//! - `SessionId`: UUID-based unique connection identifier
//! - `Audience`: recipient selector of a chat message

use uuid::Uuid;

/// Wire value of the all-users audience selector
pub const ALL_AUDIENCE: &str = "ALL";

/// Unique session identifier (newtype pattern)
///
/// Wraps a UUID v4. One per accepted connection, whether or not the
/// connection ever claims a username.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(pub Uuid);

impl SessionId {
    /// Create a new random session ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Intended recipients of a chat message
///
/// `"ALL"` on the wire selects every online user; anything else names a
/// single user (possibly the sender itself).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Audience {
    All,
    User(String),
}

impl Audience {
    /// Parse the audience field of a chat entry
    pub fn parse(raw: &str) -> Self {
        if raw == ALL_AUDIENCE {
            Audience::All
        } else {
            Audience::User(raw.to_string())
        }
    }

    /// Wire representation
    pub fn as_str(&self) -> &str {
        match self {
            Audience::All => ALL_AUDIENCE,
            Audience::User(name) => name,
        }
    }
}

impl std::fmt::Display for Audience {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
