//! Server limits
//!
//! Tunables shared by the accept loop, the connection handlers and the
//! `ChatServer` actor.

use crate::codec::DEFAULT_MAX_FRAME_SIZE;
use crate::error::ConfigError;

/// Default per-session outbound queue length
pub const DEFAULT_OUTBOUND_QUEUE_CAPACITY: usize = 64;

/// Default buffer size of the handler → server command channel
pub const DEFAULT_COMMAND_BUFFER: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServerConfig {
    /// Largest accepted frame payload in bytes
    pub max_frame_size: usize,
    /// Messages a session may have queued before it counts as unresponsive
    pub outbound_queue_capacity: usize,
    /// Buffer size of the command channel into the server actor
    pub command_buffer: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
            outbound_queue_capacity: DEFAULT_OUTBOUND_QUEUE_CAPACITY,
            command_buffer: DEFAULT_COMMAND_BUFFER,
        }
    }
}

impl ServerConfig {
    /// Reject limits that would make channels or frames unusable
    ///
    /// # Errors
    /// [`ConfigError::ZeroCapacity`] naming the first zero-sized limit.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.outbound_queue_capacity == 0 {
            return Err(ConfigError::ZeroCapacity("outbound queue capacity"));
        }
        if self.command_buffer == 0 {
            return Err(ConfigError::ZeroCapacity("command buffer"));
        }
        Ok(())
    }
}
