//! Error types for the Blender command proxy.

use std::io;
use std::time::Duration;

use thiserror::Error;

/// Result type for proxy operations.
pub type BlenderResult<T> = Result<T, BlenderError>;

/// Errors that can occur while talking to the Blender add-on.
#[derive(Debug, Error)]
pub enum BlenderError {
    /// The add-on socket could not be reached.
    #[error("Could not connect to Blender at {addr}: {source}. Make sure the Blender add-on is running")]
    Connect {
        /// `host:port` that was dialled.
        addr: String,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// The add-on closed the connection before a full response arrived.
    #[error("Connection to Blender closed before a complete response was received")]
    Closed,

    /// Reading from or writing to the socket failed mid-exchange.
    #[error("I/O error talking to Blender: {0}")]
    Io(#[from] io::Error),

    /// No complete response within the configured timeout.
    #[error("Timed out after {secs}s waiting for Blender to answer '{command}'", secs = .after.as_secs())]
    Timeout {
        /// Command type that timed out.
        command: String,
        /// The timeout that elapsed.
        after: Duration,
    },

    /// The response was not valid JSON or not a recognised envelope.
    #[error("Invalid response from Blender: {0}")]
    Decode(#[source] serde_json::Error),

    /// The add-on answered with `status: "error"`.
    #[error("Blender error: {message}")]
    Command {
        /// Message reported by the add-on.
        message: String,
    },
}

impl BlenderError {
    /// Returns true for failures of the connection itself, as opposed to the
    /// exchange. Only these are retried with a fresh socket, and only while the
    /// command cannot have reached the add-on.
    #[must_use]
    pub const fn is_connection_loss(&self) -> bool {
        matches!(self, Self::Connect { .. } | Self::Closed | Self::Io(_))
    }
}
