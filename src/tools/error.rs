//! Tool call errors.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::assets::GatewayError;
use crate::blender::BlenderError;
use crate::jobs::JobError;

/// Errors raised while dispatching a tool call.
///
/// [`ToolError::is_invalid_params`] separates errors answered with a JSON-RPC
/// `-32602` from those reported as an `isError` tool result.
#[derive(Debug, Error)]
pub enum ToolError {
    /// No tool with this name is registered.
    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    /// Arguments do not satisfy the tool's input schema.
    #[error("{0}")]
    InvalidParams(String),

    /// Job tracker failure.
    #[error(transparent)]
    Job(#[from] JobError),

    /// Asset gateway failure.
    #[error(transparent)]
    Gateway(#[from] GatewayError),

    /// The add-on could not be reached or reported an error.
    #[error(transparent)]
    Blender(#[from] BlenderError),

    /// The add-on answered, but the result carries an error.
    #[error("{context}: {message}")]
    Remote {
        /// What was being attempted.
        context: &'static str,
        /// Message passed through from the add-on.
        message: String,
    },

    /// A local file could not be read.
    #[error("Failed to read '{}': {source}", path.display())]
    Io {
        /// File that was being read.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: io::Error,
    },
}

impl ToolError {
    /// Returns true if the caller sent a bad request rather than the tool failing.
    #[must_use]
    pub const fn is_invalid_params(&self) -> bool {
        match self {
            Self::UnknownTool(_) | Self::InvalidParams(_) => true,
            Self::Job(e) => e.is_invalid_state(),
            Self::Gateway(_) | Self::Blender(_) | Self::Remote { .. } | Self::Io { .. } => false,
        }
    }
}
