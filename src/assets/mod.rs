//! Gateways to external asset libraries.
//!
//! PolyHaven and Sketchfab are reached through the Blender add-on, which
//! owns the HTTP clients, API keys and the import into the scene. These
//! gateways give the dispatcher typed search/download operations over the
//! add-on commands and turn provider failures into [`GatewayError::Remote`].

pub mod polyhaven;
pub mod sketchfab;

pub use polyhaven::PolyHaven;
pub use sketchfab::Sketchfab;

use serde_json::Value;
use thiserror::Error;

use crate::blender::{embedded_error, BlenderError, BlenderProxy};

/// Errors raised by asset gateways.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// The asset service reported a failure.
    #[error("{service} error: {message}")]
    Remote {
        /// Service name.
        service: &'static str,
        /// Message passed through from the service.
        message: String,
    },

    /// The add-on could not be reached or reported an error.
    #[error(transparent)]
    Blender(#[from] BlenderError),
}

/// Sends a command and rejects results carrying an embedded error.
async fn request(
    proxy: &BlenderProxy,
    service: &'static str,
    kind: &str,
    params: Value,
) -> Result<Value, GatewayError> {
    let result = proxy.send(kind, params).await?;
    match embedded_error(&result) {
        Some(message) => {
            tracing::debug!(service, command = kind, error = %message, "Asset service reported an error");
            Err(GatewayError::Remote { service, message })
        }
        None => Ok(result),
    }
}
