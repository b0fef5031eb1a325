//! Wire format spoken by the Blender add-on command socket.
//!
//! A request is a single JSON document `{"type": ..., "params": {...}}`. The
//! add-on answers with one JSON document and no framing of its own, so the
//! reader accumulates bytes until they parse as a complete value.
//!
//! ```text
//! -> {"type":"get_object_info","params":{"name":"Cube"}}\n
//! <- {"status":"success","result":{"name":"Cube","type":"MESH",...}}
//! <- {"status":"error","message":"Object not found: Cube"}
//! ```

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::error::BlenderError;

/// A command sent to the add-on.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BlenderCommand {
    /// Command name understood by the add-on.
    #[serde(rename = "type")]
    pub kind: String,
    /// Command parameters (always an object).
    pub params: Map<String, Value>,
}

impl BlenderCommand {
    /// Creates a command with no parameters.
    #[must_use]
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            params: Map::new(),
        }
    }

    /// Creates a command from a JSON value; non-object values become `{}`.
    #[must_use]
    pub fn with_params(kind: impl Into<String>, params: Value) -> Self {
        let params = match params {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        Self {
            kind: kind.into(),
            params,
        }
    }

    /// Serialises the command as a newline-terminated frame.
    ///
    /// # Errors
    ///
    /// Returns an error if serialisation fails.
    pub fn encode(&self) -> Result<Vec<u8>, BlenderError> {
        let mut bytes = serde_json::to_vec(self).map_err(BlenderError::Decode)?;
        bytes.push(b'\n');
        Ok(bytes)
    }
}

/// Response envelope returned by the add-on.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum BlenderResponse {
    /// Command succeeded.
    Success {
        /// Command-specific payload.
        #[serde(default)]
        result: Value,
    },
    /// Command failed inside Blender.
    Error {
        /// Failure description.
        #[serde(default)]
        message: Option<String>,
    },
}

impl BlenderResponse {
    /// Converts the envelope into the command result.
    ///
    /// # Errors
    ///
    /// Returns [`BlenderError::Command`] for `status: "error"`.
    pub fn into_result(self) -> Result<Value, BlenderError> {
        match self {
            Self::Success { result } => Ok(result),
            Self::Error { message } => Err(BlenderError::Command {
                message: message.unwrap_or_else(|| "Unknown error".to_string()),
            }),
        }
    }
}

/// Returns the message of a failure the add-on reported inside a successful
/// envelope (`{"status":"success","result":{"error":"..."}}`).
///
/// Integrations such as PolyHaven or Hyper3D answer this way when the remote
/// service rejects a request or the integration is disabled.
#[must_use]
pub fn embedded_error(result: &Value) -> Option<String> {
    match result.get("error")? {
        Value::Null | Value::Bool(false) => None,
        Value::String(message) => Some(message.clone()),
        other => Some(other.to_string()),
    }
}

/// Outcome of trying to decode an accumulated response buffer.
#[derive(Debug)]
pub enum Decoded {
    /// More bytes are needed.
    Incomplete,
    /// A full response was parsed.
    Complete(BlenderResponse),
}

/// Attempts to decode a complete response from `buf`.
///
/// # Errors
///
/// Returns [`BlenderError::Decode`] if the bytes can never form a valid
/// response (syntax error, or a complete document of the wrong shape).
pub fn decode_response(buf: &[u8]) -> Result<Decoded, BlenderError> {
    if buf.iter().all(u8::is_ascii_whitespace) {
        return Ok(Decoded::Incomplete);
    }
    match serde_json::from_slice::<BlenderResponse>(buf) {
        Ok(response) => Ok(Decoded::Complete(response)),
        Err(e) if e.is_eof() => Ok(Decoded::Incomplete),
        Err(e) => Err(BlenderError::Decode(e)),
    }
}
