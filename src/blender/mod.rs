//! Proxy for the Blender add-on command socket.
//!
//! The add-on runs inside Blender's main thread and executes one command at
//! a time, so every exchange on the socket is serialised: the connection is
//! held in a [`tokio::sync::Mutex`] whose guard is kept for the full
//! write-then-read cycle. Two callers can never interleave bytes on the wire.
//!
//! The connection is opened lazily on the first command and kept for
//! subsequent ones. Any failure that leaves the stream in an unknown state
//! (I/O error, decode error, timeout) drops it; the next command dials again.
//! A dead connection is retried once within the same call when the command
//! cannot have reached the add-on.

mod error;
pub mod wire;

pub use error::{BlenderError, BlenderResult};
pub use wire::{embedded_error, BlenderCommand, BlenderResponse};

use std::time::Duration;

use serde_json::Value;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::config::BlenderConfig;
use wire::{decode_response, Decoded};

/// Size of each socket read while assembling a response.
const READ_CHUNK: usize = 8192;

/// Handle to the Blender add-on command socket.
#[derive(Debug)]
pub struct BlenderProxy {
    /// `host:port` of the add-on.
    addr: String,
    /// Timeout applied by [`BlenderProxy::send`].
    default_timeout: Duration,
    /// The single connection, `None` until first use or after a failure.
    conn: Mutex<Option<TcpStream>>,
}

impl BlenderProxy {
    /// Creates a proxy for the add-on at `host:port`. No connection is made yet.
    #[must_use]
    pub fn new(host: &str, port: u16, default_timeout: Duration) -> Self {
        Self {
            addr: format!("{host}:{port}"),
            default_timeout,
            conn: Mutex::new(None),
        }
    }

    /// Creates a proxy from the `blender` configuration section.
    #[must_use]
    pub fn from_config(config: &BlenderConfig) -> Self {
        Self::new(&config.host, config.port, config.timeout())
    }

    /// Returns the `host:port` this proxy dials.
    #[must_use]
    pub fn addr(&self) -> &str {
        &self.addr
    }

    /// Returns the timeout used by [`BlenderProxy::send`].
    #[must_use]
    pub const fn default_timeout(&self) -> Duration {
        self.default_timeout
    }

    /// Returns true if a connection is currently open.
    pub async fn is_connected(&self) -> bool {
        self.conn.lock().await.is_some()
    }

    /// Closes the connection, if any.
    pub async fn disconnect(&self) {
        if self.conn.lock().await.take().is_some() {
            tracing::info!(addr = %self.addr, "Disconnected from Blender");
        }
    }

    /// Sends `kind` with `params` using the default timeout.
    ///
    /// # Errors
    ///
    /// See [`BlenderProxy::invoke`].
    pub async fn send(&self, kind: &str, params: Value) -> BlenderResult<Value> {
        let command = BlenderCommand::with_params(kind, params);
        self.invoke(&command, self.default_timeout).await
    }

    /// Sends one command and waits for its response.
    ///
    /// Returns the add-on's `result` payload. `timeout` bounds the whole
    /// call, including a reconnect.
    ///
    /// A command is sent a second time only when it cannot have run: the
    /// connection could not be opened, or a reused connection turned out to
    /// be dead before any response byte arrived. A fresh connection that
    /// drops after the frame was written is not resent, since the add-on may
    /// already have executed the command.
    ///
    /// # Errors
    ///
    /// - [`BlenderError::Connect`], [`BlenderError::Closed`] or
    ///   [`BlenderError::Io`] if the connection failed
    /// - [`BlenderError::Timeout`] if no complete response arrived in time
    /// - [`BlenderError::Decode`] if the response was malformed
    /// - [`BlenderError::Command`] if the add-on reported an error
    pub async fn invoke(&self, command: &BlenderCommand, timeout: Duration) -> BlenderResult<Value> {
        let frame = command.encode()?;
        let mut conn = self.conn.lock().await;
        let deadline = Instant::now() + timeout;

        tracing::debug!(command = %command.kind, "Sending command to Blender");

        match self.attempt(&mut conn, command, &frame, deadline, timeout).await {
            Ok(result) => Ok(result),
            Err(failed) if failed.resend => {
                tracing::warn!(
                    command = %command.kind,
                    error = %failed.error,
                    "Connection to Blender lost, reconnecting once"
                );
                self.attempt(&mut conn, command, &frame, deadline, timeout)
                    .await
                    .map_err(|failed| failed.error)
            }
            Err(failed) => Err(failed.error),
        }
    }

    /// Runs one exchange on `slot`, dialling first if it is empty.
    ///
    /// The slot is cleared whenever the stream may be out of sync.
    async fn attempt(
        &self,
        slot: &mut Option<TcpStream>,
        command: &BlenderCommand,
        frame: &[u8],
        deadline: Instant,
        timeout: Duration,
    ) -> Result<Value, Failed> {
        let outcome = tokio::time::timeout_at(deadline, self.exchange_on(slot, frame)).await;

        match outcome {
            Ok(Ok(response)) => response.into_result().map_err(Failed::fatal),
            Ok(Err(failed)) => {
                *slot = None;
                Err(failed)
            }
            Err(_) => {
                *slot = None;
                Err(Failed::fatal(BlenderError::Timeout {
                    command: command.kind.clone(),
                    after: timeout,
                }))
            }
        }
    }

    async fn exchange_on(
        &self,
        slot: &mut Option<TcpStream>,
        frame: &[u8],
    ) -> Result<BlenderResponse, Failed> {
        let reused = slot.is_some();
        if !reused {
            let stream = self.connect().await.map_err(|error| Failed {
                error,
                resend: true,
            })?;
            *slot = Some(stream);
        }
        let Some(stream) = slot.as_mut() else {
            return Err(Failed::fatal(BlenderError::Closed));
        };

        let mut received = false;
        exchange(stream, frame, &mut received)
            .await
            .map_err(|error| Failed {
                resend: reused && !received && error.is_connection_loss(),
                error,
            })
    }

    async fn connect(&self) -> BlenderResult<TcpStream> {
        let stream =
            TcpStream::connect(&self.addr)
                .await
                .map_err(|source| BlenderError::Connect {
                    addr: self.addr.clone(),
                    source,
                })?;
        // Commands are small and latency-bound.
        let _ = stream.set_nodelay(true);
        tracing::info!(addr = %self.addr, "Connected to Blender");
        Ok(stream)
    }
}

/// A failed attempt and whether the command may be sent again.
#[derive(Debug)]
struct Failed {
    error: BlenderError,
    resend: bool,
}

impl Failed {
    const fn fatal(error: BlenderError) -> Self {
        Self {
            error,
            resend: false,
        }
    }
}

/// Writes one frame and reads until a complete response parses.
///
/// `received` is set once any response byte has arrived.
async fn exchange(
    stream: &mut TcpStream,
    frame: &[u8],
    received: &mut bool,
) -> BlenderResult<BlenderResponse> {
    stream.write_all(frame).await?;
    stream.flush().await?;

    let mut buf = Vec::with_capacity(READ_CHUNK);
    let mut chunk = [0u8; READ_CHUNK];
    loop {
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            return Err(BlenderError::Closed);
        }
        *received = true;
        buf.extend_from_slice(&chunk[..n]);
        if let Decoded::Complete(response) = decode_response(&buf)? {
            return Ok(response);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn proxy_uses_config_address() {
        let proxy = BlenderProxy::from_config(&BlenderConfig::default());
        assert_eq!(proxy.addr(), "localhost:9876");
        assert_eq!(proxy.default_timeout(), Duration::from_secs(180));
    }

    #[tokio::test]
    async fn proxy_starts_disconnected() {
        let proxy = BlenderProxy::new("127.0.0.1", 9876, Duration::from_secs(1));
        assert!(!proxy.is_connected().await);
    }

    #[tokio::test]
    async fn unreachable_addon_is_a_connect_error() {
        // Bind then drop a listener to get a port nobody listens on.
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let proxy = BlenderProxy::new("127.0.0.1", port, Duration::from_secs(5));
        let err = proxy.send("get_scene_info", Value::Null).await.unwrap_err();
        assert!(matches!(err, BlenderError::Connect { .. }), "{err:?}");
        assert!(!proxy.is_connected().await);
    }
}
