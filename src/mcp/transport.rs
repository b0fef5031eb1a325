//! stdio transport for the MCP server.
//!
//! This module implements the stdio transport as specified by MCP:
//!
//! - Messages are UTF-8 encoded JSON-RPC
//! - Messages are delimited by newlines
//! - Messages must not contain embedded newlines
//! - stdin: receives messages from client
//! - stdout: sends messages to client
//! - stderr: may be used for logging (not MCP messages)
//!
//! # Byte exactness
//!
//! The transport works on bytes: lines are split on `b'\n'` only, nothing is
//! translated on the way in or out, and a `\r` before the newline is left in
//! place (it is JSON whitespace). Rust's standard streams perform no newline
//! translation on any platform, so no stream-mode switching is needed.
//!
//! The transport is the only writer of stdout. It is created once in `main`
//! and moved into the server.

use std::io;
use std::string::FromUtf8Error;

use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader, Stdin, Stdout};

/// Errors raised by the transport.
#[derive(Debug, Error)]
pub enum TransportError {
    /// A line was not valid UTF-8. Only that line is lost.
    #[error("Input line of {len} bytes is not valid UTF-8")]
    Framing {
        /// Length of the rejected line.
        len: usize,
        /// Decoding failure.
        #[source]
        source: FromUtf8Error,
    },

    /// The stream itself failed.
    #[error("stdio error: {0}")]
    Io(#[from] io::Error),
}

impl TransportError {
    /// True if the stream can no longer be used.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::Io(_))
    }
}

/// A newline-delimited message transport, stdin/stdout by default.
#[derive(Debug)]
pub struct StdioTransport<R = Stdin, W = Stdout> {
    /// Buffered input.
    reader: BufReader<R>,
    /// Output.
    writer: W,
}

impl StdioTransport {
    /// Creates a transport over the process's stdin and stdout.
    #[must_use]
    pub fn new() -> Self {
        Self::from_parts(tokio::io::stdin(), tokio::io::stdout())
    }
}

impl Default for StdioTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl<R, W> StdioTransport<R, W>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    /// Creates a transport over arbitrary streams.
    pub fn from_parts(reader: R, writer: W) -> Self {
        Self {
            reader: BufReader::new(reader),
            writer,
        }
    }

    /// Reads the next line, without its terminating `\n`.
    ///
    /// Returns `None` at EOF. A final line without a newline is still returned.
    ///
    /// # Errors
    ///
    /// - [`TransportError::Framing`] if the line is not UTF-8; reading can continue
    /// - [`TransportError::Io`] if reading fails
    pub async fn read_message(&mut self) -> Result<Option<String>, TransportError> {
        let mut line = Vec::new();
        let bytes_read = self.reader.read_until(b'\n', &mut line).await?;

        if bytes_read == 0 {
            return Ok(None);
        }

        if line.last() == Some(&b'\n') {
            line.pop();
        }

        let len = line.len();
        String::from_utf8(line)
            .map(Some)
            .map_err(|source| TransportError::Framing { len, source })
    }

    /// Writes one message followed by `\n` and flushes.
    ///
    /// # Errors
    ///
    /// Returns an error if writing fails.
    pub async fn write_line(&mut self, message: &str) -> Result<(), TransportError> {
        // Framing is one message per line
        debug_assert!(
            !message.contains('\n'),
            "message must not contain embedded newlines"
        );

        self.writer.write_all(message.as_bytes()).await?;
        self.writer.write_all(b"\n").await?;
        self.writer.flush().await?;

        Ok(())
    }

    /// Returns the underlying reader and writer.
    pub fn into_inner(self) -> (R, W) {
        (self.reader.into_inner(), self.writer)
    }
}
