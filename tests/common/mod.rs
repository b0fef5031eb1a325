//! Fake BlenderMCP add-on for integration tests.
//!
//! Listens on `127.0.0.1:0`, records every command it receives and answers
//! from a scripted handler. It also flags any sign of two commands being in
//! flight at once.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use blender_mcp_bridge::blender::BlenderProxy;
use blender_mcp_bridge::config::JobsConfig;
use blender_mcp_bridge::jobs::JobTracker;
use blender_mcp_bridge::mcp::McpServer;
use blender_mcp_bridge::tools::ToolDispatcher;
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

/// How the fake add-on answers one command.
pub enum Reply {
    /// `{"status":"success","result":...}`
    Success(Value),
    /// `{"status":"error","message":...}`
    Error(String),
    /// Raw bytes written as separate chunks.
    Chunks(Vec<Vec<u8>>),
    /// Waits, then answers with success.
    Delayed(Duration, Value),
    /// Never answers; waits for the client to hang up.
    Hang,
    /// Drops the connection without answering.
    Close,
    /// Answers with success, then drops the connection.
    Final(Value),
    /// Writes the bytes, then drops the connection.
    Partial(Vec<u8>),
    /// Waits, then drops the connection without answering.
    CloseAfter(Duration),
}

type Handler = dyn Fn(&str, &Value) -> Reply + Send + Sync;

#[derive(Default)]
struct Shared {
    commands: Mutex<Vec<Value>>,
    connections: AtomicUsize,
    active: AtomicUsize,
    overlapped: AtomicBool,
}

/// A running fake add-on. Stops accepting when dropped.
pub struct FakeBlender {
    port: u16,
    shared: Arc<Shared>,
    task: JoinHandle<()>,
}

impl FakeBlender {
    /// Starts listening; `handler` receives the command type and params.
    pub async fn start<F>(handler: F) -> Self
    where
        F: Fn(&str, &Value) -> Reply + Send + Sync + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let shared = Arc::new(Shared::default());
        let handler: Arc<Handler> = Arc::new(handler);

        let task = tokio::spawn({
            let shared = Arc::clone(&shared);
            async move {
                while let Ok((stream, _)) = listener.accept().await {
                    shared.connections.fetch_add(1, Ordering::SeqCst);
                    tokio::spawn(serve_connection(
                        stream,
                        Arc::clone(&shared),
                        Arc::clone(&handler),
                    ));
                }
            }
        });

        Self { port, shared, task }
    }

    /// Port the fake listens on.
    pub const fn port(&self) -> u16 {
        self.port
    }

    /// A proxy pointed at this fake.
    pub fn proxy(&self, timeout: Duration) -> BlenderProxy {
        BlenderProxy::new("127.0.0.1", self.port, timeout)
    }

    /// A full MCP server whose proxy points at this fake.
    pub fn server(&self) -> McpServer {
        McpServer::new(ToolDispatcher::new(
            self.proxy(Duration::from_secs(5)),
            JobTracker::new(&JobsConfig::default()),
        ))
    }

    /// Every command received so far, as `{"type", "params"}`.
    pub fn commands(&self) -> Vec<Value> {
        self.shared.commands.lock().unwrap().clone()
    }

    /// Types of every command received so far.
    pub fn command_types(&self) -> Vec<String> {
        self.commands()
            .iter()
            .map(|c| c["type"].as_str().unwrap_or_default().to_string())
            .collect()
    }

    /// Number of accepted connections.
    pub fn connections(&self) -> usize {
        self.shared.connections.load(Ordering::SeqCst)
    }

    /// True if a command arrived while another was being answered.
    pub fn overlapped(&self) -> bool {
        self.shared.overlapped.load(Ordering::SeqCst)
    }
}

impl Drop for FakeBlender {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Returns a port nothing is listening on.
pub async fn closed_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap().port()
}

/// Handler answering every command with an empty success.
pub fn ok_handler(_: &str, _: &Value) -> Reply {
    Reply::Success(json!({}))
}

async fn serve_connection(stream: TcpStream, shared: Arc<Shared>, handler: Arc<Handler>) {
    let (read, mut write) = stream.into_split();
    let mut reader = BufReader::new(read);
    let mut line = String::new();

    loop {
        line.clear();
        match reader.read_line(&mut line).await {
            Ok(0) | Err(_) => return,
            Ok(_) => {}
        }
        let Ok(command) = serde_json::from_str::<Value>(&line) else {
            return;
        };

        if shared.active.fetch_add(1, Ordering::SeqCst) > 0 || !reader.buffer().is_empty() {
            shared.overlapped.store(true, Ordering::SeqCst);
        }
        shared.commands.lock().unwrap().push(command.clone());

        let kind = command["type"].as_str().unwrap_or_default().to_string();
        let reply = handler(&kind, &command["params"]);
        let keep_open = answer(&mut reader, &mut write, reply, &shared).await;

        shared.active.fetch_sub(1, Ordering::SeqCst);
        if !keep_open {
            return;
        }
    }
}

async fn answer(
    reader: &mut BufReader<OwnedReadHalf>,
    write: &mut OwnedWriteHalf,
    reply: Reply,
    shared: &Shared,
) -> bool {
    let body = match reply {
        Reply::Success(result) => json!({ "status": "success", "result": result }),
        Reply::Error(message) => json!({ "status": "error", "message": message }),
        Reply::Chunks(chunks) => {
            for chunk in chunks {
                if write.write_all(&chunk).await.is_err() {
                    return false;
                }
                let _ = write.flush().await;
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
            return true;
        }
        Reply::Delayed(delay, result) => {
            tokio::time::sleep(delay).await;
            // Anything readable now was written while this command was in flight.
            if let Ok(Ok(buf)) =
                tokio::time::timeout(Duration::from_millis(20), reader.fill_buf()).await
            {
                if !buf.is_empty() {
                    shared.overlapped.store(true, Ordering::SeqCst);
                }
            }
            json!({ "status": "success", "result": result })
        }
        Reply::Hang => {
            let mut byte = [0u8; 1];
            let _ = reader.read(&mut byte).await;
            return false;
        }
        Reply::Close => return false,
        Reply::Final(result) => {
            let body = json!({ "status": "success", "result": result });
            let _ = write.write_all(body.to_string().as_bytes()).await;
            let _ = write.flush().await;
            return false;
        }
        Reply::Partial(bytes) => {
            let _ = write.write_all(&bytes).await;
            let _ = write.flush().await;
            return false;
        }
        Reply::CloseAfter(delay) => {
            tokio::time::sleep(delay).await;
            return false;
        }
    };

    // The add-on sends bare JSON without a trailing newline.
    write.write_all(body.to_string().as_bytes()).await.is_ok()
}
