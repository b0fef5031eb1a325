//! Model Context Protocol (MCP) server implementation.
//!
//! This module implements the Model Context Protocol for exposing Blender as a set
//! of tools and one prompt to AI assistants. The server communicates over
//! stdio transport using newline-delimited JSON-RPC 2.0 messages.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────┐
//! │                          MCP Server                           │
//! │                                                               │
//! │   ┌─────────────┐    ┌─────────────┐    ┌─────────────────┐   │
//! │   │  Transport  │───▶│   Server    │───▶│ ToolDispatcher  │   │
//! │   │   (stdio)   │    │ (lifecycle) │    │ (tools/prompts) │   │
//! │   └─────────────┘    └─────────────┘    └─────────────────┘   │
//! │                                           │      │      │     │
//! │                                           ▼      ▼      ▼     │
//! │                                       Blender  Jobs  Assets   │
//! │                                        proxy  tracker gateways│
//! └───────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Protocol Version
//!
//! This implementation targets MCP protocol version 2024-11-05.

pub mod protocol;
pub mod server;
pub mod transport;

pub use protocol::{JsonRpcError, JsonRpcRequest, JsonRpcResponse, MCP_PROTOCOL_VERSION};
pub use server::McpServer;
pub use transport::{StdioTransport, TransportError};
