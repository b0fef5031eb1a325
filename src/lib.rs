//! blender-mcp-bridge: MCP server bridging AI assistants to Blender
//!
//! This library exposes Blender's scene editing and asset generation to an
//! MCP client over stdio. Tool calls are forwarded to the BlenderMCP add-on's
//! TCP command socket.
//!
//! # Architecture
//!
//! - **Stdio channel**: byte-exact, newline-delimited JSON-RPC
//! - **Blender proxy**: one serialised connection to the add-on, lazily
//!   (re)connected
//! - **Tools**: 21 tools and one prompt, arguments validated before dispatch
//! - **Jobs**: client-driven polling of Hyper3D and Hunyuan3D generation jobs
//!
//! # Modules
//!
//! - [`config`]: Configuration loading and validation
//! - [`error`]: Configuration errors
//! - [`mcp`]: MCP protocol implementation
//! - [`blender`]: Add-on command socket
//! - [`tools`]: Tool registry and dispatcher
//! - [`jobs`]: Generation job tracker
//! - [`assets`]: PolyHaven and Sketchfab gateways

pub mod assets;
pub mod blender;
pub mod config;
pub mod error;
pub mod jobs;
pub mod mcp;
pub mod tools;
