//! MCP server for the Blender bridge.
//!
//! This module implements the MCP server lifecycle:
//!
//! 1. **Initialisation**: Capability negotiation and version agreement
//! 2. **Operation**: Handling tool calls, prompts and other requests
//! 3. **Shutdown**: stdin EOF or a termination signal
//!
//! Requests are handled strictly one at a time: a line is read, dispatched,
//! and its response written before the next line is read.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::io::{AsyncRead, AsyncWrite};

use crate::mcp::protocol::{
    parse_message, ErrorCode, IncomingMessage, JsonRpcError, JsonRpcErrorData,
    JsonRpcNotification, JsonRpcRequest, JsonRpcResponse, MCP_PROTOCOL_VERSION, SERVER_NAME,
};
use crate::mcp::transport::{StdioTransport, TransportError};
use crate::tools::{prompts, ToolDispatcher};

/// Server state in the MCP lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
    /// Waiting for initialize request.
    AwaitingInit,
    /// Initialize received, waiting for initialized notification.
    Initialising,
    /// Ready for normal operation.
    Running,
    /// Shutdown in progress.
    ShuttingDown,
}

/// Server capabilities advertised during initialisation.
#[derive(Debug, Clone, Serialize)]
pub struct ServerCapabilities {
    /// Tool-related capabilities.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<ListCapabilities>,
    /// Prompt-related capabilities.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompts: Option<ListCapabilities>,
}

impl Default for ServerCapabilities {
    fn default() -> Self {
        Self {
            tools: Some(ListCapabilities::default()),
            prompts: Some(ListCapabilities::default()),
        }
    }
}

/// Capabilities of a listable feature (tools, prompts).
#[derive(Debug, Clone, Default, Serialize)]
pub struct ListCapabilities {
    /// Whether the list can change during the session.
    #[serde(rename = "listChanged", skip_serializing_if = "is_false")]
    pub list_changed: bool,
}

#[allow(clippy::trivially_copy_pass_by_ref)] // serde's skip_serializing_if requires fn(&T) -> bool
const fn is_false(b: &bool) -> bool {
    !*b
}

/// Server information for initialisation response.
#[derive(Debug, Clone, Serialize)]
pub struct ServerInfo {
    /// Server name.
    pub name: String,
    /// Server version.
    pub version: String,
}

impl Default for ServerInfo {
    fn default() -> Self {
        Self {
            name: SERVER_NAME.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// Client information received during initialisation.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientInfo {
    /// Client name.
    pub name: String,
    /// Client version.
    #[serde(default)]
    pub version: Option<String>,
}

/// Parameters for the initialize request.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeParams {
    /// Protocol version requested by client.
    #[serde(default)]
    pub protocol_version: Option<String>,
    /// Client capabilities.
    #[serde(default)]
    pub capabilities: Value,
    /// Client information.
    #[serde(default)]
    pub client_info: Option<ClientInfo>,
}

/// A tool definition for tools/list response.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolDefinition {
    /// Unique tool name.
    pub name: String,
    /// Human-readable description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// JSON Schema for the tool's input parameters.
    pub input_schema: Value,
}

/// Parameters for tools/call request.
#[derive(Debug, Clone, Deserialize)]
pub struct ToolCallParams {
    /// Name of the tool to call.
    pub name: String,
    /// Arguments for the tool.
    #[serde(default)]
    pub arguments: Value,
}

/// Parameters for prompts/get request.
#[derive(Debug, Clone, Deserialize)]
pub struct PromptGetParams {
    /// Name of the prompt.
    pub name: String,
}

/// Content item in a tool call response.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ToolContent {
    /// Text content.
    Text {
        /// The text content.
        text: String,
    },
    /// Base64-encoded image.
    Image {
        /// Image bytes, base64 encoded.
        data: String,
        /// MIME type of the image.
        #[serde(rename = "mimeType")]
        mime_type: String,
    },
}

/// Result of a tool call.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolCallResult {
    /// Content returned by the tool.
    pub content: Vec<ToolContent>,
    /// Whether the tool call resulted in an error.
    #[serde(skip_serializing_if = "is_false")]
    pub is_error: bool,
}

impl ToolCallResult {
    /// Creates a successful text result.
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            content: vec![ToolContent::Text { text: text.into() }],
            is_error: false,
        }
    }

    /// Creates an error text result.
    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            content: vec![ToolContent::Text {
                text: message.into(),
            }],
            is_error: true,
        }
    }
}

/// The MCP server.
#[derive(Debug)]
pub struct McpServer {
    /// Current server state.
    state: ServerState,
    /// Negotiated protocol version (set after initialisation).
    protocol_version: Option<String>,
    /// Tool and job handling.
    dispatcher: ToolDispatcher,
}

impl McpServer {
    /// Creates a new MCP server around a tool dispatcher.
    #[must_use]
    pub const fn new(dispatcher: ToolDispatcher) -> Self {
        Self {
            state: ServerState::AwaitingInit,
            protocol_version: None,
            dispatcher,
        }
    }

    /// Returns the current server state.
    #[must_use]
    pub const fn state(&self) -> ServerState {
        self.state
    }

    /// Returns the tool dispatcher.
    #[must_use]
    pub const fn dispatcher(&self) -> &ToolDispatcher {
        &self.dispatcher
    }

    /// Runs the server over `transport` until stdin closes or a termination
    /// signal arrives.
    ///
    /// # Errors
    ///
    /// Returns an error if the transport fails irrecoverably.
    #[cfg(unix)]
    pub async fn run<R, W>(&mut self, mut transport: StdioTransport<R, W>) -> Result<(), TransportError>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigint = signal(SignalKind::interrupt())?;
        let mut sigterm = signal(SignalKind::terminate())?;

        let result = tokio::select! {
            _ = sigint.recv() => {
                tracing::info!("Received SIGINT, initiating graceful shutdown");
                Ok(())
            }

            _ = sigterm.recv() => {
                tracing::info!("Received SIGTERM, initiating graceful shutdown");
                Ok(())
            }

            result = self.serve(&mut transport) => result,
        };

        self.shutdown().await;
        result
    }

    /// Runs the server over `transport` until stdin closes or Ctrl+C.
    ///
    /// # Errors
    ///
    /// Returns an error if the transport fails irrecoverably.
    #[cfg(windows)]
    pub async fn run<R, W>(&mut self, mut transport: StdioTransport<R, W>) -> Result<(), TransportError>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let result = tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Received Ctrl+C, initiating graceful shutdown");
                Ok(())
            }

            result = self.serve(&mut transport) => result,
        };

        self.shutdown().await;
        result
    }

    /// Reads, handles and answers messages until EOF.
    ///
    /// Lines that are not valid UTF-8 are logged and skipped.
    ///
    /// # Errors
    ///
    /// Returns an error if reading stdin or writing stdout fails.
    pub async fn serve<R, W>(&mut self, transport: &mut StdioTransport<R, W>) -> Result<(), TransportError>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        loop {
            let line = match transport.read_message().await {
                Ok(Some(line)) => line,
                Ok(None) => {
                    tracing::info!("stdin closed");
                    self.state = ServerState::ShuttingDown;
                    return Ok(());
                }
                Err(e) if !e.is_fatal() => {
                    tracing::warn!(error = %e, "Dropping malformed input line");
                    continue;
                }
                Err(e) => return Err(e),
            };

            if let Some(response) = self.handle_line(&line).await {
                transport.write_line(&response).await?;
            }
        }
    }

    /// Handles one input line, returning the serialised response if one is owed.
    ///
    /// Notifications, client responses, blank lines and unparseable lines
    /// without a recoverable id produce no output.
    pub async fn handle_line(&mut self, line: &str) -> Option<String> {
        if line.trim().is_empty() {
            return None;
        }

        match parse_message(line) {
            Ok(IncomingMessage::Request(req)) => {
                let response = self.handle_request(req).await;
                Some(response)
            }
            Ok(IncomingMessage::Notification(notif)) => {
                self.handle_notification(&notif);
                None
            }
            Ok(IncomingMessage::Response(id)) => {
                tracing::debug!(id = ?id, "Ignoring response from client");
                None
            }
            Err(error) if error.id.is_some() => {
                tracing::debug!(code = error.error.code, message = %error.error.message, "Rejecting message");
                Some(serialise_error(&error))
            }
            Err(error) => {
                tracing::warn!(code = error.error.code, message = %error.error.message, "Dropping message without id");
                None
            }
        }
    }

    /// Disconnects from Blender.
    pub async fn shutdown(&mut self) {
        self.state = ServerState::ShuttingDown;
        self.dispatcher.proxy().disconnect().await;
    }

    /// Handles an incoming request, always producing one response line.
    async fn handle_request(&mut self, req: JsonRpcRequest) -> String {
        if self.state == ServerState::AwaitingInit && req.method != "initialize" {
            tracing::debug!(method = %req.method, "Request before initialisation");
        }

        let response = match req.method.as_str() {
            "initialize" => self.handle_initialize(&req),
            "ping" => Ok(Self::handle_ping(&req)),
            "tools/list" => Ok(self.handle_tools_list(&req)),
            "tools/call" => self.handle_tools_call(&req).await,
            "prompts/list" => Ok(Self::handle_prompts_list(&req)),
            "prompts/get" => Self::handle_prompts_get(&req),
            _ => Err(JsonRpcError::method_not_found(req.id.clone(), &req.method)),
        };

        match response {
            Ok(resp) => serde_json::to_string(&resp).unwrap_or_else(|e| {
                tracing::error!(error = %e, "Failed to serialise response");
                serialise_error(&JsonRpcError::internal_error(
                    req.id.clone(),
                    "Internal error: failed to serialise result",
                ))
            }),
            Err(error) => serialise_error(&error),
        }
    }

    /// Handles an incoming notification.
    fn handle_notification(&mut self, notif: &JsonRpcNotification) {
        match notif.method.as_str() {
            "notifications/initialized" if self.state == ServerState::Initialising => {
                tracing::info!("Client initialised");
                self.state = ServerState::Running;
            }
            method => tracing::debug!(method, "Notification ignored"),
        }
    }

    /// Handles the initialize request.
    fn handle_initialize(&mut self, req: &JsonRpcRequest) -> Result<JsonRpcResponse, JsonRpcError> {
        if self.state != ServerState::AwaitingInit {
            return Err(JsonRpcError::new(
                Some(req.id.clone()),
                JsonRpcErrorData::with_message(
                    ErrorCode::InvalidRequest,
                    "Server already initialised",
                ),
            ));
        }

        let params: InitializeParams = parse_params(req, "initialize")?.unwrap_or_default();

        tracing::info!(
            client = params.client_info.as_ref().map_or("unknown", |c| c.name.as_str()),
            client_version = params.client_info.as_ref().and_then(|c| c.version.as_deref()),
            requested_version = params.protocol_version.as_deref(),
            "Initialising session"
        );

        let negotiated_version = MCP_PROTOCOL_VERSION.to_string();

        self.protocol_version = Some(negotiated_version.clone());
        self.state = ServerState::Initialising;

        let result = json!({
            "protocolVersion": negotiated_version,
            "capabilities": ServerCapabilities::default(),
            "serverInfo": ServerInfo::default(),
        });

        Ok(JsonRpcResponse::success(req.id.clone(), result))
    }

    /// Handles the tools/list request.
    fn handle_tools_list(&self, req: &JsonRpcRequest) -> JsonRpcResponse {
        let tools: Vec<_> = self.dispatcher.registry().definitions().collect();
        JsonRpcResponse::success(req.id.clone(), json!({ "tools": tools }))
    }

    /// Handles the tools/call request.
    async fn handle_tools_call(
        &mut self,
        req: &JsonRpcRequest,
    ) -> Result<JsonRpcResponse, JsonRpcError> {
        let params: ToolCallParams = parse_params(req, "tool call")?.ok_or_else(|| {
            JsonRpcError::invalid_params(req.id.clone(), "Missing tool call params")
        })?;

        let result = match self.dispatcher.call(&params.name, params.arguments).await {
            Ok(result) => result,
            Err(e) if e.is_invalid_params() => {
                return Err(JsonRpcError::invalid_params(req.id.clone(), e.to_string()));
            }
            Err(e) => {
                tracing::warn!(tool = %params.name, error = %e, "Tool call failed");
                ToolCallResult::error(format!("Error: {e}"))
            }
        };

        let result_value = serde_json::to_value(&result).map_err(|e| {
            tracing::error!(error = %e, "Failed to serialise tool call result");
            JsonRpcError::internal_error(
                req.id.clone(),
                "Internal error: failed to serialise result",
            )
        })?;

        Ok(JsonRpcResponse::success(req.id.clone(), result_value))
    }

    /// Handles the ping request.
    fn handle_ping(req: &JsonRpcRequest) -> JsonRpcResponse {
        JsonRpcResponse::success(req.id.clone(), json!({}))
    }

    /// Handles the prompts/list request.
    fn handle_prompts_list(req: &JsonRpcRequest) -> JsonRpcResponse {
        JsonRpcResponse::success(
            req.id.clone(),
            json!({ "prompts": prompts::prompt_definitions() }),
        )
    }

    /// Handles the prompts/get request.
    fn handle_prompts_get(req: &JsonRpcRequest) -> Result<JsonRpcResponse, JsonRpcError> {
        let params: PromptGetParams = parse_params(req, "prompt")?.ok_or_else(|| {
            JsonRpcError::invalid_params(req.id.clone(), "Missing prompt params")
        })?;

        let prompt = prompts::get_prompt(&params.name).ok_or_else(|| {
            JsonRpcError::invalid_params(req.id.clone(), format!("Unknown prompt: {}", params.name))
        })?;

        Ok(JsonRpcResponse::success(req.id.clone(), prompt))
    }
}

/// Deserialises request params, `None` if absent.
fn parse_params<T: serde::de::DeserializeOwned>(
    req: &JsonRpcRequest,
    what: &str,
) -> Result<Option<T>, JsonRpcError> {
    req.params
        .as_ref()
        .map(|p| serde_json::from_value(p.clone()))
        .transpose()
        .map_err(|e| JsonRpcError::invalid_params(req.id.clone(), format!("Invalid {what} params: {e}")))
}

fn serialise_error(error: &JsonRpcError) -> String {
    serde_json::to_string(error).unwrap_or_else(|e| {
        tracing::error!(error = %e, "Failed to serialise error response");
        String::from(
            r#"{"jsonrpc":"2.0","error":{"code":-32603,"message":"Internal error"}}"#,
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use crate::blender::BlenderProxy;
    use crate::config::JobsConfig;
    use crate::jobs::JobTracker;

    fn server() -> McpServer {
        let proxy = BlenderProxy::new("127.0.0.1", 1, Duration::from_secs(1));
        McpServer::new(ToolDispatcher::new(
            proxy,
            JobTracker::new(&JobsConfig::default()),
        ))
    }

    async fn request(server: &mut McpServer, line: &str) -> Value {
        let response = server.handle_line(line).await.expect("expected a response");
        serde_json::from_str(&response).unwrap()
    }

    #[tokio::test]
    async fn initialize_then_initialized_reaches_running() {
        let mut server = server();
        assert_eq!(server.state(), ServerState::AwaitingInit);

        let response = request(
            &mut server,
            r#"{"jsonrpc":"2.0","id":1,"method":"initialize","params":{"protocolVersion":"2024-11-05","capabilities":{},"clientInfo":{"name":"test"}}}"#,
        )
        .await;
        assert_eq!(response["result"]["protocolVersion"], MCP_PROTOCOL_VERSION);
        assert!(response["result"]["capabilities"]["tools"].is_object());
        assert!(response["result"]["capabilities"]["prompts"].is_object());
        assert_eq!(response["result"]["serverInfo"]["name"], SERVER_NAME);
        assert_eq!(server.state(), ServerState::Initialising);

        let none = server
            .handle_line(r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#)
            .await;
        assert!(none.is_none());
        assert_eq!(server.state(), ServerState::Running);
    }

    #[tokio::test]
    async fn second_initialize_is_rejected() {
        let mut server = server();
        let init = r#"{"jsonrpc":"2.0","id":1,"method":"initialize","params":{}}"#;
        request(&mut server, init).await;
        let response = request(&mut server, init).await;
        assert_eq!(response["error"]["code"], -32600);
    }

    #[tokio::test]
    async fn requests_are_served_before_initialisation() {
        let mut server = server();
        let response = request(&mut server, r#"{"id":1,"method":"tools/list"}"#).await;
        assert_eq!(response["result"]["tools"].as_array().unwrap().len(), 21);
    }

    #[tokio::test]
    async fn unknown_method_is_method_not_found() {
        let mut server = server();
        let response = request(&mut server, r#"{"jsonrpc":"2.0","id":"x","method":"resources/list"}"#).await;
        assert_eq!(response["id"], "x");
        assert_eq!(response["error"]["code"], -32601);
    }

    #[tokio::test]
    async fn notifications_and_blank_lines_get_no_response() {
        let mut server = server();
        assert!(server.handle_line("").await.is_none());
        assert!(server.handle_line("   \r").await.is_none());
        assert!(server
            .handle_line(r#"{"jsonrpc":"2.0","id":null,"method":"ping"}"#)
            .await
            .is_none());
    }

    #[tokio::test]
    async fn garbage_without_id_is_dropped() {
        let mut server = server();
        assert!(server.handle_line("{{{{").await.is_none());

        let response = request(&mut server, r#"{"id": 9, "method": "ping""#).await;
        assert_eq!(response["id"], 9);
        assert_eq!(response["error"]["code"], -32700);
    }

    #[tokio::test]
    async fn unknown_prompt_is_invalid_params() {
        let mut server = server();
        let response = request(
            &mut server,
            r#"{"id":3,"method":"prompts/get","params":{"name":"nope"}}"#,
        )
        .await;
        assert_eq!(response["error"]["code"], -32602);
    }

    #[tokio::test]
    async fn tool_failure_is_an_error_result() {
        let mut server = server();
        let response = request(
            &mut server,
            r#"{"id":4,"method":"tools/call","params":{"name":"get_scene_info","arguments":{}}}"#,
        )
        .await;
        assert!(response.get("error").is_none());
        assert_eq!(response["result"]["isError"], true);
        assert_eq!(response["result"]["content"][0]["type"], "text");
    }

    #[tokio::test]
    async fn bad_arguments_are_invalid_params() {
        let mut server = server();
        let response = request(
            &mut server,
            r#"{"id":5,"method":"tools/call","params":{"name":"get_object_info","arguments":{}}}"#,
        )
        .await;
        assert_eq!(response["error"]["code"], -32602);
        assert!(response["error"]["message"]
            .as_str()
            .unwrap()
            .contains("object_name"));
    }

    #[test]
    fn image_content_serialises_with_mime_type() {
        let content = ToolContent::Image {
            data: "AAAA".to_string(),
            mime_type: "image/png".to_string(),
        };
        let json = serde_json::to_value(&content).unwrap();
        assert_eq!(json, json!({"type": "image", "data": "AAAA", "mimeType": "image/png"}));
    }

    #[test]
    fn error_result_sets_is_error() {
        let json = serde_json::to_value(ToolCallResult::error("boom")).unwrap();
        assert_eq!(json["isError"], true);
        let json = serde_json::to_value(ToolCallResult::text("ok")).unwrap();
        assert!(json.get("isError").is_none());
    }
}
