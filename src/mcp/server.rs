//! MCP server for the Kalshi tool and resource set.
//!
//! This module implements the MCP server lifecycle:
//!
//! 1. **Initialisation**: `initialize` negotiates the protocol version, the
//!    `notifications/initialized` notification unlocks tools and resources
//! 2. **Operation**: Handling tool calls and resource reads
//! 3. **Shutdown**: End of input or a termination signal
//!
//! Each input line yields at most one output line. Batches are answered with
//! an array of the replies to their requests, or not at all if the batch held
//! only notifications and client responses.

use std::io;
use std::sync::Arc;

use serde::Serialize;
use serde_json::{json, Map, Value};
use tokio::io::{AsyncBufRead, AsyncWrite};

use crate::mcp::protocol::{
    classify, parse_line, IncomingMessage, JsonRpcError, JsonRpcNotification, JsonRpcReply,
    JsonRpcRequest, JsonRpcResponse, Outbound, RequestId, DEFAULT_PROTOCOL_VERSION, SERVER_NAME,
};
use crate::mcp::resources::ResourceRouter;
use crate::mcp::transport::{LineTransport, StdioTransport};
use crate::tools::ToolRegistry;

/// Text returned for tool and resource calls made before the handshake.
pub const NOT_INITIALIZED: &str =
    "Server is not initialized. Send initialize and notifications/initialized first.";

/// Server capabilities advertised during initialisation.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ServerCapabilities {
    /// Tool-related capabilities.
    pub tools: ToolCapabilities,
    /// Resource-related capabilities; present only when resources are served.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resources: Option<ResourceCapabilities>,
}

/// Tool-specific capabilities.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ToolCapabilities {
    /// Whether the tool list can change during the session.
    #[serde(rename = "listChanged")]
    pub list_changed: bool,
}

/// Resource-specific capabilities.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceCapabilities {
    /// Whether clients may subscribe to resource updates.
    pub subscribe: bool,
    /// Whether the resource list can change during the session.
    pub list_changed: bool,
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

/// Content item in a tool call response.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ToolContent {
    /// Text content.
    Text {
        /// The text content.
        text: String,
    },
}

/// Result of a tool call.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolCallResult {
    /// Content returned by the tool.
    pub content: Vec<ToolContent>,
    /// The tool's JSON output, on success.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub structured_content: Option<Map<String, Value>>,
    /// Whether the tool call resulted in an error.
    pub is_error: bool,
}

impl ToolCallResult {
    /// Creates a successful result carrying `output` both as compact JSON
    /// text and as structured content.
    #[must_use]
    pub fn structured(output: Map<String, Value>) -> Self {
        let text = serde_json::to_string(&output).unwrap_or_default();
        Self {
            content: vec![ToolContent::Text { text }],
            structured_content: Some(output),
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
            structured_content: None,
            is_error: true,
        }
    }
}

/// The MCP server.
pub struct McpServer {
    /// Tools served by `tools/list` and `tools/call`.
    tools: Arc<dyn ToolRegistry>,
    /// Resources, if enabled.
    resources: Option<ResourceRouter>,
    /// Set by `notifications/initialized`.
    initialized: bool,
    /// Protocol version returned by the last `initialize`.
    protocol_version: Option<String>,
}

impl std::fmt::Debug for McpServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("McpServer")
            .field("resources", &self.resources.is_some())
            .field("initialized", &self.initialized)
            .field("protocol_version", &self.protocol_version)
            .finish_non_exhaustive()
    }
}

impl McpServer {
    /// Creates a server exposing `tools` and no resources.
    #[must_use]
    pub fn new(tools: Arc<dyn ToolRegistry>) -> Self {
        Self {
            tools,
            resources: None,
            initialized: false,
            protocol_version: None,
        }
    }

    /// Enables the `resources/*` methods.
    #[must_use]
    pub fn with_resources(mut self, resources: ResourceRouter) -> Self {
        self.resources = Some(resources);
        self
    }

    /// Returns whether the client has completed the handshake.
    #[must_use]
    pub const fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Returns the protocol version agreed by the last `initialize`.
    #[must_use]
    pub fn protocol_version(&self) -> Option<&str> {
        self.protocol_version.as_deref()
    }

    /// Runs the server on stdin/stdout until EOF or a termination signal.
    ///
    /// # Errors
    ///
    /// Returns an error if transport I/O fails.
    pub async fn run(&mut self) -> io::Result<()> {
        let mut transport = StdioTransport::stdio();
        self.run_with_shutdown(&mut transport).await
    }

    /// Serves `transport` until its input is closed.
    ///
    /// # Errors
    ///
    /// Returns an error if reading or writing fails.
    pub async fn serve<R, W>(&mut self, transport: &mut LineTransport<R, W>) -> io::Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        while let Some(line) = transport.read_line().await? {
            self.respond(transport, &line).await?;
        }
        tracing::info!("Input closed, shutting down");
        Ok(())
    }

    /// Runs the main loop and handles shutdown.
    #[cfg(unix)]
    async fn run_with_shutdown(&mut self, transport: &mut StdioTransport) -> io::Result<()> {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigint = signal(SignalKind::interrupt()).map_err(io::Error::other)?;
        let mut sigterm = signal(SignalKind::terminate()).map_err(io::Error::other)?;

        loop {
            tokio::select! {
                _ = sigint.recv() => {
                    tracing::info!("Received SIGINT, initiating graceful shutdown");
                    return Ok(());
                }

                _ = sigterm.recv() => {
                    tracing::info!("Received SIGTERM, initiating graceful shutdown");
                    return Ok(());
                }

                line = transport.read_line() => {
                    let Some(line) = line? else {
                        tracing::info!("Input closed, shutting down");
                        return Ok(());
                    };
                    self.respond(transport, &line).await?;
                }
            }
        }
    }

    /// Runs the main loop and handles shutdown.
    #[cfg(windows)]
    async fn run_with_shutdown(&mut self, transport: &mut StdioTransport) -> io::Result<()> {
        let ctrl_c = tokio::signal::ctrl_c();
        tokio::pin!(ctrl_c);

        loop {
            tokio::select! {
                _ = &mut ctrl_c => {
                    tracing::info!("Received Ctrl+C, initiating graceful shutdown");
                    return Ok(());
                }

                line = transport.read_line() => {
                    let Some(line) = line? else {
                        tracing::info!("Input closed, shutting down");
                        return Ok(());
                    };
                    self.respond(transport, &line).await?;
                }
            }
        }
    }

    async fn respond<R, W>(&mut self, transport: &mut LineTransport<R, W>, line: &[u8]) -> io::Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        if let Some(outbound) = self.handle_bytes(line).await {
            transport.write_message(&outbound).await?;
        }
        Ok(())
    }

    /// Handles one raw input line; bytes that are not UTF-8 get a parse error.
    pub async fn handle_bytes(&mut self, line: &[u8]) -> Option<Outbound> {
        match std::str::from_utf8(line) {
            Ok(line) => self.handle_line(line).await,
            Err(e) => {
                tracing::debug!(error = %e, "Discarding line that is not UTF-8");
                Some(Outbound::Single(JsonRpcError::parse_error().into()))
            }
        }
    }

    /// Handles one input line and returns what should be written for it.
    ///
    /// Blank lines, notifications, client responses and batches without
    /// requests produce nothing.
    pub async fn handle_line(&mut self, line: &str) -> Option<Outbound> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }

        let value = match parse_line(line) {
            Ok(value) => value,
            Err(error) => {
                tracing::debug!("Discarding unparseable line");
                return Some(Outbound::Single(error.into()));
            }
        };

        match value {
            Value::Array(items) => {
                if items.is_empty() {
                    return Some(Outbound::Single(JsonRpcError::invalid_request(None).into()));
                }
                let mut replies = Vec::with_capacity(items.len());
                for item in items {
                    if let Some(reply) = self.handle_value(item).await {
                        replies.push(reply);
                    }
                }
                (!replies.is_empty()).then_some(Outbound::Batch(replies))
            }
            single => self.handle_value(single).await.map(Outbound::Single),
        }
    }

    /// Handles one message (a whole line or one batch element).
    async fn handle_value(&mut self, value: Value) -> Option<JsonRpcReply> {
        match classify(value) {
            Ok(IncomingMessage::Request(req)) => Some(self.handle_request(req).await),
            Ok(IncomingMessage::Notification(ref notif)) => {
                self.handle_notification(notif);
                None
            }
            Ok(IncomingMessage::ClientResponse) => {
                tracing::debug!("Ignoring client response");
                None
            }
            Err(error) => Some(error.into()),
        }
    }

    /// Handles an incoming request.
    async fn handle_request(&mut self, req: JsonRpcRequest) -> JsonRpcReply {
        tracing::debug!(method = %req.method, id = %req.id, "Handling request");

        let result = match req.method.as_str() {
            "initialize" => self.handle_initialize(&req),
            "ping" => Ok(json!({})),
            "tools/list" => Ok(json!({ "tools": self.tools.list_tools() })),
            "tools/call" => self.handle_tools_call(&req).await,
            "resources/list" => self
                .require_resources(&req.id)
                .map(|router| json!({ "resources": router.list_resources() })),
            "resources/templates/list" => self
                .require_resources(&req.id)
                .map(|router| json!({ "resourceTemplates": router.list_templates() })),
            "resources/read" => self.handle_resources_read(&req).await,
            _ => Err(JsonRpcError::method_not_found(req.id.clone())),
        };

        match result {
            Ok(value) => JsonRpcResponse::success(req.id, value).into(),
            Err(error) => error.into(),
        }
    }

    /// Handles an incoming notification.
    fn handle_notification(&mut self, notif: &JsonRpcNotification) {
        if notif.method == "notifications/initialized" {
            tracing::info!("Client initialised");
            self.initialized = true;
        } else {
            tracing::debug!(method = %notif.method, "Ignoring notification");
        }
    }

    /// Handles the initialize request.
    fn handle_initialize(&mut self, req: &JsonRpcRequest) -> Result<Value, JsonRpcError> {
        let Some(Value::Object(params)) = &req.params else {
            return Err(JsonRpcError::invalid_params(
                req.id.clone(),
                "Invalid params for initialize",
            ));
        };

        let protocol_version = params
            .get("protocolVersion")
            .and_then(Value::as_str)
            .filter(|version| !version.is_empty())
            .unwrap_or(DEFAULT_PROTOCOL_VERSION)
            .to_string();

        let client = params
            .get("clientInfo")
            .and_then(|info| info.get("name"))
            .and_then(Value::as_str)
            .unwrap_or("unknown");
        tracing::info!(%protocol_version, client, "Initialize received");

        let capabilities = ServerCapabilities {
            tools: ToolCapabilities::default(),
            resources: self
                .resources
                .as_ref()
                .map(|_| ResourceCapabilities::default()),
        };

        self.protocol_version = Some(protocol_version.clone());

        Ok(json!({
            "protocolVersion": protocol_version,
            "capabilities": capabilities,
            "serverInfo": ServerInfo::default(),
        }))
    }

    /// Handles the tools/call request.
    async fn handle_tools_call(&self, req: &JsonRpcRequest) -> Result<Value, JsonRpcError> {
        let Some(Value::Object(params)) = &req.params else {
            return Err(JsonRpcError::invalid_params(
                req.id.clone(),
                "Invalid params for tools/call",
            ));
        };

        let name = match params.get("name") {
            Some(Value::String(name)) if !name.is_empty() => name,
            _ => return Err(JsonRpcError::invalid_params(req.id.clone(), "Missing tool name")),
        };

        let arguments = match params.get("arguments") {
            None | Some(Value::Null) => None,
            Some(Value::Object(arguments)) => Some(arguments),
            Some(_) => {
                return Err(JsonRpcError::invalid_params(
                    req.id.clone(),
                    "Tool arguments must be an object",
                ))
            }
        };

        let result = if self.initialized {
            match self.tools.call_tool(name, arguments).await {
                Ok(output) => ToolCallResult::structured(output),
                Err(e) => {
                    tracing::warn!(tool = %name, error = %e, "Tool call failed");
                    ToolCallResult::error(e.to_string())
                }
            }
        } else {
            ToolCallResult::error(NOT_INITIALIZED)
        };

        serde_json::to_value(&result).map_err(|e| {
            tracing::error!(error = %e, "Failed to serialise tool call result");
            JsonRpcError::internal_detail(req.id.clone(), e.to_string())
        })
    }

    /// Handles the resources/read request.
    async fn handle_resources_read(&self, req: &JsonRpcRequest) -> Result<Value, JsonRpcError> {
        let router = self.require_resources(&req.id)?;

        let Some(Value::Object(params)) = &req.params else {
            return Err(JsonRpcError::invalid_params(
                req.id.clone(),
                "Invalid params for resources/read",
            ));
        };

        let uri = match params.get("uri") {
            Some(Value::String(uri)) if !uri.is_empty() => uri,
            _ => {
                return Err(JsonRpcError::invalid_params(
                    req.id.clone(),
                    "Missing resource uri",
                ))
            }
        };

        router.read(uri).await.map_err(|e| {
            if let Some(upstream) = e.upstream() {
                tracing::warn!(%uri, error = %upstream, "Resource read failed upstream");
                JsonRpcError::internal_detail(req.id.clone(), upstream.to_string())
            } else {
                JsonRpcError::invalid_params(req.id.clone(), e.to_string())
            }
        })
    }

    /// Returns the resource router once the handshake is complete.
    fn require_resources(&self, id: &RequestId) -> Result<&ResourceRouter, JsonRpcError> {
        let Some(router) = &self.resources else {
            return Err(JsonRpcError::method_not_found(id.clone()));
        };
        if !self.initialized {
            return Err(JsonRpcError::internal_error(id.clone(), NOT_INITIALIZED));
        }
        Ok(router)
    }
}
