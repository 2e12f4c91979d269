// crates/fabric-mcp/src/server.rs
// ============================================================================
// Module: MCP Server
// Description: MCP server implementations for stdio and HTTP transports.
// Purpose: Expose the Power BI and Fabric tools via JSON-RPC 2.0.
// Dependencies: axum, tokio, serde, serde_json
// ============================================================================

//! ## Overview
//! The server exposes the tool surface using JSON-RPC 2.0 over a framed stdio
//! loop or an `axum` HTTP endpoint. Protocol-level problems (bad version,
//! unknown method, malformed params) get JSON-RPC error objects; tool-level
//! failures always come back as a well-formed result envelope with
//! `isError: true`. Inputs are untrusted and validated before dispatch.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::io::BufRead;
use std::io::BufReader;
use std::io::Read;
use std::io::Write;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::post;
use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

use crate::audit::StderrAuditSink;
use crate::auth::AuthService;
use crate::config::FabricMcpConfig;
use crate::config::ServerTransport;
use crate::contract::ToolDefinition;
use crate::contract::ToolResult;
use crate::fabric::FabricClient;
use crate::powerbi::PowerBiClient;
use crate::tools::ToolRouter;

// ============================================================================
// SECTION: MCP Server
// ============================================================================

/// MCP server instance.
pub struct McpServer {
    /// Server configuration.
    config: FabricMcpConfig,
    /// Tool router for request dispatch.
    router: Arc<ToolRouter>,
}

impl McpServer {
    /// Builds a new MCP server from configuration.
    ///
    /// Configuration problems, including absent credentials, fail here before
    /// any request is served.
    ///
    /// # Errors
    ///
    /// Returns [`McpServerError`] when initialization fails.
    pub fn from_config(config: FabricMcpConfig) -> Result<Self, McpServerError> {
        config.validate().map_err(|err| McpServerError::Config(err.to_string()))?;
        let auth = Arc::new(
            AuthService::from_config(&config)
                .map_err(|err| McpServerError::Config(err.to_string()))?,
        );
        let powerbi = PowerBiClient::from_config(&config, Arc::clone(&auth))
            .map_err(|err| McpServerError::Init(err.to_string()))?;
        let fabric = FabricClient::from_config(&config, Arc::clone(&auth))
            .map_err(|err| McpServerError::Init(err.to_string()))?;
        let router = ToolRouter::new(Arc::new(powerbi), Arc::new(fabric), Arc::new(StderrAuditSink))
            .map_err(|err| McpServerError::Init(err.to_string()))?;
        emit_startup_diagnostics(&config);
        Ok(Self {
            config,
            router: Arc::new(router),
        })
    }

    /// Serves requests using the configured transport.
    ///
    /// # Errors
    ///
    /// Returns [`McpServerError`] when the transport fails.
    pub async fn serve(self) -> Result<(), McpServerError> {
        let transport = self.config.server.transport;
        let max_body_bytes = self.config.server.max_body_bytes;
        match transport {
            ServerTransport::Stdio => serve_stdio(&self.router, max_body_bytes),
            ServerTransport::Http => serve_http(self.config, self.router).await,
        }
    }
}

/// Logs configured workspace context to stderr at startup.
fn emit_startup_diagnostics(config: &FabricMcpConfig) {
    let mut stderr = std::io::stderr();
    let _ = writeln!(stderr, "fabric-mcp: server starting");
    if let Some(name) = &config.powerbi.workspace_name {
        let _ = writeln!(stderr, "fabric-mcp: workspace: {name}");
    }
    if let Some(endpoint) = &config.powerbi.xmla_endpoint {
        let _ = writeln!(stderr, "fabric-mcp: xmla endpoint: {endpoint}");
    }
}

// ============================================================================
// SECTION: Stdio Transport
// ============================================================================

/// Serves JSON-RPC requests over stdin/stdout until stdin closes.
///
/// Dispatch goes through the blocking guard: the loop runs inside the CLI's
/// async runtime and tool handlers use blocking HTTP clients.
fn serve_stdio(router: &ToolRouter, max_body_bytes: usize) -> Result<(), McpServerError> {
    let mut reader = BufReader::new(std::io::stdin());
    let mut writer = std::io::stdout();
    loop {
        let Some(bytes) = read_framed(&mut reader, max_body_bytes)? else {
            return Ok(());
        };
        let response = match serde_json::from_slice::<JsonRpcRequest>(&bytes) {
            Ok(request) => handle_request_blocking(router, request),
            Err(_) => protocol_error(Value::Null, -32600, "invalid json-rpc request"),
        };
        let payload = serde_json::to_vec(&response.1)
            .map_err(|_| McpServerError::Transport("json-rpc serialization failed".to_string()))?;
        write_framed(&mut writer, &payload)?;
    }
}

// ============================================================================
// SECTION: HTTP Transport
// ============================================================================

/// Serves JSON-RPC requests over HTTP.
async fn serve_http(
    config: FabricMcpConfig,
    router: Arc<ToolRouter>,
) -> Result<(), McpServerError> {
    let bind = config
        .server
        .bind
        .as_ref()
        .ok_or_else(|| McpServerError::Config("bind address required".to_string()))?;
    let addr: SocketAddr =
        bind.parse().map_err(|_| McpServerError::Config("invalid bind address".to_string()))?;
    let state = Arc::new(ServerState {
        router,
        max_body_bytes: config.server.max_body_bytes,
    });
    let app = Router::new().route("/rpc", post(handle_http)).with_state(state);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|_| McpServerError::Transport("http bind failed".to_string()))?;
    axum::serve(listener, app)
        .await
        .map_err(|_| McpServerError::Transport("http server failed".to_string()))
}

/// Shared server state for HTTP handlers.
#[derive(Clone)]
struct ServerState {
    /// Tool router for request dispatch.
    router: Arc<ToolRouter>,
    /// Maximum allowed request body size.
    max_body_bytes: usize,
}

/// Handles HTTP JSON-RPC requests.
async fn handle_http(State(state): State<Arc<ServerState>>, bytes: Bytes) -> impl IntoResponse {
    let response = parse_request(&state, &bytes);
    (response.0, axum::Json(response.1))
}

/// Parses and validates a JSON-RPC request payload.
fn parse_request(state: &ServerState, bytes: &Bytes) -> (StatusCode, JsonRpcResponse) {
    if bytes.len() > state.max_body_bytes {
        return protocol_error_with_status(
            StatusCode::PAYLOAD_TOO_LARGE,
            Value::Null,
            -32070,
            "request body too large",
        );
    }
    match serde_json::from_slice::<JsonRpcRequest>(bytes.as_ref()) {
        Ok(request) => handle_request_blocking(&state.router, request),
        Err(_) => protocol_error(Value::Null, -32600, "invalid json-rpc request"),
    }
}

// ============================================================================
// SECTION: JSON-RPC Handling
// ============================================================================

/// Dispatches a request, shifting to a blocking context when available.
///
/// Tool handlers use blocking HTTP clients; inside a multi-thread runtime the
/// call must move off the async worker. Both transports dispatch through this
/// guard.
fn handle_request_blocking(
    router: &ToolRouter,
    request: JsonRpcRequest,
) -> (StatusCode, JsonRpcResponse) {
    match tokio::runtime::Handle::try_current() {
        Ok(handle) if handle.runtime_flavor() == tokio::runtime::RuntimeFlavor::MultiThread => {
            tokio::task::block_in_place(|| handle_request(router, request))
        }
        _ => handle_request(router, request),
    }
}

/// Incoming JSON-RPC request payload.
#[derive(Debug, Deserialize)]
struct JsonRpcRequest {
    /// JSON-RPC protocol version.
    jsonrpc: String,
    /// Request identifier.
    id: Value,
    /// Method name.
    method: String,
    /// Optional parameters payload.
    params: Option<Value>,
}

/// JSON-RPC response envelope.
#[derive(Debug, Serialize)]
pub struct JsonRpcResponse {
    /// JSON-RPC protocol version.
    jsonrpc: &'static str,
    /// Request identifier.
    id: Value,
    /// Successful result payload.
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<Value>,
    /// Error payload when the request fails.
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<JsonRpcError>,
}

/// JSON-RPC error payload.
#[derive(Debug, Serialize)]
struct JsonRpcError {
    /// Error code.
    code: i64,
    /// Human-readable error message.
    message: String,
}

/// Tool call parameters for JSON-RPC requests.
#[derive(Debug, Deserialize)]
struct ToolCallParams {
    /// Tool name.
    name: String,
    /// Raw JSON arguments. Omitted arguments decode as an empty object.
    #[serde(default = "default_arguments")]
    arguments: Value,
}

/// Default arguments payload when a call omits them.
fn default_arguments() -> Value {
    Value::Object(serde_json::Map::new())
}

/// Tool list response payload.
#[derive(Debug, Serialize)]
struct ToolListResult {
    /// Registered tool definitions.
    tools: Vec<ToolDefinition>,
}

/// Dispatches a JSON-RPC request to the tool router.
fn handle_request(router: &ToolRouter, request: JsonRpcRequest) -> (StatusCode, JsonRpcResponse) {
    if request.jsonrpc != "2.0" {
        return protocol_error(request.id, -32600, "invalid json-rpc version");
    }
    match request.method.as_str() {
        "tools/list" => {
            let tools = router.list_tools();
            ok_result(
                request.id,
                serde_json::to_value(ToolListResult {
                    tools,
                }),
            )
        }
        "tools/call" => {
            let id = request.id;
            let params = request.params.unwrap_or(Value::Null);
            match serde_json::from_value::<ToolCallParams>(params) {
                Ok(call) => {
                    let result: ToolResult = router.call_tool(&call.name, &call.arguments);
                    ok_result(id, serde_json::to_value(result))
                }
                Err(_) => protocol_error(id, -32602, "invalid tool params"),
            }
        }
        _ => protocol_error(request.id, -32601, "method not found"),
    }
}

/// Builds a success response, degrading to an error on serialization failure.
fn ok_result(
    id: Value,
    result: Result<Value, serde_json::Error>,
) -> (StatusCode, JsonRpcResponse) {
    match result {
        Ok(value) => (
            StatusCode::OK,
            JsonRpcResponse {
                jsonrpc: "2.0",
                id,
                result: Some(value),
                error: None,
            },
        ),
        Err(_) => protocol_error(id, -32060, "serialization failed"),
    }
}

/// Builds a JSON-RPC protocol error response.
fn protocol_error(id: Value, code: i64, message: &str) -> (StatusCode, JsonRpcResponse) {
    protocol_error_with_status(StatusCode::BAD_REQUEST, id, code, message)
}

/// Builds a JSON-RPC protocol error response with an explicit HTTP status.
fn protocol_error_with_status(
    status: StatusCode,
    id: Value,
    code: i64,
    message: &str,
) -> (StatusCode, JsonRpcResponse) {
    (
        status,
        JsonRpcResponse {
            jsonrpc: "2.0",
            id,
            result: None,
            error: Some(JsonRpcError {
                code,
                message: message.to_string(),
            }),
        },
    )
}

// ============================================================================
// SECTION: Framing Helpers
// ============================================================================

/// Reads a framed stdio payload using MCP Content-Length headers.
///
/// Returns `Ok(None)` on clean end of input before a header starts.
fn read_framed(
    reader: &mut BufReader<impl Read>,
    max_body_bytes: usize,
) -> Result<Option<Vec<u8>>, McpServerError> {
    let mut content_length: Option<usize> = None;
    let mut line = String::new();
    loop {
        line.clear();
        let bytes = reader
            .read_line(&mut line)
            .map_err(|_| McpServerError::Transport("stdio read failed".to_string()))?;
        if bytes == 0 {
            if content_length.is_none() {
                return Ok(None);
            }
            return Err(McpServerError::Transport("stdio closed mid-frame".to_string()));
        }
        if line.trim().is_empty() {
            if content_length.is_some() {
                break;
            }
            continue;
        }
        if let Some(value) = line.strip_prefix("Content-Length:") {
            let parsed = value
                .trim()
                .parse::<usize>()
                .map_err(|_| McpServerError::Transport("invalid content length".to_string()))?;
            content_length = Some(parsed);
        }
    }
    let len = content_length
        .ok_or_else(|| McpServerError::Transport("missing content length".to_string()))?;
    if len > max_body_bytes {
        return Err(McpServerError::Transport("payload too large".to_string()));
    }
    let mut buf = vec![0u8; len];
    reader
        .read_exact(&mut buf)
        .map_err(|_| McpServerError::Transport("stdio read failed".to_string()))?;
    Ok(Some(buf))
}

/// Writes a framed stdio payload using MCP Content-Length headers.
fn write_framed(writer: &mut impl Write, payload: &[u8]) -> Result<(), McpServerError> {
    let header = format!("Content-Length: {}\r\n\r\n", payload.len());
    writer
        .write_all(header.as_bytes())
        .map_err(|_| McpServerError::Transport("stdio write failed".to_string()))?;
    writer
        .write_all(payload)
        .map_err(|_| McpServerError::Transport("stdio write failed".to_string()))?;
    writer.flush().map_err(|_| McpServerError::Transport("stdio write failed".to_string()))
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// MCP server errors.
#[derive(Debug, thiserror::Error)]
pub enum McpServerError {
    /// Configuration errors.
    #[error("config error: {0}")]
    Config(String),
    /// Initialization errors.
    #[error("init error: {0}")]
    Init(String),
    /// Transport errors.
    #[error("transport error: {0}")]
    Transport(String),
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(
        clippy::panic,
        clippy::unwrap_used,
        clippy::expect_used,
        reason = "Test-only framing assertions."
    )]

    use std::io::BufReader;
    use std::io::Cursor;
    use std::sync::Arc;

    use serde_json::Value;
    use serde_json::json;

    use super::JsonRpcRequest;
    use super::handle_request_blocking;
    use super::read_framed;
    use super::write_framed;
    use crate::api::ApiError;
    use crate::audit::NoopAuditSink;
    use crate::fabric::FabricApi;
    use crate::powerbi::PowerBiApi;
    use crate::tools::ToolRouter;

    /// Minimal Power BI stub for dispatch tests.
    struct StubPowerBi;

    impl PowerBiApi for StubPowerBi {
        fn list_datasets(&self) -> Result<Value, ApiError> {
            Ok(json!([]))
        }

        fn get_dataset(&self, _dataset_id: &str) -> Result<Value, ApiError> {
            Ok(Value::Null)
        }

        fn execute_dax_query(&self, _dataset_id: &str, _query: &str) -> Result<Value, ApiError> {
            Ok(Value::Null)
        }

        fn refresh_dataset(&self, _dataset_id: &str) -> Result<(), ApiError> {
            Ok(())
        }

        fn list_workspaces(&self) -> Result<Value, ApiError> {
            Ok(json!([{"id": "ws-1"}]))
        }
    }

    /// Minimal Fabric stub for dispatch tests.
    struct StubFabric;

    impl FabricApi for StubFabric {
        fn list_workspaces(&self) -> Result<Value, ApiError> {
            Ok(json!([]))
        }

        fn create_notebook(
            &self,
            _workspace_id: &str,
            _name: &str,
            _definition: &Value,
        ) -> Result<Value, ApiError> {
            Ok(Value::Null)
        }

        fn execute_notebook(
            &self,
            _workspace_id: &str,
            _notebook_id: &str,
        ) -> Result<Value, ApiError> {
            Ok(Value::Null)
        }

        fn upload_rows(
            &self,
            _workspace_id: &str,
            _warehouse_id: &str,
            _table_name: &str,
            _rows: &Value,
        ) -> Result<(), ApiError> {
            Ok(())
        }

        fn list_warehouses(&self, _workspace_id: &str) -> Result<Value, ApiError> {
            Ok(json!([]))
        }
    }

    fn stub_router() -> ToolRouter {
        ToolRouter::new(Arc::new(StubPowerBi), Arc::new(StubFabric), Arc::new(NoopAuditSink))
            .unwrap()
    }

    fn call_request(tool: &str) -> JsonRpcRequest {
        JsonRpcRequest {
            jsonrpc: "2.0".to_string(),
            id: json!(1),
            method: "tools/call".to_string(),
            params: Some(json!({"name": tool, "arguments": {}})),
        }
    }

    #[test]
    fn read_framed_accepts_payload_at_limit() {
        let payload = br#"{"jsonrpc":"2.0","id":1,"method":"tools/list"}"#;
        let framed = format!(
            "Content-Length: {}\r\n\r\n{}",
            payload.len(),
            String::from_utf8_lossy(payload)
        );
        let mut reader = BufReader::new(Cursor::new(framed.into_bytes()));
        let bytes = read_framed(&mut reader, payload.len()).unwrap().unwrap();
        assert_eq!(bytes, payload);
    }

    #[test]
    fn read_framed_rejects_payload_over_limit() {
        let payload = br#"{"jsonrpc":"2.0","id":1,"method":"tools/list"}"#;
        let framed = format!(
            "Content-Length: {}\r\n\r\n{}",
            payload.len(),
            String::from_utf8_lossy(payload)
        );
        let mut reader = BufReader::new(Cursor::new(framed.into_bytes()));
        assert!(read_framed(&mut reader, payload.len() - 1).is_err());
    }

    #[test]
    fn read_framed_signals_clean_end_of_input() {
        let mut reader = BufReader::new(Cursor::new(Vec::new()));
        assert!(read_framed(&mut reader, 1024).unwrap().is_none());
    }

    #[test]
    fn dispatch_guard_works_without_a_runtime() {
        let router = stub_router();
        let (status, response) = handle_request_blocking(&router, call_request("get_workspaces"));
        assert_eq!(status, axum::http::StatusCode::OK);
        let result = response.result.unwrap();
        assert_eq!(result["isError"], Value::Bool(false));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn dispatch_guard_works_inside_a_multi_thread_runtime() {
        let router = stub_router();
        let (status, response) = handle_request_blocking(&router, call_request("get_workspaces"));
        assert_eq!(status, axum::http::StatusCode::OK);
        let result = response.result.unwrap();
        assert!(result["content"][0]["text"].as_str().unwrap().contains("ws-1"));
    }

    #[test]
    fn write_then_read_round_trips_a_frame() {
        let payload = br#"{"jsonrpc":"2.0","id":2,"method":"tools/list"}"#;
        let mut framed = Vec::new();
        write_framed(&mut framed, payload).unwrap();
        let mut reader = BufReader::new(Cursor::new(framed));
        let bytes = read_framed(&mut reader, 1024).unwrap().unwrap();
        assert_eq!(bytes, payload);
    }
}
