//! Integration tests for MCP protocol handling.
//!
//! These tests drive a whole stdio session through an in-memory
//! [`LineTransport`], covering the handshake, tool calls, resources, batches
//! and error replies exactly as a client would see them on stdout.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Map, Value};

use kalshi_mcp::error::{ApiError, ToolError};
use kalshi_mcp::mcp::{LineTransport, McpServer, ResourceRouter};
use kalshi_mcp::tools::{ToolDescriptor, ToolRegistry};

// =============================================================================
// Helpers
// =============================================================================

/// A registry with canned answers for a few tool names.
struct CannedTools;

#[async_trait]
impl ToolRegistry for CannedTools {
    fn list_tools(&self) -> Vec<ToolDescriptor> {
        vec![ToolDescriptor {
            name: "get_categories",
            description: "List categories.",
            input_schema: json!({"type": "object", "properties": {}}),
        }]
    }

    async fn call_tool(
        &self,
        name: &str,
        _arguments: Option<&Map<String, Value>>,
    ) -> Result<Map<String, Value>, ToolError> {
        match name {
            "get_categories" => Ok(json!({"categories": ["Economics", "Sports"]})
                .as_object()
                .cloned()
                .unwrap_or_default()),
            "get_balance" => Err(ToolError::Api(ApiError::MissingCredentials)),
            _ => Err(ToolError::UnknownTool(name.to_string())),
        }
    }
}

fn server(with_resources: bool) -> McpServer {
    let tools: Arc<dyn ToolRegistry> = Arc::new(CannedTools);
    let server = McpServer::new(Arc::clone(&tools));
    if with_resources {
        server.with_resources(ResourceRouter::new(tools))
    } else {
        server
    }
}

/// Feeds `lines` to a fresh session and returns every output line as JSON.
async fn session(with_resources: bool, lines: &[&str]) -> Vec<Value> {
    session_bytes(with_resources, lines.join("\n").as_bytes()).await
}

/// Feeds raw `input` to a fresh session and returns every output line as JSON.
async fn session_bytes(with_resources: bool, input: &[u8]) -> Vec<Value> {
    let mut transport = LineTransport::new(input, Vec::new());
    server(with_resources)
        .serve(&mut transport)
        .await
        .expect("session should complete");

    let written = String::from_utf8(transport.into_writer()).expect("utf-8 output");
    written
        .lines()
        .map(|line| serde_json::from_str(line).expect("each output line is JSON"))
        .collect()
}

const INITIALIZE: &str = r#"{"jsonrpc":"2.0","id":1,"method":"initialize","params":{"protocolVersion":"2025-06-18","capabilities":{},"clientInfo":{"name":"test-client","version":"1.0.0"}}}"#;
const INITIALIZED: &str = r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#;

// =============================================================================
// Lifecycle
// =============================================================================

#[tokio::test]
async fn test_full_handshake_and_tool_call() {
    let replies = session(
        false,
        &[
            INITIALIZE,
            INITIALIZED,
            r#"{"jsonrpc":"2.0","id":2,"method":"tools/list"}"#,
            r#"{"jsonrpc":"2.0","id":3,"method":"tools/call","params":{"name":"get_categories","arguments":{}}}"#,
        ],
    )
    .await;

    assert_eq!(replies.len(), 3, "the notification gets no reply");

    assert_eq!(replies[0]["id"], 1);
    assert_eq!(replies[0]["result"]["protocolVersion"], "2025-06-18");
    assert_eq!(replies[0]["result"]["serverInfo"]["name"], "kalshi-mcp-server");

    assert_eq!(replies[1]["result"]["tools"][0]["name"], "get_categories");
    assert!(replies[1]["result"]["tools"][0]["inputSchema"].is_object());

    let call = &replies[2]["result"];
    assert_eq!(call["isError"], false);
    assert_eq!(
        call["structuredContent"],
        json!({"categories": ["Economics", "Sports"]})
    );
    assert_eq!(
        call["content"][0],
        json!({"type": "text", "text": r#"{"categories":["Economics","Sports"]}"#})
    );
}

#[tokio::test]
async fn test_tool_call_before_initialized_notification() {
    let replies = session(
        false,
        &[
            INITIALIZE,
            r#"{"jsonrpc":"2.0","id":2,"method":"tools/call","params":{"name":"get_categories"}}"#,
        ],
    )
    .await;

    assert_eq!(replies[1]["result"]["isError"], true);
    assert!(replies[1]["result"]["content"][0]["text"]
        .as_str()
        .unwrap()
        .starts_with("Server is not initialized."));
}

#[tokio::test]
async fn test_ping_needs_no_handshake() {
    let replies = session(false, &[r#"{"jsonrpc":"2.0","id":"p","method":"ping"}"#]).await;
    assert_eq!(replies, vec![json!({"jsonrpc": "2.0", "id": "p", "result": {}})]);
}

#[tokio::test]
async fn test_tool_error_is_reported_in_result() {
    let replies = session(
        false,
        &[
            INITIALIZE,
            INITIALIZED,
            r#"{"jsonrpc":"2.0","id":2,"method":"tools/call","params":{"name":"get_balance"}}"#,
        ],
    )
    .await;

    let result = &replies[1]["result"];
    assert_eq!(result["isError"], true);
    assert!(result.get("structuredContent").is_none());
    assert!(result["content"][0]["text"]
        .as_str()
        .unwrap()
        .contains("KALSHI_API_KEY_ID"));
}

// =============================================================================
// Resources
// =============================================================================

#[tokio::test]
async fn test_resources_are_advertised_and_readable() {
    let replies = session(
        true,
        &[
            INITIALIZE,
            INITIALIZED,
            r#"{"jsonrpc":"2.0","id":2,"method":"resources/list"}"#,
            r#"{"jsonrpc":"2.0","id":3,"method":"resources/templates/list"}"#,
            r#"{"jsonrpc":"2.0","id":4,"method":"resources/read","params":{"uri":"kalshi:///categories"}}"#,
        ],
    )
    .await;

    assert_eq!(
        replies[0]["result"]["capabilities"]["resources"],
        json!({"subscribe": false, "listChanged": false})
    );

    let resources = replies[1]["result"]["resources"].as_array().unwrap();
    assert_eq!(resources.len(), 4);
    assert!(resources
        .iter()
        .all(|r| r["mimeType"] == "application/json"));

    let templates = replies[2]["result"]["resourceTemplates"].as_array().unwrap();
    assert_eq!(templates.len(), 6);
    assert!(templates
        .iter()
        .any(|t| t["uriTemplate"] == "kalshi:///category/{category}/tags"));

    let contents = &replies[3]["result"]["contents"][0];
    assert_eq!(contents["uri"], "kalshi:///categories");
    assert_eq!(contents["mimeType"], "application/json");
    assert_eq!(
        contents["text"],
        "{\n  \"categories\": [\n    \"Economics\",\n    \"Sports\"\n  ]\n}"
    );
}

#[tokio::test]
async fn test_resource_errors() {
    let replies = session(
        true,
        &[
            r#"{"jsonrpc":"2.0","id":1,"method":"resources/list"}"#,
            INITIALIZE,
            INITIALIZED,
            r#"{"jsonrpc":"2.0","id":2,"method":"resources/read","params":{"uri":"https://example.com"}}"#,
            r#"{"jsonrpc":"2.0","id":3,"method":"resources/read","params":{"uri":"kalshi:///nope"}}"#,
            r#"{"jsonrpc":"2.0","id":4,"method":"resources/read","params":{"uri":"kalshi:///portfolio/balance"}}"#,
        ],
    )
    .await;

    assert_eq!(replies[0]["error"]["code"], -32603);

    assert_eq!(replies[2]["error"]["code"], -32602);
    assert_eq!(
        replies[2]["error"]["message"],
        "Unsupported resource scheme (expected kalshi://)"
    );

    assert_eq!(replies[3]["error"]["message"], "Unknown resource uri");

    assert_eq!(replies[4]["error"]["code"], -32603);
    assert_eq!(replies[4]["error"]["message"], "Internal error");
    assert!(replies[4]["error"]["data"]["detail"].is_string());
}

#[tokio::test]
async fn test_resources_disabled() {
    let replies = session(
        false,
        &[
            INITIALIZE,
            INITIALIZED,
            r#"{"jsonrpc":"2.0","id":2,"method":"resources/read","params":{"uri":"kalshi:///categories"}}"#,
        ],
    )
    .await;

    assert!(replies[0]["result"]["capabilities"].get("resources").is_none());
    assert_eq!(replies[1]["error"]["code"], -32601);
}

// =============================================================================
// Framing and error replies
// =============================================================================

#[tokio::test]
async fn test_blank_lines_and_whitespace_are_ignored() {
    let replies = session(
        false,
        &["", "   ", r#"  {"jsonrpc":"2.0","id":1,"method":"ping"}  "#, "\r"],
    )
    .await;
    assert_eq!(replies.len(), 1);
    assert_eq!(replies[0]["id"], 1);
}

#[tokio::test]
async fn test_parse_error_keeps_session_alive() {
    let replies = session(
        false,
        &["not valid json", r#"{"jsonrpc":"2.0","id":2,"method":"ping"}"#],
    )
    .await;

    assert_eq!(replies[0]["error"]["code"], -32700);
    assert_eq!(replies[0]["id"], Value::Null);
    assert_eq!(replies[1]["id"], 2);
}

#[tokio::test]
async fn test_invalid_utf8_keeps_session_alive() {
    let mut input = b"\xff\n".to_vec();
    input.extend_from_slice(br#"{"jsonrpc":"2.0","id":2,"method":"ping"}"#);
    let replies = session_bytes(false, &input).await;

    assert_eq!(replies.len(), 2);
    assert_eq!(replies[0]["error"]["code"], -32700);
    assert_eq!(replies[0]["id"], Value::Null);
    assert_eq!(replies[1]["id"], 2);
    assert_eq!(replies[1]["result"], json!({}));
}

#[tokio::test]
async fn test_numeric_ids_round_trip() {
    let replies = session(
        false,
        &[
            r#"{"jsonrpc":"2.0","id":1.5,"method":"ping"}"#,
            r#"{"jsonrpc":"2.0","id":18446744073709551615,"method":"ping"}"#,
            r#"{"jsonrpc":"2.0","id":-7,"method":"ping"}"#,
        ],
    )
    .await;

    assert_eq!(replies.len(), 3);
    assert_eq!(replies[0]["id"], json!(1.5));
    assert_eq!(replies[1]["id"], json!(u64::MAX));
    assert_eq!(replies[2]["id"], -7);
    for reply in &replies {
        assert!(reply.get("error").is_none(), "{reply}");
    }
}

#[tokio::test]
async fn test_batch_replies_in_order() {
    let replies = session(
        false,
        &[
            r#"[{"jsonrpc":"2.0","id":1,"method":"ping"},{"jsonrpc":"2.0","method":"notifications/initialized"},{"jsonrpc":"2.0","id":2,"method":"unknown/method"},{"jsonrpc":"2.0","id":9,"result":{}}]"#,
        ],
    )
    .await;

    assert_eq!(replies.len(), 1);
    let batch = replies[0].as_array().unwrap();
    assert_eq!(batch.len(), 2);
    assert_eq!(batch[0]["id"], 1);
    assert_eq!(batch[1]["error"]["code"], -32601);
}

#[tokio::test]
async fn test_batch_of_notifications_writes_nothing() {
    let replies = session(false, &[r#"[{"jsonrpc":"2.0","method":"notifications/initialized"}]"#]).await;
    assert!(replies.is_empty());
}

#[tokio::test]
async fn test_invalid_requests() {
    let replies = session(
        false,
        &[
            "[]",
            "42",
            r#"{"jsonrpc":"2.0","id":5}"#,
            r#"{"id":6,"method":"ping"}"#,
            r#"{"jsonrpc":"2.0","id":true,"method":"ping"}"#,
        ],
    )
    .await;

    assert_eq!(replies.len(), 5);
    for reply in &replies {
        assert_eq!(reply["error"]["code"], -32600, "{reply}");
        assert_eq!(reply["error"]["message"], "Invalid Request");
    }
    assert_eq!(replies[2]["id"], 5);
    assert_eq!(replies[3]["id"], 6);
    assert_eq!(replies[4]["id"], Value::Null);
}
