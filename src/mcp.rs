use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tracing::{debug, warn};

use crate::error::{ErrorBody, OperationError, Result};
use crate::model::{LogDetailRequest, QueryRequest};
use crate::service::LogService;

pub const QUERY_LOGS: &str = "queryLogs";
pub const GET_LOG_DETAIL: &str = "getLogDetail";

#[derive(Debug, Deserialize)]
pub struct RpcRequest {
    #[serde(default)]
    pub id: Value,
    pub method: String,
    #[serde(default)]
    pub params: Value,
}

#[derive(Debug, Serialize)]
pub struct RpcResponse {
    pub jsonrpc: &'static str,
    pub id: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
}

#[derive(Debug, Serialize)]
pub struct RpcError {
    code: i32,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct ToolCallParams {
    name: String,
    #[serde(default)]
    arguments: Value,
}

/// Line-delimited JSON-RPC over stdin/stdout.
pub async fn run_stdio(service: LogService) -> Result<()> {
    serve_lines(&service, BufReader::new(tokio::io::stdin()), tokio::io::stdout()).await
}

/// Answers one JSON-RPC request per input line until the input ends.
pub async fn serve_lines<R, W>(service: &LogService, input: R, mut stdout: W) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut reader = input.lines();

    while let Some(line) = reader.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        let req: RpcRequest = match serde_json::from_str(&line) {
            Ok(r) => r,
            Err(e) => {
                warn!("unparseable request: {e}");
                let resp = rpc_error(&Value::Null, -32700, format!("parse error: {e}"), None);
                write_response(&mut stdout, resp).await?;
                continue;
            }
        };

        if let Some(resp) = process_request(service, req).await {
            write_response(&mut stdout, resp).await?;
        }
    }

    Ok(())
}

/// Handles one request; notifications (no id) produce no response.
pub async fn process_request(service: &LogService, req: RpcRequest) -> Option<RpcResponse> {
    debug!(method = %req.method, "rpc request");
    let resp = match req.method.as_str() {
        "initialize" => handle_initialize(&req),
        m if m.starts_with("notifications/") => {
            if req.id.is_null() {
                return None;
            }
            ok(&req, Value::Bool(true))
        }
        "ping" => ok(&req, serde_json::json!({})),
        "tools/list" | "list_tools" => ok(&req, serde_json::json!({ "tools": tool_definitions() })),
        "tools/call" => handle_tool_call(service, &req).await,
        QUERY_LOGS | GET_LOG_DETAIL => handle_direct(service, &req).await,
        _ => rpc_error(&req.id, -32601, format!("method not found: {}", req.method), None),
    };
    Some(resp)
}

fn handle_initialize(req: &RpcRequest) -> RpcResponse {
    ok(
        req,
        serde_json::json!({
            "protocolVersion": "2024-11-05",
            "capabilities": {
                "tools": {}
            },
            "serverInfo": {
                "name": env!("CARGO_PKG_NAME"),
                "version": env!("CARGO_PKG_VERSION")
            }
        }),
    )
}

async fn handle_tool_call(service: &LogService, req: &RpcRequest) -> RpcResponse {
    let params: ToolCallParams = match serde_json::from_value(req.params.clone()) {
        Ok(p) => p,
        Err(e) => return rpc_error(&req.id, -32602, format!("invalid params: {e}"), None),
    };
    let outcome = match call_tool(service, &params.name, params.arguments).await {
        Ok(outcome) => outcome,
        Err(resp) => return resp.with_id(&req.id),
    };
    let (body, is_error) = match outcome {
        Ok(value) => (value, false),
        Err(e) => (to_json(&ErrorBody::from(e)), true),
    };
    ok(
        req,
        serde_json::json!({
            "content": [{ "type": "text", "text": body.to_string() }],
            "structuredContent": body,
            "isError": is_error
        }),
    )
}

async fn handle_direct(service: &LogService, req: &RpcRequest) -> RpcResponse {
    match call_tool(service, &req.method, req.params.clone()).await {
        Ok(Ok(value)) => ok(req, value),
        Ok(Err(e)) => rpc_error(&req.id, -32002, e.message.clone(), Some(to_json(&e.code))),
        Err(resp) => resp.with_id(&req.id),
    }
}

/// Outer `Err` is a protocol failure (unknown tool, bad arguments); inner is the tool's own outcome.
async fn call_tool(
    service: &LogService,
    name: &str,
    arguments: Value,
) -> std::result::Result<std::result::Result<Value, OperationError>, RpcResponse> {
    match name {
        QUERY_LOGS => {
            let input: QueryRequest = parse_arguments(arguments)?;
            Ok(service.query_logs(&input).await.map(|r| to_json(&r)))
        }
        GET_LOG_DETAIL => {
            let input: LogDetailRequest = parse_arguments(arguments)?;
            Ok(service.get_log_detail(&input).await.map(|r| to_json(&r)))
        }
        other => Err(rpc_error(&Value::Null, -32602, format!("unknown tool: {other}"), None)),
    }
}

fn parse_arguments<T: serde::de::DeserializeOwned>(arguments: Value) -> std::result::Result<T, RpcResponse> {
    serde_json::from_value(arguments)
        .map_err(|e| rpc_error(&Value::Null, -32602, format!("invalid params: {e}"), None))
}

fn to_json<T: Serialize>(value: &T) -> Value {
    serde_json::to_value(value).unwrap_or(Value::Null)
}

async fn write_response<W: AsyncWrite + Unpin>(stdout: &mut W, resp: RpcResponse) -> Result<()> {
    let line = serde_json::to_string(&resp).unwrap_or_else(|_| "{}".to_string());
    stdout.write_all(line.as_bytes()).await?;
    stdout.write_all(b"\n").await?;
    stdout.flush().await?;
    Ok(())
}

fn ok(req: &RpcRequest, result: Value) -> RpcResponse {
    RpcResponse {
        jsonrpc: "2.0",
        id: req.id.clone(),
        result: Some(result),
        error: None,
    }
}

fn rpc_error(id: &Value, code: i32, message: String, data: Option<Value>) -> RpcResponse {
    RpcResponse {
        jsonrpc: "2.0",
        id: id.clone(),
        result: None,
        error: Some(RpcError { code, message, data }),
    }
}

impl RpcResponse {
    fn with_id(mut self, id: &Value) -> Self {
        self.id = id.clone();
        self
    }
}

pub fn tool_definitions() -> Vec<Value> {
    vec![
        serde_json::json!({
            "name": QUERY_LOGS,
            "description": "Returns a list of log summaries based on the given query",
            "inputSchema": {
                "type": "object",
                "required": ["projectId", "filter"],
                "properties": {
                    "projectId": { "type": "string" },
                    "filter": { "type": "string" },
                    "resourceNames": {
                        "type": "array",
                        "items": {
                            "type": "string",
                            "description": "e.g. 'projects/<project_id>/logs/run.googleapis.com%2Fstdout'"
                        }
                    },
                    "pageSize": { "type": "integer" },
                    "pageToken": { "type": "string" },
                    "orderBy": {
                        "type": "object",
                        "properties": {
                            "timestamp": { "type": "string", "enum": ["asc", "desc"] }
                        },
                        "required": ["timestamp"]
                    },
                    "summaryFields": {
                        "type": "array",
                        "items": {
                            "type": "string",
                            "description": "Fields to include in the summary, e.g. ['labels.service', 'textPayload']"
                        }
                    }
                }
            }
        }),
        serde_json::json!({
            "name": GET_LOG_DETAIL,
            "description": "Returns the whole record of a log with the given ID",
            "inputSchema": {
                "type": "object",
                "required": ["projectId", "logId"],
                "properties": {
                    "projectId": { "type": "string" },
                    "logId": { "type": "string" }
                }
            }
        }),
    ]
}
