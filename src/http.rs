use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Query, State},
    http::StatusCode,
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    routing::{get, post},
    Json, Router,
};
use futures::stream::{Stream, StreamExt};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufRead, AsyncWrite};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::{debug, info};

use crate::config::ServerConfig;
use crate::error::{AppError, ErrorBody, ErrorCode, OperationError, Result};
use crate::mcp::{process_request, serve_lines, RpcRequest};
use crate::model::{LogDetailRequest, QueryRequest};
use crate::service::LogService;

#[derive(Clone)]
pub struct AppState {
    pub service: LogService,
    pub sessions: Sessions,
}

pub type Sessions = Arc<RwLock<HashMap<String, mpsc::UnboundedSender<Event>>>>;

pub fn status_for(code: ErrorCode) -> StatusCode {
    match code {
        ErrorCode::NotFound => StatusCode::NOT_FOUND,
        ErrorCode::PermissionDenied => StatusCode::FORBIDDEN,
        ErrorCode::InvalidArgument => StatusCode::BAD_REQUEST,
        ErrorCode::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        ErrorCode::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
        ErrorCode::Unauthenticated => StatusCode::UNAUTHORIZED,
    }
}

struct ErrorResponse(OperationError);

impl IntoResponse for ErrorResponse {
    fn into_response(self) -> Response {
        (status_for(self.0.code), Json(ErrorBody::from(self.0))).into_response()
    }
}

fn rejected(e: JsonRejection) -> Response {
    ErrorResponse(OperationError::invalid_argument(format!("invalid request body: {e}"))).into_response()
}

fn respond<T: Serialize>(result: std::result::Result<T, OperationError>) -> Response {
    match result {
        Ok(body) => (StatusCode::OK, Json(body)).into_response(),
        Err(e) => ErrorResponse(e).into_response(),
    }
}

async fn query_handler(
    State(state): State<AppState>,
    payload: std::result::Result<Json<QueryRequest>, JsonRejection>,
) -> Response {
    match payload {
        Ok(Json(req)) => respond(state.service.query_logs(&req).await),
        Err(e) => rejected(e),
    }
}

async fn detail_handler(
    State(state): State<AppState>,
    payload: std::result::Result<Json<LogDetailRequest>, JsonRejection>,
) -> Response {
    match payload {
        Ok(Json(req)) => respond(state.service.get_log_detail(&req).await),
        Err(e) => rejected(e),
    }
}

async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "cachedEntries": state.service.cache().len()
    }))
}

async fn sse_handler(State(state): State<AppState>) -> Sse<impl Stream<Item = std::result::Result<Event, axum::Error>>> {
    let (tx, rx) = mpsc::unbounded_channel();
    let session_id = format!("{}", chrono::Utc::now().timestamp_nanos_opt().unwrap_or(0));

    // MCP clients resolve this relative to the SSE URL
    let endpoint_url = format!("/message?session_id={}", session_id);
    let _ = tx.send(Event::default().event("endpoint").data(endpoint_url));

    state.sessions.write().insert(session_id.clone(), tx);
    debug!(session_id = %session_id, "sse session opened");

    // the guard lives as long as the response stream
    let guard = SessionGuard {
        session_id,
        sessions: state.sessions.clone(),
    };
    let stream = UnboundedReceiverStream::new(rx).map(move |event| {
        let _session = &guard;
        Ok::<_, axum::Error>(event)
    });
    Sse::new(stream).keep_alive(KeepAlive::default())
}

/// Drops the session's sender once the client's event stream goes away.
struct SessionGuard {
    session_id: String,
    sessions: Sessions,
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        self.sessions.write().remove(&self.session_id);
        debug!(session_id = %self.session_id, "sse session closed");
    }
}

#[derive(Deserialize)]
struct MessageQuery {
    session_id: String,
}

async fn message_handler(
    State(state): State<AppState>,
    Query(q): Query<MessageQuery>,
    Json(req): Json<RpcRequest>,
) -> impl IntoResponse {
    let sender = state.sessions.read().get(&q.session_id).cloned();

    let Some(sender) = sender else {
        return StatusCode::NOT_FOUND;
    };
    let service = state.service.clone();
    let sessions = state.sessions.clone();
    tokio::spawn(async move {
        let Some(resp) = process_request(&service, req).await else {
            return;
        };
        if let Ok(json_str) = serde_json::to_string(&resp) {
            if sender.send(Event::default().event("message").data(json_str)).is_err() {
                // client hung up
                sessions.write().remove(&q.session_id);
            }
        }
    });
    StatusCode::ACCEPTED
}

pub fn build_router(service: LogService) -> Router {
    router_with_state(AppState {
        service,
        sessions: Arc::new(RwLock::new(HashMap::new())),
    })
}

fn router_with_state(state: AppState) -> Router {
    Router::new()
        .route("/logs/query", post(query_handler))
        .route("/logs/detail", post(detail_handler))
        .route("/health", get(health_handler))
        .route("/sse", get(sse_handler))
        .route("/message", post(message_handler))
        .with_state(state)
}

pub async fn serve_http(service: LogService, server: &ServerConfig) -> Result<()> {
    let router = build_router(service);

    let addr = format!(
        "{}:{}",
        server.http_addr.as_deref().unwrap_or("0.0.0.0"),
        server.http_port.unwrap_or(3000)
    );
    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|e| AppError::ConfigError(format!("bind {addr} failed: {e}")))?;
    info!("HTTP server listening on http://{}", addr);
    axum::serve(listener, router).await.map_err(|e| e.into())
}

/// HTTP and line-delimited JSON-RPC side by side. Returns as soon as either
/// one stops, so closing the input shuts the server down.
pub async fn serve_both<R, W>(service: LogService, server: &ServerConfig, input: R, output: W) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let rpc_service = service.clone();
    tokio::select! {
        res = serve_http(service, server) => res,
        res = serve_lines(&rpc_service, input, output) => {
            info!("input closed, shutting down");
            res
        }
    }
}
