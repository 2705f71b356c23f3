//! HTTP routes of the control server.

use axum::extract::{Query, Request, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{middleware, Extension, Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};

use super::gate::{self, error_response, ClientInfo};
use super::AppState;
use crate::error::{StoreError, ToolError};
use crate::tools::tool_definitions;

const DEFAULT_AUDIT_LIMIT: usize = 100;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/auth/token", get(session_token))
        .route("/mcp/tools", get(list_tools))
        .route("/mcp/call", post(call_tool))
        .route("/mcp/resource", get(read_resource))
        .route("/mcp/audit", get(recent_audit))
        .fallback(not_found)
        .layer(middleware::from_fn_with_state(state.clone(), gate::gate))
        .layer(gate::cors_layer(state.extra_origins.clone()))
        .with_state(state)
}

async fn health(State(state): State<AppState>) -> Json<Value> {
    Json(json!({ "status": "ok", "store": &*state.store_name }))
}

async fn session_token(
    State(state): State<AppState>,
    Extension(client): Extension<ClientInfo>,
) -> Response {
    if !client.is_loopback() {
        tracing::warn!(client = ?client.addr, "token requested from non-loopback address");
        return error_response(
            StatusCode::FORBIDDEN,
            "the session token is only available to loopback clients",
        );
    }
    Json(json!({ "token": &*state.token })).into_response()
}

async fn list_tools() -> Json<Value> {
    Json(json!({ "tools": tool_definitions() }))
}

#[derive(Debug, Deserialize)]
struct CallRequest {
    tool: Option<Value>,
    #[serde(default)]
    arguments: Option<Value>,
}

async fn call_tool(
    State(state): State<AppState>,
    Extension(client): Extension<ClientInfo>,
    request: Request,
) -> Response {
    let limit = state.max_body_bytes;
    let declared = request
        .headers()
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<usize>().ok());
    if declared.is_some_and(|len| len > limit) {
        return too_large(limit);
    }

    let bytes = match axum::body::to_bytes(request.into_body(), limit).await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::warn!(error = %e, "aborted request body");
            return too_large(limit);
        }
    };

    let call: CallRequest = match serde_json::from_slice(&bytes) {
        Ok(call) => call,
        Err(e) => {
            return error_response(StatusCode::BAD_REQUEST, &format!("malformed JSON body: {e}"))
        }
    };
    let Some(tool) = call.tool.as_ref().and_then(Value::as_str).map(str::to_string) else {
        return error_response(StatusCode::BAD_REQUEST, "missing or non-string 'tool' field");
    };
    let arguments = call.arguments.unwrap_or(Value::Null);

    // Run in its own task so a panicking collaborator becomes a 500, not a dropped connection.
    let tools = state.tools.clone();
    let client_id = client.id();
    let task = tokio::spawn(async move { tools.call(&tool, arguments, client_id.as_deref()).await });
    match task.await {
        Ok(response) => Json(response).into_response(),
        Err(e) => {
            tracing::error!(error = %e, "tool task failed");
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal error while executing the tool",
            )
        }
    }
}

fn too_large(limit: usize) -> Response {
    error_response(
        StatusCode::PAYLOAD_TOO_LARGE,
        &format!("request body exceeds the {limit} byte limit"),
    )
}

#[derive(Debug, Deserialize)]
struct ResourceQuery {
    path: String,
}

async fn read_resource(
    State(state): State<AppState>,
    Extension(client): Extension<ClientInfo>,
    Query(query): Query<ResourceQuery>,
) -> Response {
    let client_id = client.id();
    match state
        .tools
        .read_resource(&query.path, client_id.as_deref())
        .await
    {
        Ok((path, text)) => Json(json!({
            "contents": [{
                "uri": format!("vault://{path}"),
                "mimeType": "text/markdown",
                "text": text,
            }]
        }))
        .into_response(),
        Err(e @ ToolError::InvalidPath { .. }) => {
            error_response(StatusCode::BAD_REQUEST, &e.to_string())
        }
        Err(e @ ToolError::Store(StoreError::NotFound(_))) => {
            error_response(StatusCode::NOT_FOUND, &e.to_string())
        }
        Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string()),
    }
}

#[derive(Debug, Deserialize)]
struct AuditQuery {
    limit: Option<usize>,
    tool: Option<String>,
}

async fn recent_audit(State(state): State<AppState>, Query(query): Query<AuditQuery>) -> Json<Value> {
    let limit = query.limit.unwrap_or(DEFAULT_AUDIT_LIMIT);
    let entries = match query.tool.as_deref() {
        Some(tool) => state.audit.get_for_tool(tool, limit),
        None => state.audit.get_recent(limit),
    };
    Json(json!({ "enabled": state.audit.is_enabled(), "entries": entries }))
}

async fn not_found() -> Response {
    error_response(StatusCode::NOT_FOUND, "not found")
}
