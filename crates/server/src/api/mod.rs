use crate::config::AppState;
use crate::router::RouteError;
use anyhow::Result;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use routegate_mcp::protocol::{JsonRpcError, JsonRpcResponse};
use serde_json::Value;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};

mod mcp;

pub use mcp::SESSION_HEADER;

/// Start the API server and run until `shutdown` is cancelled
pub async fn serve(addr: &str, state: AppState, shutdown: CancellationToken) -> Result<()> {
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("API server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;

    Ok(())
}

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route(
            "/mcp",
            get(mcp::open_stream)
                .post(mcp::post_message)
                .delete(mcp::close_session),
        )
        // Middleware
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().include_headers(true))
                .on_response(DefaultOnResponse::new().include_headers(true)),
        )
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any)
                .expose_headers([axum::http::HeaderName::from_static(SESSION_HEADER)]),
        )
        .with_state(Arc::new(state))
}

/// Health check endpoint
async fn health_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "routegate",
        "version": env!("CARGO_PKG_VERSION"),
        "started_at": state.started_at,
        "sessions": state.registry.len(),
        "cache_entries": state.adapter.cache().len(),
    }))
}

/// Rejection sent before a request reaches a session: a JSON-RPC error with a
/// null id
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    error: JsonRpcError,
}

impl ApiError {
    pub fn parse(err: serde_json::Error) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            error: JsonRpcError::parse_error(err.to_string()),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            error: JsonRpcError::internal_error(message),
        }
    }
}

impl From<RouteError> for ApiError {
    fn from(err: RouteError) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            error: JsonRpcError::bad_request(err.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(JsonRpcResponse::error(Value::Null, self.error))).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_route_error_shape() {
        let response = JsonRpcResponse::error(
            Value::Null,
            ApiError::from(RouteError::MissingSession).error,
        );
        assert_eq!(
            serde_json::to_value(response).unwrap(),
            serde_json::json!({
                "jsonrpc": "2.0",
                "error": {"code": -32000, "message": "Bad Request: No valid session ID provided"},
                "id": null
            })
        );
    }
}
