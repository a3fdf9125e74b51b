// Streamable HTTP endpoint: POST messages, GET the server stream, DELETE the session

use super::{ApiError, ApiResult};
use crate::config::AppState;
use crate::router::{route, Inbound};
use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, HeaderValue, StatusCode},
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    Json,
};
use futures::{Stream, StreamExt};
use routegate_mcp::protocol::JsonRpcPayload;
use std::sync::Arc;

pub const SESSION_HEADER: &str = "mcp-session-id";

fn session_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(SESSION_HEADER)
        .map(|value| value.to_str().unwrap_or_default())
}

/// Handle one message or batch
pub async fn post_message(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<Response> {
    let payload = JsonRpcPayload::from_slice(&body).map_err(ApiError::parse)?;
    let decision = route(&state.registry, Inbound::Message(&payload), session_token(&headers))?;
    let created = decision.is_new();
    let transport = decision.into_transport();
    let expects_reply = payload.has_requests();

    let reply = transport.handle_payload(payload).await;

    if created && transport.protocol_version().is_none() {
        // initialize itself failed, so the session is never handed out
        tracing::warn!(session_id = %transport.id(), "Initialize rejected, discarding session");
        transport.close();
        return Ok(match reply {
            Some(body) => (StatusCode::BAD_REQUEST, Json(body)).into_response(),
            None => StatusCode::BAD_REQUEST.into_response(),
        });
    }

    let mut response = match reply {
        Some(body) if expects_reply => Json(body).into_response(),
        _ => StatusCode::ACCEPTED.into_response(),
    };

    if created {
        let value = HeaderValue::from_str(transport.id().as_str())
            .map_err(|e| ApiError::internal(format!("Invalid session id: {e}")))?;
        response.headers_mut().insert(SESSION_HEADER, value);
    }

    Ok(response)
}

/// Attach to the session's server-to-client stream
pub async fn open_stream(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> ApiResult<Sse<impl Stream<Item = Result<Event, axum::Error>>>> {
    let transport = route(&state.registry, Inbound::Stream, session_token(&headers))?.into_transport();
    tracing::debug!(session_id = %transport.id(), "Stream attached");

    let events = transport
        .subscribe()
        .map(|message| Event::default().event("message").json_data(message));

    Ok(Sse::new(events).keep_alive(KeepAlive::default()))
}

/// Terminate the session
pub async fn close_session(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> ApiResult<StatusCode> {
    let transport = route(&state.registry, Inbound::Close, session_token(&headers))?.into_transport();
    transport.close();
    Ok(StatusCode::OK)
}
