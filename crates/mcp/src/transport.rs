//! Per-session protocol state.
//!
//! A [`SessionTransport`] owns one client conversation: the initialize
//! handshake, the outbound stream of server-initiated messages and the close
//! notification. It knows nothing about how sessions are stored; whoever
//! creates it installs a close callback with [`SessionTransport::on_close`].

use crate::protocol::{
    methods, negotiate_protocol_version, CallToolParams, ClientInfo, InitializeParams,
    InitializeResult, JsonRpcError, JsonRpcMessage, JsonRpcPayload, JsonRpcRequest,
    JsonRpcResponse, ListToolsResult, LogLevel, LogMessageParams, ServerCapabilities, ServerInfo,
    SetLevelParams, ToolsCapability,
};
use crate::tools::{ToolAdapter, ToolEnvelope};
use chrono::{DateTime, Utc};
use futures::{future, Stream, StreamExt};
use parking_lot::{Mutex, RwLock};
use routegate_core::SessionId;
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::Instant;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;
use tokio_util::sync::CancellationToken;

/// Buffered server-initiated messages per session
const OUTBOUND_CAPACITY: usize = 64;

pub const SERVER_NAME: &str = "routegate";

const INSTRUCTIONS: &str = "Read-only access to cross-chain quotes, routes, token metadata, \
balances and transfer status. Amounts are integers in the token's smallest unit.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    Open,
    Closing,
    Closed,
}

/// Invoked once when the transport closes
pub type CloseCallback = Box<dyn FnOnce(&SessionId) + Send>;

#[derive(Debug, Clone)]
struct Handshake {
    protocol_version: String,
    client_info: ClientInfo,
}

pub struct SessionTransport {
    id: SessionId,
    adapter: Arc<ToolAdapter>,
    created_at: DateTime<Utc>,
    state: RwLock<SessionState>,
    handshake: RwLock<Option<Handshake>>,
    initialized: AtomicBool,
    log_level: RwLock<LogLevel>,
    outbound: broadcast::Sender<Value>,
    shutdown: CancellationToken,
    on_close: Mutex<Option<CloseCallback>>,
    last_activity: Mutex<Instant>,
}

impl SessionTransport {
    pub fn new(id: SessionId, adapter: Arc<ToolAdapter>) -> Self {
        let (outbound, _) = broadcast::channel(OUTBOUND_CAPACITY);
        Self {
            id,
            adapter,
            created_at: Utc::now(),
            state: RwLock::new(SessionState::Open),
            handshake: RwLock::new(None),
            initialized: AtomicBool::new(false),
            log_level: RwLock::new(LogLevel::Info),
            outbound,
            shutdown: CancellationToken::new(),
            on_close: Mutex::new(None),
            last_activity: Mutex::new(Instant::now()),
        }
    }

    pub fn id(&self) -> &SessionId {
        &self.id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn state(&self) -> SessionState {
        *self.state.read()
    }

    pub fn is_open(&self) -> bool {
        self.state() == SessionState::Open
    }

    /// Whether the client sent `notifications/initialized`
    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::Acquire)
    }

    pub fn protocol_version(&self) -> Option<String> {
        self.handshake.read().as_ref().map(|h| h.protocol_version.clone())
    }

    pub fn client_info(&self) -> Option<ClientInfo> {
        self.handshake.read().as_ref().map(|h| h.client_info.clone())
    }

    /// Install the close notification, replacing any earlier one
    pub fn on_close(&self, callback: impl FnOnce(&SessionId) + Send + 'static) {
        *self.on_close.lock() = Some(Box::new(callback));
    }

    /// Time since the last inbound message or stream attach
    pub fn idle_for(&self) -> Duration {
        self.last_activity.lock().elapsed()
    }

    /// Whether a client is currently attached to the outbound stream
    pub fn has_stream(&self) -> bool {
        self.outbound.receiver_count() > 0
    }

    fn touch(&self) {
        *self.last_activity.lock() = Instant::now();
    }

    /// Process one POST body. Returns the response body, or `None` when the
    /// payload held only notifications and responses.
    pub async fn handle_payload(&self, payload: JsonRpcPayload) -> Option<Value> {
        self.touch();

        let is_batch = matches!(payload, JsonRpcPayload::Batch(_));
        let mut responses = Vec::new();

        for message in payload.into_messages() {
            match message {
                JsonRpcMessage::Request(request) => {
                    if let Some(response) = self.handle_request(request).await {
                        responses.push(response);
                    }
                }
                JsonRpcMessage::Response(response) => {
                    tracing::debug!(session_id = %self.id, id = %response.id, "Ignoring client response");
                }
            }
        }

        if responses.is_empty() {
            return None;
        }

        let body = if is_batch {
            serde_json::to_value(&responses)
        } else {
            serde_json::to_value(&responses[0])
        };

        match body {
            Ok(body) => Some(body),
            Err(e) => {
                tracing::error!(session_id = %self.id, error = %e, "Failed to serialize responses");
                let fallback = JsonRpcResponse::error(Value::Null, JsonRpcError::internal_error(e.to_string()));
                serde_json::to_value(fallback).ok()
            }
        }
    }

    async fn handle_request(&self, request: JsonRpcRequest) -> Option<JsonRpcResponse> {
        let Some(id) = request.id else {
            self.handle_notification(&request.method, request.params);
            return None;
        };

        if !self.is_open() {
            return Some(JsonRpcResponse::error(id, JsonRpcError::bad_request("Session is closed")));
        }

        tracing::debug!(session_id = %self.id, method = %request.method, "Handling request");

        let response = match request.method.as_str() {
            methods::INITIALIZE => self.initialize(id, request.params),
            methods::PING => JsonRpcResponse::success(id, json!({})),
            methods::TOOLS_LIST => JsonRpcResponse::from_serializable(
                id,
                &ListToolsResult {
                    tools: self.adapter.schemas(),
                },
            ),
            methods::TOOLS_CALL => self.call_tool(id, request.params).await,
            methods::LOGGING_SET_LEVEL => self.set_log_level(id, request.params),
            other => JsonRpcResponse::error(id, JsonRpcError::method_not_found(other)),
        };

        Some(response)
    }

    fn handle_notification(&self, method: &str, params: Option<Value>) {
        match method {
            methods::INITIALIZED => {
                self.initialized.store(true, Ordering::Release);
                tracing::debug!(session_id = %self.id, "Client finished initialization");
            }
            methods::CANCELLED => {
                tracing::debug!(session_id = %self.id, params = ?params, "Client cancelled a request");
            }
            other => {
                tracing::debug!(session_id = %self.id, method = other, "Ignoring notification");
            }
        }
    }

    fn initialize(&self, id: Value, params: Option<Value>) -> JsonRpcResponse {
        let params: InitializeParams = match parse_params(params) {
            Ok(params) => params,
            Err(error) => return JsonRpcResponse::error(id, error),
        };

        let protocol_version = negotiate_protocol_version(&params.protocol_version);
        {
            let mut handshake = self.handshake.write();
            if handshake.is_some() {
                return JsonRpcResponse::error(
                    id,
                    JsonRpcError::invalid_request("Session is already initialized"),
                );
            }
            *handshake = Some(Handshake {
                protocol_version: protocol_version.to_string(),
                client_info: params.client_info.clone(),
            });
        }

        tracing::info!(
            session_id = %self.id,
            client = %params.client_info.name,
            client_version = %params.client_info.version,
            protocol_version,
            "Session initialized"
        );

        JsonRpcResponse::from_serializable(
            id,
            &InitializeResult {
                protocol_version: protocol_version.to_string(),
                capabilities: ServerCapabilities {
                    tools: Some(ToolsCapability { list_changed: false }),
                    logging: Some(json!({})),
                },
                server_info: ServerInfo {
                    name: SERVER_NAME.to_string(),
                    version: env!("CARGO_PKG_VERSION").to_string(),
                },
                instructions: Some(INSTRUCTIONS.to_string()),
            },
        )
    }

    async fn call_tool(&self, id: Value, params: Option<Value>) -> JsonRpcResponse {
        let params: CallToolParams = match parse_params(params) {
            Ok(params) => params,
            Err(error) => return JsonRpcResponse::error(id, error),
        };

        let envelope = self.adapter.invoke(&params.name, params.arguments).await;
        if let ToolEnvelope::Error { error } = &envelope {
            self.log(LogLevel::Error, json!({ "tool": params.name, "error": error }));
        }

        JsonRpcResponse::from_serializable(id, &envelope.into_call_tool_result())
    }

    fn set_log_level(&self, id: Value, params: Option<Value>) -> JsonRpcResponse {
        match parse_params::<SetLevelParams>(params) {
            Ok(params) => {
                *self.log_level.write() = params.level;
                JsonRpcResponse::success(id, json!({}))
            }
            Err(error) => JsonRpcResponse::error(id, error),
        }
    }

    /// Push a `notifications/message` event if `level` passes the client's filter
    pub fn log(&self, level: LogLevel, data: Value) {
        if level < *self.log_level.read() {
            return;
        }
        let params = LogMessageParams {
            level,
            logger: Some(SERVER_NAME.to_string()),
            data,
        };
        match serde_json::to_value(params) {
            Ok(params) => self.notify(&JsonRpcRequest::notification(methods::LOG_MESSAGE, Some(params))),
            Err(e) => tracing::warn!(session_id = %self.id, error = %e, "Failed to encode log event"),
        }
    }

    /// Queue a server-initiated message for any attached stream
    pub fn notify(&self, message: &impl Serialize) {
        let value = match serde_json::to_value(message) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(session_id = %self.id, error = %e, "Failed to encode outbound message");
                return;
            }
        };
        if self.outbound.send(value).is_err() {
            tracing::trace!(session_id = %self.id, "No stream attached, dropping message");
        }
    }

    /// Stream of server-initiated messages. Ends when the session closes.
    pub fn subscribe(&self) -> impl Stream<Item = Value> + Send + 'static {
        self.touch();
        let session_id = self.id.clone();

        BroadcastStream::new(self.outbound.subscribe())
            .filter_map(move |message| {
                let message = match message {
                    Ok(value) => Some(value),
                    Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                        tracing::warn!(session_id = %session_id, skipped, "Stream lagged, messages dropped");
                        None
                    }
                };
                future::ready(message)
            })
            .take_until(self.shutdown.clone().cancelled_owned())
    }

    /// Close the session. Only the first call has any effect: it ends attached
    /// streams and fires the close callback.
    pub fn close(&self) {
        {
            let mut state = self.state.write();
            if *state != SessionState::Open {
                return;
            }
            *state = SessionState::Closing;
        }

        self.shutdown.cancel();

        let callback = self.on_close.lock().take();
        if let Some(callback) = callback {
            callback(&self.id);
        }

        *self.state.write() = SessionState::Closed;
        tracing::info!(session_id = %self.id, "Session closed");
    }
}

impl std::fmt::Debug for SessionTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionTransport")
            .field("id", &self.id)
            .field("state", &self.state())
            .field("created_at", &self.created_at)
            .finish_non_exhaustive()
    }
}

fn parse_params<T: serde::de::DeserializeOwned>(params: Option<Value>) -> Result<T, JsonRpcError> {
    let params = params.unwrap_or(Value::Null);
    serde_json::from_value(params).map_err(|e| JsonRpcError::invalid_params(format!("Invalid params: {e}")))
}
