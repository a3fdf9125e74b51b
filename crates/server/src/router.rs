// Session routing: decides which transport handles an inbound request

use crate::registry::SessionRegistry;
use routegate_core::SessionId;
use routegate_mcp::protocol::JsonRpcPayload;
use routegate_mcp::SessionTransport;
use std::sync::Arc;

/// What the client is asking for
#[derive(Debug, Clone, Copy)]
pub enum Inbound<'a> {
    /// POST: a message or batch
    Message(&'a JsonRpcPayload),
    /// GET: attach to the server-to-client stream
    Stream,
    /// DELETE: terminate the session
    Close,
}

pub enum RouteDecision {
    Existing(Arc<SessionTransport>),
    New(SessionId, Arc<SessionTransport>),
}

impl RouteDecision {
    #[cfg(test)]
    pub fn transport(&self) -> &Arc<SessionTransport> {
        match self {
            Self::Existing(transport) | Self::New(_, transport) => transport,
        }
    }

    pub fn into_transport(self) -> Arc<SessionTransport> {
        match self {
            Self::Existing(transport) | Self::New(_, transport) => transport,
        }
    }

    pub fn is_new(&self) -> bool {
        matches!(self, Self::New(..))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RouteError {
    #[error("No valid session ID provided")]
    MissingSession,

    #[error("Session not found: {0}")]
    UnknownSession(SessionId),
}

/// Route one request.
///
/// A present token always takes the existing-session path, even for an
/// initialize request. Only a token-less POST carrying an initialize request
/// creates a session.
pub fn route(
    registry: &SessionRegistry,
    inbound: Inbound<'_>,
    token: Option<&str>,
) -> Result<RouteDecision, RouteError> {
    if let Some(token) = token {
        let id = SessionId::from(token);
        return match registry.lookup(&id) {
            Some(transport) => Ok(RouteDecision::Existing(transport)),
            None => {
                tracing::debug!(session_id = %id, "Rejected request for unknown session");
                Err(RouteError::UnknownSession(id))
            }
        };
    }

    match inbound {
        Inbound::Message(payload) if payload.is_initialize_request() => {
            let (id, transport) = registry.create();
            Ok(RouteDecision::New(id, transport))
        }
        _ => {
            tracing::debug!(?inbound, "Rejected request without session");
            Err(RouteError::MissingSession)
        }
    }
}
