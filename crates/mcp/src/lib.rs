//! Model Context Protocol surface: JSON-RPC types, the tool set and the
//! per-session transport.

pub mod protocol;
pub mod tools;
pub mod transport;

pub use tools::{ToolAdapter, ToolCall, ToolEnvelope, ToolError};
pub use transport::{CloseCallback, SessionState, SessionTransport};
