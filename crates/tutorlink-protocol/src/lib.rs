//! # Tutorlink Protocol
//!
//! Wire-level types shared by every Tutorlink crate:
//!
//! - **JSON-RPC**: the `{jsonrpc, id, method, params}` envelope sent to the
//!   capability server's command endpoint and the `{result}` / `{error}`
//!   replies it produces, either inline or over the session's event stream.
//! - **Tool results**: [`ToolCallResult`], the normalized outcome of a
//!   `tools/call` exchange.
//! - **Errors**: the [`Error`] taxonomy used from the handshake up to the
//!   typed tool facade.
//!
//! ```rust
//! use tutorlink_protocol::{CorrelationId, JsonRpcRequest};
//!
//! let request = JsonRpcRequest::new(CorrelationId(7), "tools/call", None);
//! let wire = serde_json::to_value(&request).unwrap();
//! assert_eq!(wire["jsonrpc"], "2.0");
//! assert_eq!(wire["id"], 7);
//! ```

#![warn(missing_docs)]

pub mod error;
pub mod jsonrpc;
pub mod tool_result;

pub use error::{Error, ErrorKind, Result};
pub use jsonrpc::{
    CorrelationId, JSONRPC_VERSION, JsonRpcError, JsonRpcMessage, JsonRpcNotification,
    JsonRpcRequest, JsonRpcResponse, JsonRpcResponsePayload, JsonRpcVersion,
};
pub use tool_result::ToolCallResult;

/// Protocol version announced during `initialize`.
pub const PROTOCOL_VERSION: &str = "2024-11-05";

/// Client name announced during `initialize`.
pub const CLIENT_NAME: &str = "tutorlink";

/// Crate version, used for the client info block and the default user agent.
pub const CLIENT_VERSION: &str = env!("CARGO_PKG_VERSION");
