//! JSON-RPC 2.0 message types.
//!
//! Requests arrive as WebSocket text frames; every request gets exactly one
//! response frame. Graph changes are additionally pushed to every client as
//! [`BroadcastMessage`] frames, which carry no `jsonrpc` envelope.

use nexus_core::Friendship;
use nexus_graph::{ErrorKind, FriendshipError, StoreError};
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const PARSE_ERROR: i32 = -32700;
pub const METHOD_NOT_FOUND: i32 = -32601;
pub const INVALID_PARAMS: i32 = -32602;
pub const INTERNAL_ERROR: i32 = -32603;
pub const INVALID_EDGE: i32 = -32010;
pub const DUPLICATE_EDGE: i32 = -32011;
pub const INVALID_TRANSITION: i32 = -32012;
pub const STORE_FAILURE: i32 = -32020;

/// An incoming request.
#[derive(Debug, Clone, Deserialize)]
pub struct Request {
    #[serde(default)]
    pub jsonrpc: String,
    #[serde(default)]
    pub id: Option<Value>,
    pub method: String,
    #[serde(default)]
    pub params: Value,
}

/// An outgoing response. Exactly one of `result` and `error` is set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    pub jsonrpc: String,
    pub id: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcError {
    pub code: i32,
    pub message: String,
}

impl Response {
    pub fn success(id: Option<Value>, result: impl Serialize) -> Self {
        match serde_json::to_value(result) {
            Ok(value) => Self {
                jsonrpc: "2.0".to_string(),
                id,
                result: Some(value),
                error: None,
            },
            Err(e) => Self::error(id, INTERNAL_ERROR, format!("Unserializable result: {}", e)),
        }
    }

    pub fn error(id: Option<Value>, code: i32, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: None,
            error: Some(RpcError {
                code,
                message: message.into(),
            }),
        }
    }

    pub fn parse_error() -> Self {
        Self::error(None, PARSE_ERROR, "Parse error")
    }

    pub fn method_not_found(id: Option<Value>, method: &str) -> Self {
        Self::error(id, METHOD_NOT_FOUND, format!("Method not found: {}", method))
    }

    pub fn invalid_params(id: Option<Value>, message: impl Into<String>) -> Self {
        Self::error(id, INVALID_PARAMS, message)
    }

    pub fn store_error(id: Option<Value>, err: &StoreError) -> Self {
        Self::error(id, STORE_FAILURE, err.to_string())
    }

    pub fn friendship_error(id: Option<Value>, err: &FriendshipError) -> Self {
        let code = match err.kind() {
            ErrorKind::InvalidEdge => INVALID_EDGE,
            ErrorKind::DuplicateEdge => DUPLICATE_EDGE,
            ErrorKind::InvalidTransition => INVALID_TRANSITION,
            ErrorKind::Store => STORE_FAILURE,
        };
        Self::error(id, code, err.to_string())
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

/// Params naming one account.
#[derive(Debug, Clone, Deserialize)]
pub struct KeyParams {
    pub key: String,
}

/// Params naming two accounts, in no particular role.
#[derive(Debug, Clone, Deserialize)]
pub struct PairParams {
    pub a: String,
    pub b: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RecommendParams {
    pub key: String,
    #[serde(default)]
    pub limit: Option<usize>,
}

/// Params for the `friendship.*` methods.
///
/// `actor` performs the action; `other` is the recipient of a request, the
/// requester being answered, or the friend being removed.
#[derive(Debug, Clone, Deserialize)]
pub struct TransitionParams {
    pub actor: String,
    pub other: String,
}

/// Server-pushed notifications.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", content = "payload")]
pub enum BroadcastMessage {
    /// A lifecycle transition was committed.
    FriendshipChanged(FriendshipChangedPayload),
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FriendshipChangedPayload {
    /// One of `request`, `accept`, `reject`, `unfriend`.
    pub action: String,
    /// The edge after the transition, or the removed edge.
    pub friendship: Friendship,
    /// False when the transition deleted the edge.
    pub exists: bool,
}
