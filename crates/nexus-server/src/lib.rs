//! Nexus Server - WebSocket JSON-RPC front end for the social graph
//!
//! Clients send JSON-RPC 2.0 requests as text frames and receive one
//! response per request. Committed friendship transitions are pushed to
//! every connected client as notifications.
//!
//! Methods: `graph.info`, `neighbors`, `connected`, `mutual`, `recommend`,
//! `relation`, `requests`, `summary` and `friendship.request|accept|reject|unfriend`.

use nexus_graph::SocialNetwork;
use std::sync::Arc;

/// Network state shared across connections.
pub type SharedNetwork = Arc<SocialNetwork>;

mod handlers;
mod protocol;
mod server;

pub use handlers::FriendshipAction;
pub use protocol::{
    BroadcastMessage, FriendshipChangedPayload, Request, Response, RpcError, DUPLICATE_EDGE,
    INTERNAL_ERROR, INVALID_EDGE, INVALID_PARAMS, INVALID_TRANSITION, METHOD_NOT_FOUND, PARSE_ERROR,
    STORE_FAILURE,
};
pub use server::{dispatch, process_message, NexusServer, ServerConfig, ServerError, DEFAULT_PORT};
