//! WebSocket server implementation.
//!
//! Handles client connections, routes requests to handlers and fans
//! committed friendship changes out to every connected client.

use crate::handlers::{
    handle_connected, handle_friendship, handle_info, handle_mutual, handle_neighbors,
    handle_recommend, handle_relation, handle_requests, handle_summary, FriendshipAction,
};
use crate::protocol::{
    BroadcastMessage, FriendshipChangedPayload, KeyParams, PairParams, RecommendParams, Request,
    Response, TransitionParams,
};
use crate::SharedNetwork;
use futures_util::{SinkExt, StreamExt};
use nexus_graph::SocialNetwork;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::net::SocketAddr;
use thiserror::Error;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast;
use tokio_tungstenite::{accept_async, tungstenite::Message};
use tracing::{debug, error, info, warn};

pub const DEFAULT_PORT: u16 = 7432;

#[derive(Error, Debug)]
pub enum ServerError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind to.
    pub addr: SocketAddr,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: SocketAddr::from(([127, 0, 0, 1], DEFAULT_PORT)),
        }
    }
}

/// The Nexus WebSocket server.
pub struct NexusServer {
    config: ServerConfig,
    network: SharedNetwork,
    broadcast_tx: broadcast::Sender<BroadcastMessage>,
}

impl NexusServer {
    /// Creates a new server that owns the given network.
    pub fn new(network: SocialNetwork, config: ServerConfig) -> Self {
        Self::new_with_shared(config, SharedNetwork::new(network))
    }

    /// Creates a server over a network shared with other components.
    pub fn new_with_shared(config: ServerConfig, network: SharedNetwork) -> Self {
        let (broadcast_tx, _) = broadcast::channel(256);
        Self {
            config,
            network,
            broadcast_tx,
        }
    }

    /// Returns a handle to the shared network.
    pub fn network(&self) -> SharedNetwork {
        self.network.clone()
    }

    /// Returns a receiver for server-pushed notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<BroadcastMessage> {
        self.broadcast_tx.subscribe()
    }

    /// Runs the server, accepting connections forever.
    pub async fn run(&self) -> Result<(), ServerError> {
        let listener = TcpListener::bind(&self.config.addr).await?;
        info!("Nexus server listening on ws://{}", self.config.addr);

        loop {
            match listener.accept().await {
                Ok((stream, addr)) => {
                    debug!("New connection from {}", addr);
                    let network = self.network.clone();
                    let broadcast_tx = self.broadcast_tx.clone();
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(stream, addr, network, broadcast_tx).await
                        {
                            error!("Connection error from {}: {}", addr, e);
                        }
                    });
                }
                Err(e) => {
                    error!("Accept error: {}", e);
                }
            }
        }
    }
}

/// Handles a single WebSocket connection.
async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    network: SharedNetwork,
    broadcast_tx: broadcast::Sender<BroadcastMessage>,
) -> Result<(), ServerError> {
    let ws_stream = accept_async(stream).await?;
    info!("WebSocket connection established with {}", addr);

    let (mut write, mut read) = ws_stream.split();
    let mut broadcast_rx = broadcast_tx.subscribe();

    loop {
        tokio::select! {
            msg = read.next() => {
                let msg = match msg {
                    Some(Ok(m)) => m,
                    Some(Err(e)) => {
                        warn!("Message error from {}: {}", addr, e);
                        break;
                    }
                    None => break,
                };

                if msg.is_close() {
                    debug!("Client {} disconnected", addr);
                    break;
                }

                if msg.is_ping() {
                    write.send(Message::Pong(msg.into_data())).await?;
                    continue;
                }

                if msg.is_text() {
                    let text = msg.to_text().unwrap_or("");
                    let response = process_message(text, network.clone(), &broadcast_tx).await;
                    let json = serde_json::to_string(&response)?;
                    write.send(Message::Text(json)).await?;
                }
            }

            msg = broadcast_rx.recv() => {
                match msg {
                    Ok(notification) => {
                        let json = serde_json::to_string(&notification)?;
                        write.send(Message::Text(json)).await?;
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!("Client {} lagged by {} notifications", addr, n);
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        }
    }

    info!("Connection closed: {}", addr);
    Ok(())
}

/// Processes a JSON-RPC message and returns a response.
///
/// Store access blocks, so dispatch runs on the blocking pool.
pub async fn process_message(
    text: &str,
    network: SharedNetwork,
    broadcast_tx: &broadcast::Sender<BroadcastMessage>,
) -> Response {
    let request: Request = match serde_json::from_str(text) {
        Ok(r) => r,
        Err(_) => return Response::parse_error(),
    };

    let id = request.id.clone();
    debug!("Processing method: {}", request.method);

    let outcome = tokio::task::spawn_blocking(move || dispatch(&network, request)).await;
    let (response, notification) = match outcome {
        Ok(done) => done,
        Err(e) => {
            error!("Handler task failed: {}", e);
            return Response::error(id, crate::protocol::INTERNAL_ERROR, "Handler failed");
        }
    };

    if let Some(notification) = notification {
        // No subscribers is not an error
        let _ = broadcast_tx.send(notification);
    }
    response
}

/// Routes a parsed request to its handler.
pub fn dispatch(network: &SocialNetwork, request: Request) -> (Response, Option<BroadcastMessage>) {
    let id = request.id;
    let method = request.method.as_str();

    let response = match method {
        "graph.info" => handle_info(network, id),

        "neighbors" => with_params(id, request.params, |id, p: KeyParams| {
            handle_neighbors(network, id, p)
        }),

        "connected" => with_params(id, request.params, |id, p: PairParams| {
            handle_connected(network, id, p)
        }),

        "mutual" => with_params(id, request.params, |id, p: PairParams| {
            handle_mutual(network, id, p)
        }),

        "recommend" => with_params(id, request.params, |id, p: RecommendParams| {
            handle_recommend(network, id, p)
        }),

        "relation" => with_params(id, request.params, |id, p: PairParams| {
            handle_relation(network, id, p)
        }),

        "requests" => with_params(id, request.params, |id, p: KeyParams| {
            handle_requests(network, id, p)
        }),

        "summary" => with_params(id, request.params, |id, p: KeyParams| {
            handle_summary(network, id, p)
        }),

        _ => match FriendshipAction::from_method(method) {
            Some(action) => {
                let params = match serde_json::from_value::<TransitionParams>(request.params) {
                    Ok(p) => p,
                    Err(e) => return (Response::invalid_params(id, e.to_string()), None),
                };
                let (response, changed) = handle_friendship(network, id, action, params);
                let notification = changed.map(|friendship| {
                    BroadcastMessage::FriendshipChanged(FriendshipChangedPayload {
                        action: action.as_str().to_string(),
                        friendship,
                        exists: action.keeps_edge(),
                    })
                });
                return (response, notification);
            }
            None => Response::method_not_found(id, method),
        },
    };

    (response, None)
}

fn with_params<P, F>(id: Option<Value>, params: Value, handler: F) -> Response
where
    P: DeserializeOwned,
    F: FnOnce(Option<Value>, P) -> Response,
{
    match serde_json::from_value::<P>(params) {
        Ok(params) => handler(id, params),
        Err(e) => Response::invalid_params(id, e.to_string()),
    }
}
