//! Request handlers for protocol methods.
//!
//! Handlers are synchronous: every read goes through the cached snapshot and
//! every write through the lifecycle manager, both of which may touch the
//! store. The server runs them on the blocking pool.

use crate::protocol::{KeyParams, PairParams, RecommendParams, Response, TransitionParams};
use nexus_core::Friendship;
use nexus_graph::{FriendshipError, Relation, SocialNetwork};
use serde::Serialize;
use serde_json::Value;
use std::time::Instant;
use tracing::debug;

/// Handles the graph.info method.
pub fn handle_info(network: &SocialNetwork, id: Option<Value>) -> Response {
    let snapshot = match network.snapshot() {
        Ok(s) => s,
        Err(e) => return Response::store_error(id, &e),
    };
    let stats = snapshot.graph().stats();
    let (accounts_rev, edges_rev) = snapshot.revision();

    #[derive(Serialize)]
    #[serde(rename_all = "camelCase")]
    struct InfoResult {
        account_count: usize,
        edge_count: usize,
        skipped_edges: usize,
        accounts_revision: u64,
        edges_revision: u64,
        version: &'static str,
    }

    Response::success(
        id,
        InfoResult {
            account_count: stats.account_count,
            edge_count: stats.edge_count,
            skipped_edges: stats.skipped_edges,
            accounts_revision: accounts_rev,
            edges_revision: edges_rev,
            version: env!("CARGO_PKG_VERSION"),
        },
    )
}

/// Handles the neighbors method.
pub fn handle_neighbors(network: &SocialNetwork, id: Option<Value>, params: KeyParams) -> Response {
    match network.neighbors(&params.key) {
        Ok(friends) => Response::success(id, friends),
        Err(e) => Response::store_error(id, &e),
    }
}

/// Handles the connected method.
pub fn handle_connected(
    network: &SocialNetwork,
    id: Option<Value>,
    params: PairParams,
) -> Response {
    match network.are_connected(&params.a, &params.b) {
        Ok(connected) => Response::success(id, connected),
        Err(e) => Response::store_error(id, &e),
    }
}

/// Handles the mutual method.
pub fn handle_mutual(network: &SocialNetwork, id: Option<Value>, params: PairParams) -> Response {
    match network.mutual_friends(&params.a, &params.b) {
        Ok(mutual) => Response::success(id, mutual),
        Err(e) => Response::store_error(id, &e),
    }
}

/// Handles the recommend method.
pub fn handle_recommend(
    network: &SocialNetwork,
    id: Option<Value>,
    params: RecommendParams,
) -> Response {
    let start = Instant::now();

    let mut recs = match network.recommendations(&params.key) {
        Ok(r) => r,
        Err(e) => return Response::store_error(id, &e),
    };
    let total = recs.len();
    if let Some(limit) = params.limit {
        recs.truncate(limit);
    }

    #[derive(Serialize)]
    #[serde(rename_all = "camelCase")]
    struct RecommendResult {
        key: String,
        recommendations: Vec<nexus_graph::Recommendation>,
        total_candidates: usize,
        query_time_ms: u64,
    }

    debug!("Recommend for {}: {} of {} candidates", params.key, recs.len(), total);

    Response::success(
        id,
        RecommendResult {
            key: params.key,
            recommendations: recs,
            total_candidates: total,
            query_time_ms: start.elapsed().as_millis() as u64,
        },
    )
}

/// Handles the relation method. `a` is the viewer.
pub fn handle_relation(network: &SocialNetwork, id: Option<Value>, params: PairParams) -> Response {
    #[derive(Serialize)]
    struct RelationResult {
        relation: Relation,
    }

    match network.relation(&params.a, &params.b) {
        Ok(relation) => Response::success(id, RelationResult { relation }),
        Err(e) => Response::store_error(id, &e),
    }
}

/// Handles the requests method.
pub fn handle_requests(network: &SocialNetwork, id: Option<Value>, params: KeyParams) -> Response {
    let snapshot = match network.snapshot() {
        Ok(s) => s,
        Err(e) => return Response::store_error(id, &e),
    };

    #[derive(Serialize)]
    struct RequestsResult {
        incoming: Vec<nexus_core::AccountKey>,
        outgoing: Vec<nexus_core::AccountKey>,
    }

    Response::success(
        id,
        RequestsResult {
            incoming: snapshot.incoming_requests(&params.key),
            outgoing: snapshot.outgoing_requests(&params.key),
        },
    )
}

/// Handles the summary method.
pub fn handle_summary(network: &SocialNetwork, id: Option<Value>, params: KeyParams) -> Response {
    match network.summary(&params.key) {
        Ok(summary) => Response::success(id, summary),
        Err(e) => Response::store_error(id, &e),
    }
}

/// The `friendship.*` actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FriendshipAction {
    Request,
    Accept,
    Reject,
    Unfriend,
}

impl FriendshipAction {
    pub fn from_method(method: &str) -> Option<Self> {
        match method {
            "friendship.request" => Some(Self::Request),
            "friendship.accept" => Some(Self::Accept),
            "friendship.reject" => Some(Self::Reject),
            "friendship.unfriend" => Some(Self::Unfriend),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Request => "request",
            Self::Accept => "accept",
            Self::Reject => "reject",
            Self::Unfriend => "unfriend",
        }
    }

    /// Whether the edge survives a successful transition.
    pub fn keeps_edge(&self) -> bool {
        matches!(self, Self::Request | Self::Accept)
    }

    pub fn apply(
        &self,
        network: &SocialNetwork,
        params: &TransitionParams,
    ) -> Result<Friendship, FriendshipError> {
        let (actor, other) = (params.actor.as_str(), params.other.as_str());
        match self {
            Self::Request => network.request(actor, other),
            Self::Accept => network.accept(actor, other),
            Self::Reject => network.reject(actor, other),
            Self::Unfriend => network.unfriend(actor, other),
        }
    }
}

/// Handles the friendship.* methods.
///
/// Returns the committed edge alongside the response so the caller can
/// broadcast it.
pub fn handle_friendship(
    network: &SocialNetwork,
    id: Option<Value>,
    action: FriendshipAction,
    params: TransitionParams,
) -> (Response, Option<Friendship>) {
    debug!(
        "friendship.{} by {} on {}",
        action.as_str(),
        params.actor,
        params.other
    );

    #[derive(Serialize)]
    struct TransitionResult<'a> {
        friendship: &'a Friendship,
        exists: bool,
    }

    match action.apply(network, &params) {
        Ok(friendship) => {
            let response = Response::success(
                id,
                TransitionResult {
                    friendship: &friendship,
                    exists: action.keeps_edge(),
                },
            );
            (response, Some(friendship))
        }
        Err(e) => (Response::friendship_error(id, &e), None),
    }
}
