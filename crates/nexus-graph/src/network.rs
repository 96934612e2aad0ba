//! The query and mutation surface of the engine.
//!
//! [`SocialNetwork`] ties a store to the lifecycle manager and serves every
//! read from a [`NetworkSnapshot`]. Snapshots are cached by the revision
//! pair they were built from; any committed write moves a revision and the
//! next read builds a fresh snapshot instead of patching the old one.

use crate::edge::{GraphExport, GraphNode, NodeRole};
use crate::graph::SocialGraph;
use crate::lifecycle::{FriendshipError, FriendshipManager};
use crate::recommend::{Recommendation, RecommendationWeights};
use crate::store::{AccountSource, FriendshipStore, StoreError};
use nexus_core::{Account, AccountKey, Friendship, Pair};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, PoisonError, RwLock};
use tracing::debug;

/// How one account stands with another.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Relation {
    /// Both keys name the same account.
    Myself,
    Friends,
    /// The viewer sent a request that is still pending.
    RequestSent,
    /// The other account sent the viewer a pending request.
    RequestReceived,
    /// No friendship or pending request between them.
    Strangers,
}

/// Dashboard counters for one account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionSummary {
    pub friends: usize,
    pub incoming_requests: usize,
    pub outgoing_requests: usize,
    /// Friends as a percentage of all accounts.
    pub reach_percent: f64,
}

/// Everything a read needs, built from one revision of the store.
#[derive(Debug)]
pub struct NetworkSnapshot {
    graph: SocialGraph,
    /// Pending requests keyed by pair.
    pending: HashMap<Pair, Friendship>,
    revision: (u64, u64),
}

impl NetworkSnapshot {
    /// Builds a snapshot from full account and edge sets.
    pub fn build(
        accounts: Vec<Account>,
        edges: Vec<Friendship>,
        revision: (u64, u64),
    ) -> Self {
        let graph = SocialGraph::build(accounts, &edges);
        let pending = edges
            .into_iter()
            .filter(|edge| !edge.is_accepted())
            .map(|edge| (edge.pair().clone(), edge))
            .collect();

        Self {
            graph,
            pending,
            revision,
        }
    }

    pub fn graph(&self) -> &SocialGraph {
        &self.graph
    }

    /// Account and edge revisions this snapshot reflects.
    pub fn revision(&self) -> (u64, u64) {
        self.revision
    }

    pub fn relation(&self, viewer: &str, other: &str) -> Relation {
        let Some(pair) = Pair::new(viewer, other) else {
            return Relation::Myself;
        };

        if self.graph.are_connected(viewer, other) {
            return Relation::Friends;
        }

        match self.pending.get(&pair).and_then(Friendship::requester) {
            Some(requester) if requester.as_str() == viewer => Relation::RequestSent,
            Some(_) => Relation::RequestReceived,
            None => Relation::Strangers,
        }
    }

    /// Senders of pending requests addressed to `key`, sorted.
    pub fn incoming_requests(&self, key: &str) -> Vec<AccountKey> {
        self.requests(key, |edge| edge.recipient())
            .filter_map(|edge| edge.requester().cloned())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Recipients of pending requests sent by `key`, sorted.
    pub fn outgoing_requests(&self, key: &str) -> Vec<AccountKey> {
        self.requests(key, |edge| edge.requester())
            .filter_map(|edge| edge.recipient().cloned())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    fn requests<'a>(
        &'a self,
        key: &'a str,
        side: impl Fn(&Friendship) -> Option<&AccountKey> + 'a,
    ) -> impl Iterator<Item = &'a Friendship> + 'a {
        self.pending
            .values()
            .filter(move |edge| side(edge).map(AccountKey::as_str) == Some(key))
    }

    pub fn summary(&self, key: &str) -> ConnectionSummary {
        let friends = self.graph.degree(key);
        let total = self.graph.account_count();
        let reach_percent = if friends > 0 && total > 0 {
            friends as f64 * 100.0 / total as f64
        } else {
            0.0
        };

        ConnectionSummary {
            friends,
            incoming_requests: self.incoming_requests(key).len(),
            outgoing_requests: self.outgoing_requests(key).len(),
            reach_percent,
        }
    }

    /// Exports every account and accepted friendship. With a viewer, each
    /// node is tagged with its role relative to that viewer.
    pub fn export(&self, viewer: Option<&str>, weights: &RecommendationWeights) -> GraphExport {
        let (friends, recommended): (BTreeSet<AccountKey>, BTreeSet<AccountKey>) = match viewer {
            Some(viewer) => (
                self.graph.neighbors(viewer),
                self.graph
                    .recommendations(viewer, weights)
                    .into_iter()
                    .map(|rec| rec.key)
                    .collect(),
            ),
            None => (BTreeSet::new(), BTreeSet::new()),
        };

        let mut nodes: Vec<GraphNode> = self
            .graph
            .accounts()
            .map(|account| {
                let role = if Some(account.key.as_str()) == viewer {
                    NodeRole::Me
                } else if friends.contains(&account.key) {
                    NodeRole::Friend
                } else if recommended.contains(&account.key) {
                    NodeRole::Recommended
                } else {
                    NodeRole::Other
                };
                GraphNode {
                    key: account.key.clone(),
                    name: account.name.clone(),
                    department: account.department.clone(),
                    role,
                }
            })
            .collect();
        nodes.sort_by(|a, b| a.key.cmp(&b.key));

        GraphExport {
            viewer: viewer
                .filter(|v| self.graph.contains(v))
                .map(AccountKey::from),
            stats: self.graph.stats(),
            nodes,
            links: self.graph.export_links(),
        }
    }
}

struct CachedSnapshot {
    revision: (u64, u64),
    snapshot: Arc<NetworkSnapshot>,
}

/// The social graph engine over a store.
pub struct SocialNetwork {
    accounts: Arc<dyn AccountSource>,
    edges: Arc<dyn FriendshipStore>,
    lifecycle: FriendshipManager,
    weights: RecommendationWeights,
    cache: RwLock<Option<CachedSnapshot>>,
}

impl SocialNetwork {
    /// Creates an engine over a store that provides both accounts and edges.
    pub fn new<S>(store: Arc<S>) -> Self
    where
        S: AccountSource + FriendshipStore + 'static,
    {
        Self::from_parts(store.clone(), store)
    }

    /// Creates an engine over separate account and friendship sources.
    pub fn from_parts(accounts: Arc<dyn AccountSource>, edges: Arc<dyn FriendshipStore>) -> Self {
        Self {
            lifecycle: FriendshipManager::new(accounts.clone(), edges.clone()),
            accounts,
            edges,
            weights: RecommendationWeights::default(),
            cache: RwLock::new(None),
        }
    }

    pub fn with_weights(mut self, weights: RecommendationWeights) -> Self {
        self.weights = weights;
        self
    }

    pub fn weights(&self) -> &RecommendationWeights {
        &self.weights
    }

    /// Returns a snapshot reflecting the latest committed store state.
    pub fn snapshot(&self) -> Result<Arc<NetworkSnapshot>, StoreError> {
        let current = (
            self.accounts.accounts_revision()?,
            self.edges.edges_revision()?,
        );

        {
            let cache = self.cache.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(cached) = cache.as_ref().filter(|c| c.revision == current) {
                return Ok(cached.snapshot.clone());
            }
        }

        let accounts = self.accounts.list_accounts()?;
        let edges = self.edges.list_edges()?;
        let revision = (current.0, edges.revision);
        let snapshot = Arc::new(NetworkSnapshot::build(accounts, edges.edges, revision));
        debug!(
            "Rebuilt snapshot at revision {:?}: {} accounts, {} friendships",
            revision,
            snapshot.graph.account_count(),
            snapshot.graph.edge_count()
        );

        let mut cache = self.cache.write().unwrap_or_else(PoisonError::into_inner);
        *cache = Some(CachedSnapshot {
            revision,
            snapshot: snapshot.clone(),
        });
        Ok(snapshot)
    }

    /// Friends of `key`, sorted. Empty for an unknown key.
    pub fn neighbors(&self, key: &str) -> Result<Vec<AccountKey>, StoreError> {
        Ok(self.snapshot()?.graph.neighbors(key).into_iter().collect())
    }

    pub fn are_connected(&self, a: &str, b: &str) -> Result<bool, StoreError> {
        Ok(self.snapshot()?.graph.are_connected(a, b))
    }

    /// Friends shared by `a` and `b`, sorted.
    pub fn mutual_friends(&self, a: &str, b: &str) -> Result<Vec<AccountKey>, StoreError> {
        Ok(self.snapshot()?.graph.mutual_neighbors(a, b))
    }

    /// Ranked candidates for `key` using the configured weights.
    pub fn recommendations(&self, key: &str) -> Result<Vec<Recommendation>, StoreError> {
        Ok(self.snapshot()?.graph.recommendations(key, &self.weights))
    }

    pub fn relation(&self, viewer: &str, other: &str) -> Result<Relation, StoreError> {
        Ok(self.snapshot()?.relation(viewer, other))
    }

    pub fn incoming_requests(&self, key: &str) -> Result<Vec<AccountKey>, StoreError> {
        Ok(self.snapshot()?.incoming_requests(key))
    }

    pub fn outgoing_requests(&self, key: &str) -> Result<Vec<AccountKey>, StoreError> {
        Ok(self.snapshot()?.outgoing_requests(key))
    }

    pub fn summary(&self, key: &str) -> Result<ConnectionSummary, StoreError> {
        Ok(self.snapshot()?.summary(key))
    }

    pub fn export(&self, viewer: Option<&str>) -> Result<GraphExport, StoreError> {
        Ok(self.snapshot()?.export(viewer, &self.weights))
    }

    pub fn request(&self, from: &str, to: &str) -> Result<Friendship, FriendshipError> {
        self.lifecycle.request(from, to)
    }

    pub fn accept(&self, actor: &str, requester: &str) -> Result<Friendship, FriendshipError> {
        self.lifecycle.accept(actor, requester)
    }

    pub fn reject(&self, actor: &str, requester: &str) -> Result<Friendship, FriendshipError> {
        self.lifecycle.reject(actor, requester)
    }

    pub fn unfriend(&self, actor: &str, other: &str) -> Result<Friendship, FriendshipError> {
        self.lifecycle.unfriend(actor, other)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{MemoryStore, SledStore};
    use tempfile::tempdir;

    fn campus() -> (Arc<MemoryStore>, SocialNetwork) {
        let store = Arc::new(MemoryStore::with_accounts(vec![
            Account::new("A", "Amy", "CS"),
            Account::new("B", "Bob", "CS"),
            Account::new("C", "Cat", "CS"),
            Account::new("D", "Dan", "CS"),
        ]));
        (store.clone(), SocialNetwork::new(store))
    }

    fn befriend(network: &SocialNetwork, a: &str, b: &str) {
        network.request(a, b).unwrap();
        network.accept(b, a).unwrap();
    }

    fn keys(list: &[&str]) -> Vec<AccountKey> {
        list.iter().map(|k| AccountKey::from(*k)).collect()
    }

    #[test]
    fn test_scenario_ranking() {
        let (_store, network) = campus();
        befriend(&network, "A", "B");
        befriend(&network, "B", "C");

        let recs = network.recommendations("A").unwrap();
        let ranked: Vec<&str> = recs.iter().map(|r| r.key.as_str()).collect();
        assert_eq!(ranked, vec!["C", "D"]);
        assert_eq!(recs[0].mutual_friends, keys(&["B"]));
        assert_eq!(recs[1].score, 5);
    }

    #[test]
    fn test_reads_follow_writes() {
        let (_store, network) = campus();
        assert!(!network.are_connected("A", "B").unwrap());

        befriend(&network, "A", "B");
        assert!(network.are_connected("A", "B").unwrap());
        assert!(network.are_connected("B", "A").unwrap());

        network.unfriend("A", "B").unwrap();
        assert!(!network.are_connected("A", "B").unwrap());
        assert!(network.neighbors("A").unwrap().is_empty());
    }

    #[test]
    fn test_snapshot_is_cached_per_revision() {
        let (store, network) = campus();

        let first = network.snapshot().unwrap();
        let second = network.snapshot().unwrap();
        assert!(Arc::ptr_eq(&first, &second));

        network.request("A", "B").unwrap();
        let third = network.snapshot().unwrap();
        assert!(!Arc::ptr_eq(&first, &third));
        assert_eq!(third.revision(), (1, 1));

        store.import_accounts(vec![Account::new("E", "Eve", "Math")]);
        let fourth = network.snapshot().unwrap();
        assert_eq!(fourth.revision(), (2, 1));
        assert!(fourth.graph().contains("E"));
    }

    #[test]
    fn test_mutual_friends() {
        let (_store, network) = campus();
        befriend(&network, "A", "B");
        befriend(&network, "C", "B");
        befriend(&network, "A", "D");
        befriend(&network, "C", "D");

        assert_eq!(network.mutual_friends("A", "C").unwrap(), keys(&["B", "D"]));
        assert!(network.mutual_friends("A", "ghost").unwrap().is_empty());
    }

    #[test]
    fn test_relation() {
        let (_store, network) = campus();
        network.request("A", "B").unwrap();
        befriend(&network, "A", "C");

        assert_eq!(network.relation("A", "A").unwrap(), Relation::Myself);
        assert_eq!(network.relation("A", "B").unwrap(), Relation::RequestSent);
        assert_eq!(network.relation("B", "A").unwrap(), Relation::RequestReceived);
        assert_eq!(network.relation("C", "A").unwrap(), Relation::Friends);
        assert_eq!(network.relation("A", "D").unwrap(), Relation::Strangers);
    }

    #[test]
    fn test_pending_listings() {
        let (_store, network) = campus();
        network.request("C", "A").unwrap();
        network.request("B", "A").unwrap();
        network.request("A", "D").unwrap();

        assert_eq!(network.incoming_requests("A").unwrap(), keys(&["B", "C"]));
        assert_eq!(network.outgoing_requests("A").unwrap(), keys(&["D"]));
        assert_eq!(network.incoming_requests("D").unwrap(), keys(&["A"]));
        assert!(network.outgoing_requests("ghost").unwrap().is_empty());
    }

    #[test]
    fn test_summary() {
        let (_store, network) = campus();
        befriend(&network, "A", "B");
        network.request("C", "A").unwrap();

        let summary = network.summary("A").unwrap();
        assert_eq!(summary.friends, 1);
        assert_eq!(summary.incoming_requests, 1);
        assert_eq!(summary.outgoing_requests, 0);
        assert!((summary.reach_percent - 25.0).abs() < f64::EPSILON);

        assert_eq!(network.summary("D").unwrap().reach_percent, 0.0);
    }

    #[test]
    fn test_export_roles() {
        let (_store, network) = campus();
        befriend(&network, "A", "B");
        befriend(&network, "B", "C");

        let export = network.export(Some("A")).unwrap();
        let roles: Vec<(&str, NodeRole)> = export
            .nodes
            .iter()
            .map(|n| (n.key.as_str(), n.role))
            .collect();
        assert_eq!(
            roles,
            vec![
                ("A", NodeRole::Me),
                ("B", NodeRole::Friend),
                ("C", NodeRole::Recommended),
                ("D", NodeRole::Recommended),
            ]
        );
        assert_eq!(export.links.len(), 2);
        assert_eq!(export.viewer, Some(AccountKey::from("A")));

        let anonymous = network.export(None).unwrap();
        assert!(anonymous.nodes.iter().all(|n| n.role == NodeRole::Other));
    }

    #[test]
    fn test_custom_weights() {
        let (_store, network) = campus();
        let network = network.with_weights(RecommendationWeights {
            mutual_friend: 1,
            same_department: 0,
        });
        befriend(&network, "A", "B");
        befriend(&network, "B", "C");

        let recs = network.recommendations("A").unwrap();
        assert_eq!(recs.len(), 1);
        assert_eq!(recs[0].score, 1);
    }

    #[test]
    fn test_over_sled_store() {
        let dir = tempdir().unwrap();
        let store = Arc::new(SledStore::open(dir.path()).unwrap());
        store
            .import_accounts(vec![
                Account::new("a", "Amy", "CS"),
                Account::new("b", "Bob", "Math"),
            ])
            .unwrap();

        let network = SocialNetwork::new(store);
        network.request("a", "b").unwrap();
        network.accept("b", "a").unwrap();

        assert!(network.are_connected("a", "b").unwrap());
        assert_eq!(network.neighbors("b").unwrap(), keys(&["a"]));
    }

    #[test]
    fn test_sled_snapshot_follows_later_writes() {
        let dir = tempdir().unwrap();
        let store = Arc::new(SledStore::open(dir.path()).unwrap());
        store
            .import_accounts(vec![
                Account::new("a", "Amy", "CS"),
                Account::new("b", "Bob", "CS"),
            ])
            .unwrap();

        let network = SocialNetwork::new(store.clone());
        network.request("a", "b").unwrap();
        let before = network.snapshot().unwrap();
        assert_eq!(before.revision(), (1, 1));

        store
            .import_accounts(vec![Account::new("x", "Xia", "CS")])
            .unwrap();
        store.replace_edges(1, Vec::new()).unwrap();

        let after = network.snapshot().unwrap();
        assert_eq!(after.revision(), (2, 2));
        assert!(after.graph().contains("x"));
        assert!(network.incoming_requests("b").unwrap().is_empty());
    }
}
