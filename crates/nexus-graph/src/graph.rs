//! Core graph data structure.
//!
//! The SocialGraph wraps an undirected petgraph graph and adds a key index
//! for fast lookups. It is an immutable snapshot: it only ever changes by
//! being rebuilt from the edge set, never by patching.

use crate::edge::GraphLink;
use nexus_core::{Account, AccountKey};
use petgraph::graph::{NodeIndex, UnGraph};
use petgraph::visit::EdgeRef;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// Index of an account inside one snapshot. Not stable across rebuilds.
pub type NodeId = NodeIndex;

/// Adjacency over accepted friendships.
///
/// Every known account has a node, including accounts with no friends.
/// Edges are undirected, so adjacency is symmetric by construction.
#[derive(Debug, Clone)]
pub struct SocialGraph {
    pub(crate) graph: UnGraph<Account, ()>,

    /// Maps registration keys to graph node indexes.
    key_index: HashMap<AccountKey, NodeId>,

    /// Accepted edges dropped because an endpoint is not a known account.
    skipped_edges: usize,
}

impl Default for SocialGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl SocialGraph {
    /// Creates a new empty graph.
    pub fn new() -> Self {
        Self {
            graph: UnGraph::new_undirected(),
            key_index: HashMap::new(),
            skipped_edges: 0,
        }
    }

    pub(crate) fn add_account(&mut self, account: Account) -> NodeId {
        let key = account.key.clone();
        let index = self.graph.add_node(account);
        self.key_index.insert(key, index);
        index
    }

    /// Connects two nodes unless they are already connected or identical.
    /// Returns whether an edge was added.
    pub(crate) fn connect(&mut self, a: NodeId, b: NodeId) -> bool {
        if a == b || self.graph.find_edge(a, b).is_some() {
            return false;
        }
        self.graph.add_edge(a, b, ());
        true
    }

    pub(crate) fn set_skipped_edges(&mut self, count: usize) {
        self.skipped_edges = count;
    }

    /// Gets the node index for a key.
    pub fn get_index(&self, key: &str) -> Option<NodeId> {
        self.key_index.get(key).copied()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.key_index.contains_key(key)
    }

    /// Gets an account by key.
    pub fn account(&self, key: &str) -> Option<&Account> {
        let index = self.key_index.get(key)?;
        self.graph.node_weight(*index)
    }

    /// Iterates over all accounts.
    pub fn accounts(&self) -> impl Iterator<Item = &Account> {
        self.graph.node_weights()
    }

    pub(crate) fn key_of(&self, index: NodeId) -> &AccountKey {
        &self.graph[index].key
    }

    /// Keys adjacent to `key`. Empty when the key is unknown.
    pub fn neighbors(&self, key: &str) -> BTreeSet<AccountKey> {
        match self.get_index(key) {
            Some(index) => self
                .graph
                .neighbors(index)
                .map(|n| self.key_of(n).clone())
                .collect(),
            None => BTreeSet::new(),
        }
    }

    /// Number of accepted friendships `key` holds.
    pub fn degree(&self, key: &str) -> usize {
        self.get_index(key)
            .map(|index| self.graph.neighbors(index).count())
            .unwrap_or(0)
    }

    /// Whether `a` and `b` share an accepted friendship.
    pub fn are_connected(&self, a: &str, b: &str) -> bool {
        match (self.get_index(a), self.get_index(b)) {
            (Some(a), Some(b)) => self.graph.find_edge(a, b).is_some(),
            _ => false,
        }
    }

    /// Accounts adjacent to both `a` and `b`, sorted by key.
    pub fn mutual_neighbors(&self, a: &str, b: &str) -> Vec<AccountKey> {
        let ours = self.neighbors(a);
        if ours.is_empty() {
            return Vec::new();
        }
        let theirs = self.neighbors(b);
        ours.intersection(&theirs).cloned().collect()
    }

    /// The full adjacency mapping, ordered for comparison and display.
    pub fn adjacency(&self) -> BTreeMap<AccountKey, BTreeSet<AccountKey>> {
        self.graph
            .node_indices()
            .map(|index| {
                let neighbors = self
                    .graph
                    .neighbors(index)
                    .map(|n| self.key_of(n).clone())
                    .collect();
                (self.key_of(index).clone(), neighbors)
            })
            .collect()
    }

    /// Returns the number of accounts.
    pub fn account_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Returns the number of accepted friendships.
    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Returns all friendships as key pairs for export, sorted.
    pub fn export_links(&self) -> Vec<GraphLink> {
        let mut links: Vec<GraphLink> = self
            .graph
            .edge_references()
            .map(|edge_ref| {
                let a = self.key_of(edge_ref.source());
                let b = self.key_of(edge_ref.target());
                let (source, target) = if a <= b { (a, b) } else { (b, a) };
                GraphLink {
                    source: source.clone(),
                    target: target.clone(),
                }
            })
            .collect();
        links.sort();
        links
    }
}

/// Graph statistics for the info endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphStats {
    pub account_count: usize,
    pub edge_count: usize,
    pub skipped_edges: usize,
}

impl SocialGraph {
    /// Returns graph statistics.
    pub fn stats(&self) -> GraphStats {
        GraphStats {
            account_count: self.account_count(),
            edge_count: self.edge_count(),
            skipped_edges: self.skipped_edges,
        }
    }
}
