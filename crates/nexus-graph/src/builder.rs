//! Graph builder for constructing a social graph snapshot.
//!
//! The builder takes accounts and friendship records and resolves the
//! accepted ones into graph edges. It always starts from an empty graph,
//! so the result depends only on what was passed in.

use crate::graph::{NodeId, SocialGraph};
use nexus_core::{Account, AccountKey, Friendship};
use tracing::{debug, warn};

/// Builds a SocialGraph from accounts and friendships.
///
/// The builder handles the two-pass process:
/// 1. Add all accounts as nodes
/// 2. Resolve accepted friendships into edges
pub struct GraphBuilder {
    graph: SocialGraph,
    /// Accepted pairs waiting for `resolve_edges`.
    pending_links: Vec<(AccountKey, AccountKey)>,
}

impl Default for GraphBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl GraphBuilder {
    /// Creates a new builder.
    pub fn new() -> Self {
        Self {
            graph: SocialGraph::new(),
            pending_links: Vec::new(),
        }
    }

    /// Adds accounts as nodes. Repeated keys keep the first account.
    ///
    /// Accounts are inserted in key order so two builds over the same input
    /// produce the same node layout.
    pub fn add_accounts(&mut self, mut accounts: Vec<Account>) {
        accounts.sort_by(|a, b| a.key.cmp(&b.key));

        for account in accounts {
            if self.graph.contains(account.key.as_str()) {
                debug!("Ignoring repeated account {}", account.key);
                continue;
            }
            self.graph.add_account(account);
        }
    }

    /// Queues the accepted friendships among `edges`. Pending requests do
    /// not contribute to adjacency and are dropped here.
    pub fn add_friendships<'a>(&mut self, edges: impl IntoIterator<Item = &'a Friendship>) {
        for edge in edges {
            if edge.is_accepted() {
                let pair = edge.pair();
                self.pending_links
                    .push((pair.low().clone(), pair.high().clone()));
            }
        }
    }

    /// Resolves queued friendships into edges.
    ///
    /// Friendships naming an account the builder does not know are skipped
    /// and counted in the graph statistics.
    pub fn resolve_edges(&mut self) {
        let mut skipped = 0usize;

        for (a, b) in std::mem::take(&mut self.pending_links) {
            let ends: Option<(NodeId, NodeId)> = self
                .graph
                .get_index(a.as_str())
                .zip(self.graph.get_index(b.as_str()));

            match ends {
                Some((from, to)) => {
                    if !self.graph.connect(from, to) {
                        debug!("Ignoring repeated friendship {} - {}", a, b);
                    }
                }
                None => {
                    debug!("Friendship {} - {} references an unknown account", a, b);
                    skipped += 1;
                }
            }
        }

        if skipped > 0 {
            warn!(
                "Skipped {} accepted friendships referencing unknown accounts",
                skipped
            );
        }
        self.graph.set_skipped_edges(skipped);
    }

    /// Finishes building and returns the graph.
    pub fn build(mut self) -> SocialGraph {
        self.resolve_edges();
        self.graph
    }
}

impl SocialGraph {
    /// Builds a snapshot from a full account set and edge set.
    pub fn build(accounts: Vec<Account>, edges: &[Friendship]) -> Self {
        let mut builder = GraphBuilder::new();
        builder.add_accounts(accounts);
        builder.add_friendships(edges);
        builder.build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn accounts(keys: &[&str]) -> Vec<Account> {
        keys.iter()
            .map(|k| Account::new(*k, k.to_uppercase(), "Agriculture"))
            .collect()
    }

    #[test]
    fn test_builder_adds_accounts() {
        let graph = SocialGraph::build(accounts(&["a", "b", "a"]), &[]);

        assert_eq!(graph.account_count(), 2);
        assert_eq!(graph.edge_count(), 0);
        assert!(graph.neighbors("a").is_empty());
    }

    #[test]
    fn test_builder_only_links_accepted() {
        let edges = vec![
            Friendship::accepted("a", "b").unwrap(),
            Friendship::pending("b", "c").unwrap(),
        ];
        let graph = SocialGraph::build(accounts(&["a", "b", "c"]), &edges);

        assert_eq!(graph.edge_count(), 1);
        assert!(graph.are_connected("a", "b"));
        assert!(!graph.are_connected("b", "c"));
    }

    #[test]
    fn test_builder_skips_unknown_accounts() {
        let edges = vec![
            Friendship::accepted("a", "ghost").unwrap(),
            Friendship::accepted("a", "b").unwrap(),
        ];
        let graph = SocialGraph::build(accounts(&["a", "b"]), &edges);

        assert_eq!(graph.edge_count(), 1);
        assert_eq!(graph.stats().skipped_edges, 1);
        assert!(!graph.contains("ghost"));
        assert_eq!(graph.neighbors("a").len(), 1);
    }

    #[test]
    fn test_builder_ignores_repeated_pairs() {
        let edges = vec![
            Friendship::accepted("a", "b").unwrap(),
            Friendship::accepted("b", "a").unwrap(),
        ];
        let graph = SocialGraph::build(accounts(&["a", "b"]), &edges);
        assert_eq!(graph.edge_count(), 1);
    }

    #[test]
    fn test_rebuild_is_idempotent() {
        let edges = vec![
            Friendship::accepted("c", "a").unwrap(),
            Friendship::accepted("a", "b").unwrap(),
            Friendship::pending("b", "c").unwrap(),
        ];
        let first = SocialGraph::build(accounts(&["c", "a", "b"]), &edges);
        let second = SocialGraph::build(accounts(&["c", "a", "b"]), &edges);

        assert_eq!(first.adjacency(), second.adjacency());
        assert_eq!(first.export_links(), second.export_links());
    }
}
