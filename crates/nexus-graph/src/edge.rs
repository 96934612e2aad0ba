//! Export types for the social graph.
//!
//! These are flat, serializable views handed to visualizers and other
//! external consumers. The graph itself never stores them.

use crate::graph::GraphStats;
use nexus_core::AccountKey;
use serde::{Deserialize, Serialize};

/// How an account relates to the account viewing the graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeRole {
    /// The viewer.
    Me,

    /// Holds an accepted friendship with the viewer.
    Friend,

    /// Appears in the viewer's recommendations.
    Recommended,

    /// Anyone else.
    Other,
}

impl std::fmt::Display for NodeRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Me => "me",
            Self::Friend => "friend",
            Self::Recommended => "recommended",
            Self::Other => "other",
        };
        write!(f, "{}", s)
    }
}

/// An account in an exported graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphNode {
    pub key: AccountKey,
    pub name: String,
    pub department: String,
    pub role: NodeRole,
}

/// An accepted friendship in an exported graph. `source` sorts before `target`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct GraphLink {
    pub source: AccountKey,
    pub target: AccountKey,
}

/// A whole-graph export, optionally relative to a viewer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphExport {
    pub viewer: Option<AccountKey>,
    pub stats: GraphStats,
    pub nodes: Vec<GraphNode>,
    pub links: Vec<GraphLink>,
}
