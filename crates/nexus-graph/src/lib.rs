//! Nexus Graph - Social graph and recommendation engine
//!
//! This crate turns friendship records into graph queries and ranked
//! connection suggestions, and owns the rules for how friendships are
//! requested, accepted, rejected and removed.
//!
//! # Architecture
//!
//! - A [`FriendshipStore`] and an [`AccountSource`] hold the durable state.
//! - The [`FriendshipManager`] validates transitions and commits them.
//! - The [`GraphBuilder`] derives an undirected petgraph snapshot from
//!   the accepted edges; snapshots are rebuilt, never patched.
//! - [`SocialNetwork`] caches the snapshot per store revision and serves
//!   every query from it.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use nexus_core::Account;
//! use nexus_graph::{MemoryStore, SocialNetwork};
//!
//! let store = Arc::new(MemoryStore::with_accounts(vec![
//!     Account::new("a", "Amy", "Physics"),
//!     Account::new("b", "Bob", "Physics"),
//! ]));
//! let network = SocialNetwork::new(store);
//!
//! network.request("a", "b").unwrap();
//! network.accept("b", "a").unwrap();
//! assert!(network.are_connected("a", "b").unwrap());
//! ```

mod builder;
mod edge;
mod graph;
mod lifecycle;
mod memory;
mod network;
mod recommend;
mod store;

pub use builder::GraphBuilder;
pub use edge::{GraphExport, GraphLink, GraphNode, NodeRole};
pub use graph::{GraphStats, NodeId, SocialGraph};
pub use lifecycle::{EdgeSet, ErrorKind, FriendshipError, FriendshipManager, Transition};
pub use memory::MemoryStore;
pub use network::{ConnectionSummary, NetworkSnapshot, Relation, SocialNetwork};
pub use recommend::{Recommendation, RecommendationWeights};
pub use store::{AccountSource, EdgeSnapshot, FriendshipStore, SledStore, StoreError};
