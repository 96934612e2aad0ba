//! Friendship lifecycle.
//!
//! Per unordered pair the states are Absent, Pending and Accepted:
//!
//! ```text
//!   Absent --request(a, b)--> Pending{a} --accept(b, a)--> Accepted
//!                                 |                           |
//!                             reject(b, a)              unfriend(a|b)
//!                                 v                           v
//!                              Absent                      Absent
//! ```
//!
//! There is no direct Absent to Accepted step and no archived "rejected"
//! state; rejecting or unfriending deletes the edge.

use crate::store::{AccountSource, FriendshipStore, StoreError};
use nexus_core::{AccountKey, Friendship, FriendshipState, Pair};
use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex, PoisonError};
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Error, Debug)]
pub enum FriendshipError {
    #[error("Invalid edge: {0} cannot befriend themselves")]
    SelfEdge(AccountKey),
    #[error("Invalid edge: unknown account {0}")]
    UnknownAccount(AccountKey),
    #[error("Duplicate edge: {pair} already has a {state} friendship")]
    DuplicateEdge { pair: Pair, state: FriendshipState },
    #[error("Invalid transition: cannot {action} {pair}: {reason}")]
    InvalidTransition {
        action: &'static str,
        pair: Pair,
        reason: &'static str,
    },
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Coarse classification of [`FriendshipError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidEdge,
    DuplicateEdge,
    InvalidTransition,
    Store,
}

impl FriendshipError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::SelfEdge(_) | Self::UnknownAccount(_) => ErrorKind::InvalidEdge,
            Self::DuplicateEdge { .. } => ErrorKind::DuplicateEdge,
            Self::InvalidTransition { .. } => ErrorKind::InvalidTransition,
            Self::Store(_) => ErrorKind::Store,
        }
    }
}

/// A requested change to one pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    /// `from` asks `to` to connect.
    Request { from: AccountKey, to: AccountKey },
    /// `actor` accepts the request `requester` sent them.
    Accept { actor: AccountKey, requester: AccountKey },
    /// `actor` declines the request `requester` sent them.
    Reject { actor: AccountKey, requester: AccountKey },
    /// Either side ends an accepted friendship.
    Unfriend { actor: AccountKey, other: AccountKey },
}

impl Transition {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Request { .. } => "request",
            Self::Accept { .. } => "accept",
            Self::Reject { .. } => "reject",
            Self::Unfriend { .. } => "unfriend",
        }
    }

    /// The acting account first, the other party second.
    pub fn parties(&self) -> (&AccountKey, &AccountKey) {
        match self {
            Self::Request { from, to } => (from, to),
            Self::Accept { actor, requester } | Self::Reject { actor, requester } => {
                (actor, requester)
            }
            Self::Unfriend { actor, other } => (actor, other),
        }
    }
}

/// The edge set keyed by pair, with the transition rules.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EdgeSet {
    edges: BTreeMap<Pair, Friendship>,
}

impl EdgeSet {
    /// Indexes stored edges by pair. If storage somehow holds two records
    /// for one pair, the first is kept.
    pub fn from_edges(edges: Vec<Friendship>) -> Self {
        let mut set = Self::default();
        for edge in edges {
            let pair = edge.pair().clone();
            if set.edges.contains_key(&pair) {
                warn!("Dropping second friendship record for {}", pair);
                continue;
            }
            set.edges.insert(pair, edge);
        }
        set
    }

    pub fn get(&self, pair: &Pair) -> Option<&Friendship> {
        self.edges.get(pair)
    }

    pub fn len(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    /// Edges in pair order.
    pub fn into_edges(self) -> Vec<Friendship> {
        self.edges.into_values().collect()
    }

    /// Applies a transition. On error the set is unchanged.
    ///
    /// Returns the edge as it stands after the transition, or as it stood
    /// before removal for reject and unfriend.
    pub fn apply(&mut self, transition: &Transition) -> Result<Friendship, FriendshipError> {
        let (actor, other) = transition.parties();
        let pair = Pair::new(actor.clone(), other.clone())
            .ok_or_else(|| FriendshipError::SelfEdge(actor.clone()))?;
        let action = transition.name();

        match transition {
            Transition::Request { from, to } => {
                if let Some(existing) = self.edges.get(&pair) {
                    return Err(FriendshipError::DuplicateEdge {
                        pair,
                        state: existing.state().clone(),
                    });
                }
                let edge = Friendship::pending(from.clone(), to.clone())
                    .ok_or_else(|| FriendshipError::SelfEdge(from.clone()))?;
                self.edges.insert(pair, edge.clone());
                Ok(edge)
            }
            Transition::Accept { requester, .. } => {
                self.check_answerable(&pair, requester, action)?;
                let edge = match self.edges.remove(&pair) {
                    Some(edge) => edge.into_accepted(),
                    None => return Err(no_request(action, pair)),
                };
                self.edges.insert(pair, edge.clone());
                Ok(edge)
            }
            Transition::Reject { requester, .. } => {
                self.check_answerable(&pair, requester, action)?;
                self.edges
                    .remove(&pair)
                    .ok_or_else(|| no_request(action, pair))
            }
            Transition::Unfriend { .. } => {
                match self.edges.get(&pair).map(Friendship::is_accepted) {
                    Some(true) => self
                        .edges
                        .remove(&pair)
                        .ok_or_else(|| not_friends(action, pair)),
                    Some(false) => Err(FriendshipError::InvalidTransition {
                        action,
                        pair,
                        reason: "the request is still pending",
                    }),
                    None => Err(not_friends(action, pair)),
                }
            }
        }
    }

    /// Checks that `pair` holds a pending request sent by `requester`, which
    /// means the other member is the one answering it.
    fn check_answerable(
        &self,
        pair: &Pair,
        requester: &AccountKey,
        action: &'static str,
    ) -> Result<(), FriendshipError> {
        let edge = self
            .edges
            .get(pair)
            .ok_or_else(|| no_request(action, pair.clone()))?;

        match edge.requester() {
            None => Err(FriendshipError::InvalidTransition {
                action,
                pair: pair.clone(),
                reason: "they are already friends",
            }),
            Some(sent_by) if sent_by != requester => Err(FriendshipError::InvalidTransition {
                action,
                pair: pair.clone(),
                reason: "only the recipient can answer a request",
            }),
            Some(_) => Ok(()),
        }
    }
}

fn no_request(action: &'static str, pair: Pair) -> FriendshipError {
    FriendshipError::InvalidTransition {
        action,
        pair,
        reason: "there is no pending request",
    }
}

fn not_friends(action: &'static str, pair: Pair) -> FriendshipError {
    FriendshipError::InvalidTransition {
        action,
        pair,
        reason: "they are not friends",
    }
}

/// Validates transitions and commits them to the friendship store.
///
/// Commits are serialized through a write lock, and each one is a
/// compare-and-swap against the revision it read, so the duplicate check
/// and the write form one atomic step.
pub struct FriendshipManager {
    accounts: Arc<dyn AccountSource>,
    store: Arc<dyn FriendshipStore>,
    write_lock: Mutex<()>,
}

impl FriendshipManager {
    pub fn new(accounts: Arc<dyn AccountSource>, store: Arc<dyn FriendshipStore>) -> Self {
        Self {
            accounts,
            store,
            write_lock: Mutex::new(()),
        }
    }

    /// `from` sends a friend request to `to`.
    pub fn request(&self, from: &str, to: &str) -> Result<Friendship, FriendshipError> {
        self.apply(Transition::Request {
            from: from.into(),
            to: to.into(),
        })
    }

    /// `actor` accepts the pending request from `requester`.
    pub fn accept(&self, actor: &str, requester: &str) -> Result<Friendship, FriendshipError> {
        self.apply(Transition::Accept {
            actor: actor.into(),
            requester: requester.into(),
        })
    }

    /// `actor` declines the pending request from `requester`.
    pub fn reject(&self, actor: &str, requester: &str) -> Result<Friendship, FriendshipError> {
        self.apply(Transition::Reject {
            actor: actor.into(),
            requester: requester.into(),
        })
    }

    /// `actor` ends the friendship with `other`.
    pub fn unfriend(&self, actor: &str, other: &str) -> Result<Friendship, FriendshipError> {
        self.apply(Transition::Unfriend {
            actor: actor.into(),
            other: other.into(),
        })
    }

    /// Validates and commits one transition.
    pub fn apply(&self, transition: Transition) -> Result<Friendship, FriendshipError> {
        let _guard = self
            .write_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        let (actor, other) = transition.parties();
        if actor == other {
            return Err(FriendshipError::SelfEdge(actor.clone()));
        }

        let known: HashSet<AccountKey> = self
            .accounts
            .list_accounts()?
            .into_iter()
            .map(|account| account.key)
            .collect();
        for key in [actor, other] {
            if !known.contains(key) {
                return Err(FriendshipError::UnknownAccount(key.clone()));
            }
        }

        let snapshot = self.store.list_edges()?;
        let mut edges = EdgeSet::from_edges(snapshot.edges);
        let edge = edges.apply(&transition)?;
        let revision = self.store.replace_edges(snapshot.revision, edges.into_edges())?;

        info!(
            "{} {} -> {} committed at revision {}",
            transition.name(),
            actor,
            other,
            revision
        );
        debug!("Edge after {}: {:?}", transition.name(), edge);
        Ok(edge)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryStore;
    use nexus_core::Account;

    fn manager() -> (Arc<MemoryStore>, FriendshipManager) {
        let store = Arc::new(MemoryStore::with_accounts(vec![
            Account::new("a", "Amy", "CS"),
            Account::new("b", "Bob", "CS"),
            Account::new("c", "Cat", "Math"),
        ]));
        let manager = FriendshipManager::new(store.clone(), store.clone());
        (store, manager)
    }

    fn edges(store: &MemoryStore) -> Vec<Friendship> {
        store.list_edges().unwrap().edges
    }

    #[test]
    fn test_request_creates_pending() {
        let (store, manager) = manager();

        let edge = manager.request("a", "b").unwrap();
        assert_eq!(edge.requester().map(AccountKey::as_str), Some("a"));
        assert_eq!(edges(&store), vec![edge]);
    }

    #[test]
    fn test_duplicate_request_either_direction() {
        let (_store, manager) = manager();
        manager.request("a", "b").unwrap();

        let again = manager.request("a", "b").unwrap_err();
        assert_eq!(again.kind(), ErrorKind::DuplicateEdge);

        let reverse = manager.request("b", "a").unwrap_err();
        assert_eq!(reverse.kind(), ErrorKind::DuplicateEdge);
    }

    #[test]
    fn test_request_on_accepted_pair_is_duplicate() {
        let (_store, manager) = manager();
        manager.request("a", "b").unwrap();
        manager.accept("b", "a").unwrap();

        let err = manager.request("b", "a").unwrap_err();
        assert!(matches!(
            err,
            FriendshipError::DuplicateEdge {
                state: FriendshipState::Accepted,
                ..
            }
        ));
    }

    #[test]
    fn test_round_trip() {
        let (store, manager) = manager();

        manager.request("a", "b").unwrap();
        let accepted = manager.accept("b", "a").unwrap();
        assert!(accepted.is_accepted());

        manager.unfriend("a", "b").unwrap();
        assert!(edges(&store).is_empty());
    }

    #[test]
    fn test_either_side_can_unfriend() {
        let (store, manager) = manager();
        manager.request("a", "b").unwrap();
        manager.accept("b", "a").unwrap();

        manager.unfriend("b", "a").unwrap();
        assert!(edges(&store).is_empty());
    }

    #[test]
    fn test_requester_cannot_accept_own_request() {
        let (store, manager) = manager();
        manager.request("a", "b").unwrap();

        let err = manager.accept("a", "b").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidTransition);
        assert!(!edges(&store)[0].is_accepted());
    }

    #[test]
    fn test_requester_cannot_reject_own_request() {
        let (_store, manager) = manager();
        manager.request("a", "b").unwrap();

        let err = manager.reject("a", "b").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidTransition);
    }

    #[test]
    fn test_accept_without_request() {
        let (store, manager) = manager();
        let err = manager.accept("b", "a").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidTransition);
        assert_eq!(store.edges_revision().unwrap(), 0);
    }

    #[test]
    fn test_accept_twice() {
        let (_store, manager) = manager();
        manager.request("a", "b").unwrap();
        manager.accept("b", "a").unwrap();

        let err = manager.accept("b", "a").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidTransition);
    }

    #[test]
    fn test_reject_without_request() {
        let (store, manager) = manager();
        let err = manager.reject("b", "a").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidTransition);
        assert_eq!(store.edges_revision().unwrap(), 0);
    }

    #[test]
    fn test_reject_accepted_is_invalid() {
        let (store, manager) = manager();
        manager.request("a", "b").unwrap();
        manager.accept("b", "a").unwrap();

        let err = manager.reject("b", "a").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidTransition);
        assert!(edges(&store)[0].is_accepted());
    }

    #[test]
    fn test_reject_removes_edge() {
        let (store, manager) = manager();
        manager.request("a", "b").unwrap();

        let removed = manager.reject("b", "a").unwrap();
        assert_eq!(removed.requester().map(AccountKey::as_str), Some("a"));
        assert!(edges(&store).is_empty());

        // The pair is free again
        manager.request("b", "a").unwrap();
    }

    #[test]
    fn test_unfriend_pending_is_invalid() {
        let (store, manager) = manager();
        manager.request("a", "b").unwrap();

        let err = manager.unfriend("a", "b").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidTransition);
        assert_eq!(edges(&store).len(), 1);
    }

    #[test]
    fn test_unfriend_strangers_is_invalid() {
        let (_store, manager) = manager();
        let err = manager.unfriend("a", "c").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidTransition);
    }

    #[test]
    fn test_self_edge() {
        let (_store, manager) = manager();
        let err = manager.request("a", "a").unwrap_err();
        assert!(matches!(err, FriendshipError::SelfEdge(_)));
        assert_eq!(err.kind(), ErrorKind::InvalidEdge);
    }

    #[test]
    fn test_unknown_account() {
        let (store, manager) = manager();
        let err = manager.request("a", "ghost").unwrap_err();
        assert!(matches!(err, FriendshipError::UnknownAccount(ref k) if k.as_str() == "ghost"));

        let err = manager.accept("ghost", "a").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidEdge);
        assert_eq!(store.edges_revision().unwrap(), 0);
    }

    #[test]
    fn test_lost_race_leaves_store_unchanged() {
        let (store, manager) = manager();
        manager.request("a", "b").unwrap();

        // Another writer moved the revision between our read and write
        let mut set = EdgeSet::from_edges(edges(&store));
        set.apply(&Transition::Accept {
            actor: "b".into(),
            requester: "a".into(),
        })
        .unwrap();
        let err = store.replace_edges(0, set.into_edges()).unwrap_err();
        assert!(matches!(err, StoreError::Conflict { .. }));

        manager.accept("b", "a").unwrap();
        assert!(edges(&store)[0].is_accepted());
    }

    #[test]
    fn test_edge_set_keeps_first_duplicate_record() {
        let set = EdgeSet::from_edges(vec![
            Friendship::pending("a", "b").unwrap(),
            Friendship::accepted("b", "a").unwrap(),
        ]);
        assert_eq!(set.len(), 1);
        let pair = Pair::new("a", "b").unwrap();
        assert!(!set.get(&pair).unwrap().is_accepted());
    }

    #[test]
    fn test_concurrent_requests_create_one_edge() {
        let (store, manager) = manager();
        let manager = Arc::new(manager);

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let manager = manager.clone();
                std::thread::spawn(move || {
                    if i % 2 == 0 {
                        manager.request("a", "b")
                    } else {
                        manager.request("b", "a")
                    }
                })
            })
            .collect();

        let successes = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(Result::is_ok)
            .count();

        assert_eq!(successes, 1);
        assert_eq!(edges(&store).len(), 1);
    }
}
