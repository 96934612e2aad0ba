//! In-memory store, for tests and for embedding the engine without a
//! database.

use crate::store::{AccountSource, EdgeSnapshot, FriendshipStore, StoreError};
use nexus_core::{merge_accounts, Account, Friendship};
use std::sync::{PoisonError, RwLock};

#[derive(Debug, Default)]
struct State {
    accounts: Vec<Account>,
    accounts_revision: u64,
    edges: Vec<Friendship>,
    edges_revision: u64,
}

/// A store that lives in process memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: RwLock<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store pre-populated with accounts.
    pub fn with_accounts(accounts: Vec<Account>) -> Self {
        let store = Self::new();
        store.import_accounts(accounts);
        store
    }

    /// Merges accounts, keeping existing keys unchanged. Returns the number added.
    pub fn import_accounts(&self, accounts: Vec<Account>) -> usize {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        let added = merge_accounts(&mut state.accounts, accounts);
        if added > 0 {
            state.accounts_revision += 1;
        }
        added
    }
}

impl AccountSource for MemoryStore {
    fn list_accounts(&self) -> Result<Vec<Account>, StoreError> {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        Ok(state.accounts.clone())
    }

    fn accounts_revision(&self) -> Result<u64, StoreError> {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        Ok(state.accounts_revision)
    }
}

impl FriendshipStore for MemoryStore {
    fn list_edges(&self) -> Result<EdgeSnapshot, StoreError> {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        Ok(EdgeSnapshot {
            revision: state.edges_revision,
            edges: state.edges.clone(),
        })
    }

    fn replace_edges(
        &self,
        expected_revision: u64,
        edges: Vec<Friendship>,
    ) -> Result<u64, StoreError> {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        if state.edges_revision != expected_revision {
            return Err(StoreError::Conflict {
                expected: expected_revision,
                actual: state.edges_revision,
            });
        }

        state.edges = edges;
        state.edges_revision += 1;
        Ok(state.edges_revision)
    }

    fn edges_revision(&self) -> Result<u64, StoreError> {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        Ok(state.edges_revision)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compare_and_swap() {
        let store = MemoryStore::new();
        let edge = Friendship::accepted("a", "b").unwrap();

        assert_eq!(store.replace_edges(0, vec![edge.clone()]).unwrap(), 1);
        assert!(matches!(
            store.replace_edges(0, Vec::new()),
            Err(StoreError::Conflict { .. })
        ));
        assert_eq!(store.list_edges().unwrap().edges, vec![edge]);
    }

    #[test]
    fn test_account_revision_moves_on_add_only() {
        let store = MemoryStore::with_accounts(vec![Account::new("a", "Amy", "Physics")]);
        assert_eq!(store.accounts_revision().unwrap(), 1);

        assert_eq!(store.import_accounts(vec![Account::new("a", "Amy", "Physics")]), 0);
        assert_eq!(store.accounts_revision().unwrap(), 1);
    }
}
