//! Persistence boundary.
//!
//! The engine never owns durable state. Accounts come from an
//! [`AccountSource`] and friendships live in a [`FriendshipStore`]; both
//! carry a revision counter that is bumped on every write so derived
//! snapshots can tell when they are stale.

use nexus_core::{merge_accounts, Account, Friendship};
use sled::transaction::{ConflictableTransactionError, TransactionError, TransactionResult};
use sled::{Db, IVec};
use std::path::Path;
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Sled(#[from] sled::Error),
    #[error("Serialization error: {0}")]
    Bincode(#[from] bincode::Error),
    #[error("Edge set changed concurrently (expected revision {expected}, found {actual})")]
    Conflict { expected: u64, actual: u64 },
    #[error("Corrupt revision counter under key {0:?}")]
    CorruptRevision(&'static str),
}

/// The edge set as read at one revision.
#[derive(Debug, Clone, Default)]
pub struct EdgeSnapshot {
    pub revision: u64,
    pub edges: Vec<Friendship>,
}

/// Read-only view of the account population.
pub trait AccountSource: Send + Sync {
    fn list_accounts(&self) -> Result<Vec<Account>, StoreError>;

    /// Revision of the account set. Changes whenever accounts are added.
    fn accounts_revision(&self) -> Result<u64, StoreError>;
}

/// Durable record set of friendship edges.
pub trait FriendshipStore: Send + Sync {
    /// Reads every edge together with the revision it was read at.
    fn list_edges(&self) -> Result<EdgeSnapshot, StoreError>;

    /// Atomically replaces the whole edge set.
    ///
    /// Fails with [`StoreError::Conflict`] and writes nothing unless the
    /// current revision equals `expected_revision`. Returns the new revision.
    fn replace_edges(
        &self,
        expected_revision: u64,
        edges: Vec<Friendship>,
    ) -> Result<u64, StoreError>;

    fn edges_revision(&self) -> Result<u64, StoreError>;
}

const ACCOUNTS_KEY: &str = "accounts";
const ACCOUNTS_REV_KEY: &str = "accounts_rev";
const EDGES_KEY: &str = "edges";
const EDGES_REV_KEY: &str = "edges_rev";

/// sled-backed store holding both accounts and friendships.
pub struct SledStore {
    db: Db,
}

impl SledStore {
    /// Opens or creates a store at the specified path.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let db = sled::open(path)?;
        Ok(Self { db })
    }

    /// Merges accounts into the store, keeping existing keys unchanged.
    ///
    /// Returns the number of accounts added. The account revision only
    /// moves when something was added.
    pub fn import_accounts(&self, accounts: Vec<Account>) -> Result<usize, StoreError> {
        let result: TransactionResult<usize, StoreError> = self.db.transaction(|tx| {
            let mut existing: Vec<Account> = match tx.get(ACCOUNTS_KEY)? {
                Some(bytes) => bincode::deserialize(&bytes).map_err(abort)?,
                None => Vec::new(),
            };

            let added = merge_accounts(&mut existing, accounts.clone());
            if added > 0 {
                let revision = decode_revision(tx.get(ACCOUNTS_REV_KEY)?, ACCOUNTS_REV_KEY)
                    .map_err(ConflictableTransactionError::Abort)?;
                let bytes = bincode::serialize(&existing).map_err(abort)?;
                tx.insert(ACCOUNTS_KEY, bytes)?;
                tx.insert(ACCOUNTS_REV_KEY, encode_revision(revision + 1))?;
            }
            Ok(added)
        });

        let added = finish(result)?;
        self.db.flush()?;
        debug!("Imported {} new accounts", added);
        Ok(added)
    }

    fn revision(&self, key: &'static str) -> Result<u64, StoreError> {
        decode_revision(self.db.get(key)?, key)
    }
}

impl AccountSource for SledStore {
    fn list_accounts(&self) -> Result<Vec<Account>, StoreError> {
        match self.db.get(ACCOUNTS_KEY)? {
            Some(bytes) => Ok(bincode::deserialize(&bytes)?),
            None => Ok(Vec::new()),
        }
    }

    fn accounts_revision(&self) -> Result<u64, StoreError> {
        self.revision(ACCOUNTS_REV_KEY)
    }
}

impl FriendshipStore for SledStore {
    fn list_edges(&self) -> Result<EdgeSnapshot, StoreError> {
        let result: TransactionResult<(Option<IVec>, Option<IVec>), StoreError> = self
            .db
            .transaction(|tx| Ok((tx.get(EDGES_KEY)?, tx.get(EDGES_REV_KEY)?)));
        let (edges, revision) = finish(result)?;

        let edges = match edges {
            Some(bytes) => bincode::deserialize(&bytes)?,
            None => Vec::new(),
        };

        Ok(EdgeSnapshot {
            revision: decode_revision(revision, EDGES_REV_KEY)?,
            edges,
        })
    }

    fn replace_edges(
        &self,
        expected_revision: u64,
        edges: Vec<Friendship>,
    ) -> Result<u64, StoreError> {
        let bytes = bincode::serialize(&edges)?;

        let result: TransactionResult<u64, StoreError> = self.db.transaction(|tx| {
            let actual = decode_revision(tx.get(EDGES_REV_KEY)?, EDGES_REV_KEY)
                .map_err(ConflictableTransactionError::Abort)?;
            if actual != expected_revision {
                return Err(ConflictableTransactionError::Abort(StoreError::Conflict {
                    expected: expected_revision,
                    actual,
                }));
            }

            tx.insert(EDGES_KEY, bytes.clone())?;
            tx.insert(EDGES_REV_KEY, encode_revision(actual + 1))?;
            Ok(actual + 1)
        });

        let revision = finish(result)?;
        self.db.flush()?;
        Ok(revision)
    }

    fn edges_revision(&self) -> Result<u64, StoreError> {
        self.revision(EDGES_REV_KEY)
    }
}

fn abort(e: bincode::Error) -> ConflictableTransactionError<StoreError> {
    ConflictableTransactionError::Abort(StoreError::Bincode(e))
}

fn finish<T>(result: TransactionResult<T, StoreError>) -> Result<T, StoreError> {
    match result {
        Ok(value) => Ok(value),
        Err(TransactionError::Abort(e)) => Err(e),
        Err(TransactionError::Storage(e)) => Err(StoreError::Sled(e)),
    }
}

fn encode_revision(revision: u64) -> Vec<u8> {
    revision.to_be_bytes().to_vec()
}

fn decode_revision(bytes: Option<IVec>, key: &'static str) -> Result<u64, StoreError> {
    match bytes {
        None => Ok(0),
        Some(bytes) => {
            let raw = <[u8; 8]>::try_from(&bytes[..])
                .map_err(|_| StoreError::CorruptRevision(key))?;
            Ok(u64::from_be_bytes(raw))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_empty_store() {
        let dir = tempdir().unwrap();
        let store = SledStore::open(dir.path()).unwrap();

        assert!(store.list_accounts().unwrap().is_empty());
        let snapshot = store.list_edges().unwrap();
        assert_eq!(snapshot.revision, 0);
        assert!(snapshot.edges.is_empty());
    }

    #[test]
    fn test_import_accounts_merges() {
        let dir = tempdir().unwrap();
        let store = SledStore::open(dir.path()).unwrap();

        let added = store
            .import_accounts(vec![
                Account::new("a", "Amy", "Physics"),
                Account::new("b", "Bob", "Physics"),
            ])
            .unwrap();
        assert_eq!(added, 2);
        assert_eq!(store.accounts_revision().unwrap(), 1);

        let added = store
            .import_accounts(vec![Account::new("a", "Someone Else", "Chemistry")])
            .unwrap();
        assert_eq!(added, 0);
        assert_eq!(store.accounts_revision().unwrap(), 1);

        let accounts = store.list_accounts().unwrap();
        assert_eq!(accounts.len(), 2);
        assert_eq!(accounts[0].name, "Amy");
    }

    #[test]
    fn test_replace_edges_bumps_revision() {
        let dir = tempdir().unwrap();
        let store = SledStore::open(dir.path()).unwrap();

        let edge = Friendship::pending("a", "b").unwrap();
        let revision = store.replace_edges(0, vec![edge.clone()]).unwrap();
        assert_eq!(revision, 1);

        let snapshot = store.list_edges().unwrap();
        assert_eq!(snapshot.revision, 1);
        assert_eq!(snapshot.edges, vec![edge]);
    }

    #[test]
    fn test_replace_edges_rejects_stale_revision() {
        let dir = tempdir().unwrap();
        let store = SledStore::open(dir.path()).unwrap();

        store
            .replace_edges(0, vec![Friendship::accepted("a", "b").unwrap()])
            .unwrap();

        let err = store.replace_edges(0, Vec::new()).unwrap_err();
        assert!(matches!(
            err,
            StoreError::Conflict {
                expected: 0,
                actual: 1
            }
        ));
        assert_eq!(store.list_edges().unwrap().edges.len(), 1);
    }

    #[test]
    fn test_reopen_keeps_data() {
        let dir = tempdir().unwrap();
        {
            let store = SledStore::open(dir.path()).unwrap();
            store
                .import_accounts(vec![Account::new("a", "Amy", "Physics")])
                .unwrap();
            store
                .replace_edges(0, vec![Friendship::pending("a", "b").unwrap()])
                .unwrap();
        }

        let store = SledStore::open(dir.path()).unwrap();
        assert_eq!(store.list_accounts().unwrap().len(), 1);
        assert_eq!(store.edges_revision().unwrap(), 1);
    }

    #[test]
    fn test_revisions_never_repeat() {
        let dir = tempdir().unwrap();
        let store = SledStore::open(dir.path()).unwrap();
        store
            .import_accounts(vec![Account::new("a", "Amy", "Physics")])
            .unwrap();
        store
            .replace_edges(0, vec![Friendship::pending("a", "b").unwrap()])
            .unwrap();

        store
            .import_accounts(vec![Account::new("x", "Xia", "Physics")])
            .unwrap();
        let revision = store.replace_edges(1, Vec::new()).unwrap();

        assert_eq!(store.accounts_revision().unwrap(), 2);
        assert_eq!(revision, 2);
    }
}
