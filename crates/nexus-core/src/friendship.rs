//! Friendship edges.
//!
//! A friendship is an unordered pair of accounts plus a lifecycle state.
//! The pair is normalized on construction so `{a, b}` and `{b, a}` are the
//! same value, which is what makes "at most one edge per pair" checkable
//! with a plain map lookup.

use crate::account::AccountKey;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// An unordered pair of distinct accounts.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Pair {
    low: AccountKey,
    high: AccountKey,
}

impl Pair {
    /// Normalizes two keys into a pair. Returns `None` for a self pair.
    pub fn new(a: impl Into<AccountKey>, b: impl Into<AccountKey>) -> Option<Self> {
        let (a, b) = (a.into(), b.into());
        match a.cmp(&b) {
            std::cmp::Ordering::Less => Some(Self { low: a, high: b }),
            std::cmp::Ordering::Greater => Some(Self { low: b, high: a }),
            std::cmp::Ordering::Equal => None,
        }
    }

    /// The smaller key of the pair.
    pub fn low(&self) -> &AccountKey {
        &self.low
    }

    /// The larger key of the pair.
    pub fn high(&self) -> &AccountKey {
        &self.high
    }

    pub fn contains(&self, key: &str) -> bool {
        self.low.as_str() == key || self.high.as_str() == key
    }

    /// Returns the member of the pair that is not `key`.
    pub fn other(&self, key: &str) -> Option<&AccountKey> {
        if self.low.as_str() == key {
            Some(&self.high)
        } else if self.high.as_str() == key {
            Some(&self.low)
        } else {
            None
        }
    }
}

impl fmt::Display for Pair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{{}, {}}}", self.low, self.high)
    }
}

/// Lifecycle state of a friendship.
///
/// `requester` only exists while the edge is pending; an accepted edge is
/// symmetric and carries no direction.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FriendshipState {
    /// Awaiting a decision from the account that did not send the request.
    Pending { requester: AccountKey },

    /// A mutual connection.
    Accepted,
}

impl fmt::Display for FriendshipState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending { .. } => write!(f, "pending"),
            Self::Accepted => write!(f, "accepted"),
        }
    }
}

/// Reasons a stored friendship record cannot be turned into a [`Friendship`].
#[derive(Error, Debug, PartialEq, Eq)]
pub enum FriendshipRecordError {
    #[error("friendship record pairs {0} with itself")]
    SelfEdge(AccountKey),
    #[error("requester {requester} is not a member of {pair}")]
    StrayRequester { requester: AccountKey, pair: Pair },
}

/// Wire and storage shape of a friendship.
#[derive(Serialize, Deserialize)]
struct FriendshipRecord {
    a: AccountKey,
    b: AccountKey,
    state: FriendshipState,
}

/// A friendship edge between two accounts.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "FriendshipRecord", into = "FriendshipRecord")]
pub struct Friendship {
    pair: Pair,
    state: FriendshipState,
}

impl Friendship {
    /// Creates a pending request from `requester` to `recipient`.
    pub fn pending(requester: impl Into<AccountKey>, recipient: impl Into<AccountKey>) -> Option<Self> {
        let requester = requester.into();
        let pair = Pair::new(requester.clone(), recipient)?;
        Some(Self {
            pair,
            state: FriendshipState::Pending { requester },
        })
    }

    /// Creates an accepted friendship. Used for seeding and tests; the
    /// lifecycle manager only reaches this state through an accept.
    pub fn accepted(a: impl Into<AccountKey>, b: impl Into<AccountKey>) -> Option<Self> {
        Some(Self {
            pair: Pair::new(a, b)?,
            state: FriendshipState::Accepted,
        })
    }

    pub fn pair(&self) -> &Pair {
        &self.pair
    }

    pub fn state(&self) -> &FriendshipState {
        &self.state
    }

    pub fn is_accepted(&self) -> bool {
        self.state == FriendshipState::Accepted
    }

    /// The account that sent the request, while pending.
    pub fn requester(&self) -> Option<&AccountKey> {
        match &self.state {
            FriendshipState::Pending { requester } => Some(requester),
            FriendshipState::Accepted => None,
        }
    }

    /// The account expected to answer the request, while pending.
    pub fn recipient(&self) -> Option<&AccountKey> {
        self.requester()
            .and_then(|requester| self.pair.other(requester.as_str()))
    }

    pub fn involves(&self, key: &str) -> bool {
        self.pair.contains(key)
    }

    /// Consumes the edge and returns it promoted to accepted.
    pub fn into_accepted(self) -> Self {
        Self {
            pair: self.pair,
            state: FriendshipState::Accepted,
        }
    }
}

impl TryFrom<FriendshipRecord> for Friendship {
    type Error = FriendshipRecordError;

    fn try_from(record: FriendshipRecord) -> Result<Self, Self::Error> {
        let pair = Pair::new(record.a.clone(), record.b)
            .ok_or(FriendshipRecordError::SelfEdge(record.a))?;

        if let FriendshipState::Pending { requester } = &record.state {
            if !pair.contains(requester.as_str()) {
                return Err(FriendshipRecordError::StrayRequester {
                    requester: requester.clone(),
                    pair,
                });
            }
        }

        Ok(Self {
            pair,
            state: record.state,
        })
    }
}

impl From<Friendship> for FriendshipRecord {
    fn from(edge: Friendship) -> Self {
        Self {
            a: edge.pair.low,
            b: edge.pair.high,
            state: edge.state,
        }
    }
}
