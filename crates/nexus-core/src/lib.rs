//! Nexus Core - Accounts and friendships
//!
//! This crate holds the value types the rest of Nexus is built on:
//! registration keys, accounts, and friendship edges. It has no notion
//! of storage or graphs; those live in `nexus-graph`.
//!
//! # Example
//!
//! ```
//! use nexus_core::{AccountKey, Friendship};
//!
//! let edge = Friendship::pending("2022-ag-9237", "2022-ag-9117").unwrap();
//! assert!(!edge.is_accepted());
//! assert_eq!(edge.requester().map(AccountKey::as_str), Some("2022-ag-9237"));
//! ```

mod account;
mod friendship;
mod roster;

pub use account::{Account, AccountKey};
pub use friendship::{Friendship, FriendshipRecordError, FriendshipState, Pair};
pub use roster::{merge_accounts, parse_roster, Roster, DEFAULT_DEPARTMENT};
