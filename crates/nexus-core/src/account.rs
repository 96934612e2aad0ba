//! Account identity.

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;

/// A registration key. Unique and immutable for the lifetime of an account.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountKey(String);

impl AccountKey {
    /// Creates a key from any string-like value.
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AccountKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AccountKey {
    fn from(key: &str) -> Self {
        Self(key.to_string())
    }
}

impl From<String> for AccountKey {
    fn from(key: String) -> Self {
        Self(key)
    }
}

impl Borrow<str> for AccountKey {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for AccountKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// A member of the network.
///
/// Only the department takes part in graph computations; the name is
/// carried along for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub key: AccountKey,
    pub name: String,
    pub department: String,
}

impl Account {
    /// Creates a new account.
    pub fn new(
        key: impl Into<AccountKey>,
        name: impl Into<String>,
        department: impl Into<String>,
    ) -> Self {
        Self {
            key: key.into(),
            name: name.into(),
            department: department.into(),
        }
    }
}
