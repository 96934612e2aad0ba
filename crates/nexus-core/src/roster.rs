//! Roster import.
//!
//! Accounts are created outside the engine, usually by importing a class
//! roster exported as CSV: a header line followed by
//! `name, registration key, department` rows.

use crate::account::{Account, AccountKey};
use std::collections::HashSet;
use tracing::debug;

/// Department assigned to rows that leave the column empty.
pub const DEFAULT_DEPARTMENT: &str = "Agriculture";

/// The result of parsing a roster file.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Roster {
    /// Parsed accounts, in file order, first occurrence of each key only.
    pub accounts: Vec<Account>,
    /// 1-based line numbers of rows missing a name or key.
    pub malformed: Vec<usize>,
    /// 1-based line numbers of rows repeating an earlier key.
    pub duplicates: Vec<usize>,
}

/// Parses roster text.
///
/// The first line is always treated as a header. Blank lines are ignored.
pub fn parse_roster(text: &str, default_department: &str) -> Roster {
    let mut roster = Roster::default();
    let mut seen: HashSet<AccountKey> = HashSet::new();

    for (index, line) in text.lines().enumerate().skip(1) {
        if line.trim().is_empty() {
            continue;
        }

        let mut columns = line.split(',').map(str::trim);
        let name = columns.next().unwrap_or_default();
        let key = columns.next().unwrap_or_default();
        let department = columns.next().filter(|d| !d.is_empty());

        if name.is_empty() || key.is_empty() {
            debug!("Skipping malformed roster line {}", index + 1);
            roster.malformed.push(index + 1);
            continue;
        }

        let key = AccountKey::from(key);
        if !seen.insert(key.clone()) {
            roster.duplicates.push(index + 1);
            continue;
        }

        roster.accounts.push(Account::new(
            key,
            name,
            department.unwrap_or(default_department),
        ));
    }

    roster
}

/// Appends accounts whose keys are not already present.
///
/// Existing accounts are never modified. Returns the number added.
pub fn merge_accounts(existing: &mut Vec<Account>, incoming: Vec<Account>) -> usize {
    let mut known: HashSet<AccountKey> = existing.iter().map(|a| a.key.clone()).collect();
    let before = existing.len();

    for account in incoming {
        if known.insert(account.key.clone()) {
            existing.push(account);
        }
    }

    existing.len() - before
}
