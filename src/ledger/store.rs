//! Ledger persistence contract and an in-memory implementation.

use crate::models::{IdentityError, UserIdentity, WagerRecord};
use parking_lot::RwLock;
use std::collections::BTreeMap;

#[derive(Debug)]
pub enum StoreError {
    /// The backing store could not be read or written.
    Unavailable(String),
    DuplicateUser(String),
    ReservedName,
    InvalidName,
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::Unavailable(msg) => write!(f, "ledger store unavailable: {}", msg),
            StoreError::DuplicateUser(name) => write!(f, "user \"{}\" already exists", name),
            StoreError::ReservedName => write!(f, "that name is reserved"),
            StoreError::InvalidName => write!(f, "user name must not be empty"),
        }
    }
}

impl std::error::Error for StoreError {}

impl From<IdentityError> for StoreError {
    fn from(err: IdentityError) -> Self {
        match err {
            IdentityError::Empty => StoreError::InvalidName,
            IdentityError::Reserved => StoreError::ReservedName,
        }
    }
}

/// Per-user append-only wager storage.
pub trait LedgerStore: Send + Sync {
    /// Full ledger for `user` in insertion order. Unknown users have an empty ledger.
    fn read(&self, user: &UserIdentity) -> Result<Vec<WagerRecord>, StoreError>;

    /// Append `records` to `user`'s ledger, creating the ledger (and registering
    /// the user) if needed. All rows land or none do. Returns rows written.
    fn append(&self, user: &UserIdentity, records: &[WagerRecord]) -> Result<usize, StoreError>;

    /// Known users, sorted by name.
    fn list_users(&self) -> Result<Vec<UserIdentity>, StoreError>;

    /// Register a new user; fails if the name is taken or reserved.
    fn add_user(&self, name: &str) -> Result<UserIdentity, StoreError>;
}

/// Process-local store, used by tests and `--in-memory` runs.
#[derive(Default)]
pub struct MemoryLedgerStore {
    ledgers: RwLock<BTreeMap<UserIdentity, Vec<WagerRecord>>>,
}

impl MemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LedgerStore for MemoryLedgerStore {
    fn read(&self, user: &UserIdentity) -> Result<Vec<WagerRecord>, StoreError> {
        Ok(self.ledgers.read().get(user).cloned().unwrap_or_default())
    }

    fn append(&self, user: &UserIdentity, records: &[WagerRecord]) -> Result<usize, StoreError> {
        self.ledgers
            .write()
            .entry(user.clone())
            .or_default()
            .extend_from_slice(records);
        Ok(records.len())
    }

    fn list_users(&self) -> Result<Vec<UserIdentity>, StoreError> {
        Ok(self.ledgers.read().keys().cloned().collect())
    }

    fn add_user(&self, name: &str) -> Result<UserIdentity, StoreError> {
        let user = UserIdentity::new(name)?;
        let mut ledgers = self.ledgers.write();
        if ledgers.contains_key(&user) {
            return Err(StoreError::DuplicateUser(user.to_string()));
        }
        ledgers.insert(user.clone(), Vec::new());
        Ok(user)
    }
}
