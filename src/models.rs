use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Name shown in user pickers as the "create a new user" entry.
/// Never a valid identity.
pub const NEW_USER_SENTINEL: &str = "New User";

/// One wager read off a slip.
///
/// Amounts are always finite and non-negative; use [`WagerRecord::new`] to build one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WagerRecord {
    amount_wagered: f64,
    amount_won: f64,
    date: Option<NaiveDate>,
}

impl WagerRecord {
    pub fn new(amount_wagered: f64, amount_won: f64, date: Option<NaiveDate>) -> Option<Self> {
        let valid = |v: f64| v.is_finite() && v >= 0.0;
        if !valid(amount_wagered) || !valid(amount_won) {
            return None;
        }
        Some(Self {
            amount_wagered,
            amount_won,
            date,
        })
    }

    pub fn amount_wagered(&self) -> f64 {
        self.amount_wagered
    }

    pub fn amount_won(&self) -> f64 {
        self.amount_won
    }

    pub fn date(&self) -> Option<NaiveDate> {
        self.date
    }

    /// A push (won == wagered) is not a win.
    pub fn is_win(&self) -> bool {
        self.amount_won > self.amount_wagered
    }

    /// Amount won minus amount wagered.
    pub fn differential(&self) -> f64 {
        self.amount_won - self.amount_wagered
    }
}

/// Display name of a ledger owner.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct UserIdentity(String);

impl UserIdentity {
    pub fn new(name: &str) -> Result<Self, IdentityError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(IdentityError::Empty);
        }
        if name == NEW_USER_SENTINEL {
            return Err(IdentityError::Reserved);
        }
        Ok(Self(name.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for UserIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for UserIdentity {
    type Err = IdentityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentityError {
    Empty,
    Reserved,
}

impl std::fmt::Display for IdentityError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IdentityError::Empty => write!(f, "user name must not be empty"),
            IdentityError::Reserved => {
                write!(f, "\"{}\" is reserved and cannot be a user name", NEW_USER_SENTINEL)
            }
        }
    }
}

impl std::error::Error for IdentityError {}
