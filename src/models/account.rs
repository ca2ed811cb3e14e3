use crate::models::errors::LedgerError;
use crate::models::{AccountStatus, AccountType, EntryKey};
use crate::types::{AccountId, AccountNumber, Monetary, OwnerId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Represents the state of a single ledger account.
///
/// The account owns its balance, status and the journal of postings already
/// applied to it. It knows nothing about transactions or other accounts; the
/// only way to move money is through [`Account::credit`] and [`Account::debit`].
#[derive(Debug, Clone)]
pub struct Account {
    /// The unique identifier for the account.
    pub account_id: AccountId,
    /// Unique customer-facing number, fixed at opening.
    pub account_number: AccountNumber,
    /// The client holding the account.
    pub owner_id: OwnerId,
    pub account_type: AccountType,
    /// Funds held by the account, never negative.
    pub balance: Monetary,
    /// Whether the account accepts postings.
    pub status: AccountStatus,
    /// Bumped on every committed change.
    pub version: u64,
    pub created_at: DateTime<Utc>,
    /// Time of the last committed change.
    pub updated_at: DateTime<Utc>,
    /// Every posting ever applied to the account, mapped by its key.
    ///
    /// Entries are kept for the whole life of the account and never pruned: a
    /// replayed posting, or a verification of a lost reply, may arrive at any
    /// time and must still find the posting it refers to.
    entries: HashMap<EntryKey, Monetary>
}

/// Who holds an account and what kind of account it is, given when it is opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountProfile {
    pub owner_id: OwnerId,
    pub account_type: AccountType
}

impl AccountProfile {
    pub fn new(owner_id: OwnerId, account_type: AccountType) -> Self {
        Self { owner_id, account_type }
    }
}

/// Read-only view of an account returned by the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccountSummary {
    pub account_id: AccountId,
    pub account_number: AccountNumber,
    pub owner_id: OwnerId,
    pub account_type: AccountType,
    pub balance: Monetary,
    pub status: AccountStatus,
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>
}

/// Result of a posting that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Posting {
    /// The balance changed.
    Applied,
    /// The key had already been applied, the balance was left alone.
    Replayed
}

impl Account {
    /// Creates a new, empty and active account.
    pub fn new(account_id: AccountId, account_number: AccountNumber, profile: AccountProfile) -> Self {
        let now = Utc::now();

        Self {
            account_id,
            account_number,
            owner_id: profile.owner_id,
            account_type: profile.account_type,
            balance: Monetary::zero(),
            status: AccountStatus::Active,
            version: 0,
            created_at: now,
            updated_at: now,
            entries: HashMap::new()
        }
    }

    /// Increases the balance by `amount`.
    ///
    /// # Errors
    /// Returns `LedgerError` if:
    /// - The account is not active.
    /// - The amount is not positive.
    /// - The balance would overflow.
    pub fn credit(&mut self, amount: Monetary, key: EntryKey) -> Result<Posting, LedgerError> {
        if self.entries.contains_key(&key) {
            return Ok(Posting::Replayed)
        }

        self.check_postable(amount)?;

        self.balance = self.balance.checked_add(amount)
            .ok_or_else(|| LedgerError::overflow(self))?;

        self.record(key, amount);

        Ok(Posting::Applied)
    }

    /// Decreases the balance by `amount`.
    ///
    /// The balance check and the subtraction happen in the same call, callers
    /// never read the balance and then write it.
    ///
    /// # Errors
    /// Same as [`Account::credit`], plus `InsufficientBalance` when the balance
    /// is lower than `amount`.
    pub fn debit(&mut self, amount: Monetary, key: EntryKey) -> Result<Posting, LedgerError> {
        if self.entries.contains_key(&key) {
            return Ok(Posting::Replayed)
        }

        self.check_postable(amount)?;

        if self.balance < amount {
            return Err(LedgerError::insufficient_balance(self, amount))
        }

        self.balance = self.balance.checked_sub(amount)
            .ok_or_else(|| LedgerError::overflow(self))?;

        self.record(key, amount);

        Ok(Posting::Applied)
    }

    /// Moves the account to `status`.
    ///
    /// Active and suspended accounts may switch freely; closing needs a zero
    /// balance and is final.
    pub fn set_status(&mut self, status: AccountStatus) -> Result<(), LedgerError> {
        if self.status == status {
            return Ok(())
        }

        match (self.status, status) {
            (AccountStatus::Closed, _) => return Err(LedgerError::invalid_transition(self, status)),
            (_, AccountStatus::Closed) if !self.balance.is_zero() => return Err(LedgerError::non_zero_balance(self)),
            _ => {}
        }

        self.status = status;
        self.touch();

        Ok(())
    }

    /// The amount posted under `key`, if that posting was applied.
    pub fn entry(&self, key: &EntryKey) -> Option<Monetary> {
        self.entries.get(key).copied()
    }

    pub fn summary(&self) -> AccountSummary {
        AccountSummary {
            account_id: self.account_id,
            account_number: self.account_number.clone(),
            owner_id: self.owner_id,
            account_type: self.account_type,
            balance: self.balance,
            status: self.status,
            version: self.version,
            created_at: self.created_at,
            updated_at: self.updated_at
        }
    }

    fn check_postable(&self, amount: Monetary) -> Result<(), LedgerError> {
        if self.status != AccountStatus::Active {
            return Err(LedgerError::not_active(self))
        }

        if !amount.is_positive() {
            return Err(LedgerError::invalid_amount(self, amount))
        }

        Ok(())
    }

    fn record(&mut self, key: EntryKey, amount: Monetary) {
        self.entries.insert(key, amount);
        self.touch();
    }

    fn touch(&mut self) {
        self.version += 1;
        self.updated_at = Utc::now();
    }
}
