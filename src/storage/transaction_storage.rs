use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tracing::{debug, warn};

use crate::models::{DateRange, FailureReason, Transaction, TransactionDraft, TransactionStatus};
use crate::storage::{StoreError, TransactionStore};
use crate::types::{AccountId, TransactionId, TransactionReference};

const REFERENCE_ATTEMPTS: usize = 16;

/// In-memory transaction table with a unique index on the reference.
pub struct TransactionStorage {
    records: DashMap<TransactionId, Transaction>,
    references: DashMap<TransactionReference, TransactionId>,
    next_id: AtomicU64
}

impl TransactionStorage {
    pub fn new() -> Self {
        Self {
            records: DashMap::new(),
            references: DashMap::new(),
            next_id: AtomicU64::new(1)
        }
    }

    /// Every stored transaction ordered by id.
    pub fn snapshot(&self) -> Vec<Transaction> {
        let mut transactions: Vec<Transaction> = self.records.iter().map(|item| item.value().clone()).collect();
        transactions.sort_by_key(|transaction| transaction.transaction_id);
        transactions
    }

    /// Reserves `reference` and inserts the record in one step.
    ///
    /// The reference shard stays locked while the record is written, so a
    /// reader that finds the reference always finds the record as well.
    fn insert(&self, reference: TransactionReference, draft: &TransactionDraft) -> Result<Transaction, StoreError> {
        match self.references.entry(reference) {
            Entry::Occupied(entry) => Err(StoreError::DuplicateReference { reference: entry.key().clone() }),
            Entry::Vacant(entry) => {
                let transaction_id = self.next_id.fetch_add(1, Ordering::Relaxed);
                let transaction = Transaction::pending(transaction_id, entry.key().clone(), draft.clone());

                self.records.insert(transaction_id, transaction.clone());
                entry.insert(transaction_id);

                Ok(transaction)
            }
        }
    }

    fn collect<F>(&self, predicate: F) -> Vec<Transaction>
    where
        F: Fn(&Transaction) -> bool
    {
        let mut transactions: Vec<Transaction> = self.records.iter()
            .filter(|item| predicate(item.value()))
            .map(|item| item.value().clone())
            .collect();

        transactions.sort_by(|a, b| {
            b.created_at.cmp(&a.created_at).then(b.transaction_id.cmp(&a.transaction_id))
        });

        transactions
    }
}

impl Default for TransactionStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl TransactionStore for TransactionStorage {
    fn create(&self, draft: TransactionDraft) -> Result<Transaction, StoreError> {
        if let Some(reference) = draft.reference.clone() {
            return self.insert(reference, &draft);
        }

        for attempt in 1..=REFERENCE_ATTEMPTS {
            match self.insert(TransactionReference::generate(), &draft) {
                Err(StoreError::DuplicateReference { reference }) => {
                    warn!("Generated reference [{reference}] collided on attempt {attempt}");
                }
                result => return result
            }
        }

        Err(StoreError::ReferenceSpaceExhausted { attempts: REFERENCE_ATTEMPTS })
    }

    fn finalize(&self, transaction_id: TransactionId, status: TransactionStatus, reason: Option<FailureReason>) -> Result<Transaction, StoreError> {
        if !status.is_terminal() {
            return Err(StoreError::NotTerminal { transaction_id, status });
        }

        let mut record = self.records.get_mut(&transaction_id)
            .ok_or(StoreError::NotFound { transaction_id })?;

        if record.status.is_terminal() {
            return Err(StoreError::AlreadyFinalized { transaction_id, status: record.status });
        }

        record.status = status;
        record.failure_reason = reason;
        record.completed_at = Some(Utc::now());

        debug!("Transaction [{}]:[{}] finalized as [{:?}]", transaction_id, record.reference, status);

        Ok(record.clone())
    }

    fn find_by_id(&self, transaction_id: TransactionId) -> Result<Option<Transaction>, StoreError> {
        Ok(self.records.get(&transaction_id).map(|item| item.value().clone()))
    }

    fn find_by_reference(&self, reference: &str) -> Result<Option<Transaction>, StoreError> {
        let Ok(reference) = reference.parse::<TransactionReference>() else {
            return Ok(None)
        };

        let Some(transaction_id) = self.references.get(&reference).map(|item| *item.value()) else {
            return Ok(None)
        };

        self.find_by_id(transaction_id)
    }

    fn find_by_account(&self, account_id: AccountId) -> Result<Vec<Transaction>, StoreError> {
        Ok(self.collect(|transaction| transaction.involves(account_id)))
    }

    fn find_by_account_and_date_range(&self, account_id: AccountId, range: &DateRange) -> Result<Vec<Transaction>, StoreError> {
        Ok(self.collect(|transaction| transaction.involves(account_id) && range.contains(transaction.created_at)))
    }

    fn find_by_status(&self, status: TransactionStatus) -> Result<Vec<Transaction>, StoreError> {
        Ok(self.collect(|transaction| transaction.status == status))
    }
}
