use std::sync::Arc;

use chrono::Utc;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use crate::engine::saga::{Saga, SagaOutcome};
use crate::engine::{OrchestratorConfig, OrchestratorError};
use crate::events::{EventPublisher, LedgerEvent, SettlementGateway, SettlementInstruction};
use crate::ledger::Ledger;
use crate::models::{
    DateRange, Destination, EntryKind, Transaction, TransactionDraft, TransactionRequest, TransactionStatus
};
use crate::storage::{StoreError, TransactionStore};
use crate::types::{AccountId, TransactionId};

/// How a caller identifies a stored transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransactionLookup {
    Id(TransactionId),
    Reference(String)
}

/// Turns transaction requests into ledger postings and a final record.
///
/// The orchestrator is the only writer of transaction status. Each request
/// goes through validate, record as pending, post, finalize and announce, in
/// that order, and a request replayed under a known reference stops at the
/// record it already produced.
pub struct FundsOrchestrator {
    ledger: Arc<dyn Ledger>,
    store: Arc<dyn TransactionStore>,
    publisher: Arc<dyn EventPublisher>,
    settlement: Arc<dyn SettlementGateway>,
    config: OrchestratorConfig
}

impl FundsOrchestrator {
    pub fn new(
        ledger: Arc<dyn Ledger>,
        store: Arc<dyn TransactionStore>,
        publisher: Arc<dyn EventPublisher>,
        settlement: Arc<dyn SettlementGateway>,
        config: OrchestratorConfig
    ) -> Self {
        Self { ledger, store, publisher, settlement, config }
    }

    /// Executes a deposit, withdrawal or transfer.
    ///
    /// Business failures such as an insufficient balance are returned as a
    /// `FAILED` transaction, not as an error.
    ///
    /// # Errors
    /// Returns `OrchestratorError` if:
    /// - The request is malformed, no record is created then.
    /// - The reference belongs to a different transaction, or to one that is still pending.
    /// - The store cannot persist the record.
    pub async fn create_transaction(&self, request: TransactionRequest) -> Result<Transaction, OrchestratorError> {
        let draft = request.validate()?;

        if let Some(reference) = &draft.reference
            && let Some(existing) = self.store.find_by_reference(reference.as_str())?
        {
            return replay(existing, &draft);
        }

        let transaction = match self.store.create(draft.clone()) {
            Ok(transaction) => transaction,
            Err(StoreError::DuplicateReference { reference }) => {
                //NOTE: Another request with the same reference won the insert since the lookup above
                let existing = self.store.find_by_reference(reference.as_str())?
                    .ok_or(OrchestratorError::Store(StoreError::DuplicateReference { reference }))?;

                return replay(existing, &draft);
            }
            Err(error) => return Err(error.into())
        };

        debug!("Transaction [{}]:[{}] recorded as pending", transaction.transaction_id, transaction.reference);

        let outcome = Saga::new(self.ledger.as_ref(), &self.config, &transaction).run().await;
        let finalized = self.finalize(&transaction, &outcome).await?;

        self.announce(&finalized, &outcome);

        Ok(finalized)
    }

    /// # Errors
    /// Returns `OrchestratorError::NotFound` when nothing matches the lookup.
    pub fn get_transaction(&self, lookup: TransactionLookup) -> Result<Transaction, OrchestratorError> {
        let found = match &lookup {
            TransactionLookup::Id(transaction_id) => self.store.find_by_id(*transaction_id)?,
            TransactionLookup::Reference(reference) => self.store.find_by_reference(reference)?
        };

        found.ok_or_else(|| match lookup {
            TransactionLookup::Id(transaction_id) => OrchestratorError::NotFound(transaction_id.to_string()),
            TransactionLookup::Reference(reference) => OrchestratorError::NotFound(reference)
        })
    }

    /// Transactions where the account is the source or the local destination, newest first.
    pub fn list_transactions_for_account(&self, account_id: AccountId, range: Option<DateRange>) -> Result<Vec<Transaction>, OrchestratorError> {
        let transactions = match range {
            Some(range) => self.store.find_by_account_and_date_range(account_id, &range)?,
            None => self.store.find_by_account(account_id)?
        };

        Ok(transactions)
    }

    /// Transactions an operator still has to settle by hand.
    pub fn transactions_needing_reconciliation(&self) -> Result<Vec<Transaction>, OrchestratorError> {
        Ok(self.store.find_by_status(TransactionStatus::NeedsReconciliation)?)
    }

    /// Writes the saga's outcome to the record, retrying while the store is unavailable.
    async fn finalize(&self, transaction: &Transaction, outcome: &SagaOutcome) -> Result<Transaction, OrchestratorError> {
        let mut round = 0;

        loop {
            match self.store.finalize(transaction.transaction_id, outcome.status, outcome.reason.clone()) {
                Ok(finalized) => return Ok(finalized),
                Err(error) if error.is_transient() && round < self.config.verify_attempts => {
                    round += 1;
                    warn!("Transaction [{}] could not be finalized (round {round}): {error}", transaction.reference);
                    sleep(self.config.backoff(round)).await;
                }
                Err(error) => {
                    //NOTE: Postings may already be on the ledger while the record stays pending
                    error!(
                        "Transaction [{}]:[{}] reached [{:?}] but could not be finalized: {error}",
                        transaction.transaction_id, transaction.reference, outcome.status
                    );
                    return Err(error.into());
                }
            }
        }
    }

    /// Publishes the outcome. Nothing in here can change it.
    fn announce(&self, transaction: &Transaction, outcome: &SagaOutcome) {
        let timestamp = transaction.completed_at.unwrap_or_else(Utc::now);

        match transaction.status {
            TransactionStatus::NeedsReconciliation => error!(
                "Transaction [{}]:[{}] needs reconciliation: {}",
                transaction.transaction_id,
                transaction.reference,
                transaction.failure_reason.as_ref().map(ToString::to_string).unwrap_or_default()
            ),
            status => info!("Transaction [{}]:[{}] finalized as [{status:?}]", transaction.transaction_id, transaction.reference)
        }

        self.publish(LedgerEvent::TransactionCreated {
            transaction_id: transaction.transaction_id,
            reference: transaction.reference.clone(),
            transaction_type: transaction.transaction_type,
            source_account_id: transaction.source_account_id,
            destination: transaction.destination.clone(),
            amount: transaction.amount,
            description: transaction.description.clone(),
            status: transaction.status,
            created_at: transaction.created_at
        });

        for posting in &outcome.postings {
            let event = match posting.kind {
                EntryKind::Debit => LedgerEvent::AccountDebited {
                    account_id: posting.account_id,
                    amount: posting.amount,
                    reference: transaction.reference.clone(),
                    timestamp
                },
                EntryKind::Credit | EntryKind::Compensation => LedgerEvent::AccountCredited {
                    account_id: posting.account_id,
                    amount: posting.amount,
                    reference: transaction.reference.clone(),
                    timestamp
                }
            };

            self.publish(event);
        }

        if transaction.status == TransactionStatus::NeedsReconciliation {
            self.publish(LedgerEvent::ReconciliationRequired {
                transaction_id: transaction.transaction_id,
                reference: transaction.reference.clone(),
                reason: transaction.failure_reason.clone(),
                timestamp
            });
        }

        if transaction.status == TransactionStatus::Completed
            && let Some(Destination::External(iban)) = &transaction.destination
        {
            let instruction = SettlementInstruction {
                transaction_id: transaction.transaction_id,
                reference: transaction.reference.clone(),
                source_account_id: transaction.source_account_id,
                iban: iban.clone(),
                amount: transaction.amount,
                debited_at: timestamp
            };

            if let Err(error) = self.settlement.notify_debit(instruction) {
                warn!("Settlement of transaction [{}] was not handed off: {error}", transaction.reference);
            }
        }
    }

    fn publish(&self, event: LedgerEvent) {
        if let Err(error) = self.publisher.publish(event) {
            warn!("{error}");
        }
    }
}

/// Resolves a request whose reference is already on record.
fn replay(existing: Transaction, draft: &TransactionDraft) -> Result<Transaction, OrchestratorError> {
    if !existing.matches(draft) {
        return Err(OrchestratorError::ReferenceConflict { reference: existing.reference });
    }

    if !existing.status.is_terminal() {
        return Err(OrchestratorError::InProgress { reference: existing.reference });
    }

    debug!("Transaction [{}]:[{}] replayed, returning the recorded outcome", existing.transaction_id, existing.reference);

    Ok(existing)
}
