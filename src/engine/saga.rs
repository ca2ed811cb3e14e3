use tokio::time::{sleep, timeout};
use tracing::{debug, warn};

use crate::engine::OrchestratorConfig;
use crate::ledger::Ledger;
use crate::models::{
    Destination, EntryKey, EntryKind, FailureReason, LedgerError, Transaction, TransactionStatus,
    TransactionType
};
use crate::types::{AccountId, Monetary};

/// How a single ledger posting ended, once every retry is spent.
#[derive(Debug)]
pub(crate) enum StepOutcome {
    Applied,
    Rejected(LedgerError),
    /// Neither confirmed nor ruled out. Must not be compensated.
    Unresolved
}

/// A posting the saga knows to be on the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct AppliedPosting {
    pub account_id: AccountId,
    pub kind: EntryKind,
    pub amount: Monetary
}

#[derive(Debug)]
pub(crate) struct SagaOutcome {
    pub status: TransactionStatus,
    pub reason: Option<FailureReason>,
    pub postings: Vec<AppliedPosting>
}

/// Drives the ledger steps of one pending transaction.
///
/// Every step is keyed by `(transaction id, entry kind)`, so re-submitting a
/// step whose outcome was lost can never apply it twice.
pub(crate) struct Saga<'a> {
    ledger: &'a dyn Ledger,
    config: &'a OrchestratorConfig,
    transaction: &'a Transaction,
    postings: Vec<AppliedPosting>
}

impl<'a> Saga<'a> {
    pub fn new(ledger: &'a dyn Ledger, config: &'a OrchestratorConfig, transaction: &'a Transaction) -> Self {
        Self {
            ledger,
            config,
            transaction,
            postings: Vec::new()
        }
    }

    pub async fn run(mut self) -> SagaOutcome {
        let source = self.transaction.source_account_id;

        let (status, reason) = match (self.transaction.transaction_type, self.transaction.destination.clone()) {
            (TransactionType::Deposit, _) => self.single(source, EntryKind::Credit).await,
            (TransactionType::Withdrawal, _) => self.single(source, EntryKind::Debit).await,
            (TransactionType::Transfer, Some(Destination::Account(destination))) => self.transfer(source, destination).await,
            (TransactionType::Transfer, Some(Destination::External(_))) => self.single(source, EntryKind::Debit).await,
            (TransactionType::Transfer, None) => {
                //NOTE: Validation guarantees a destination, a record without one is left for an operator
                warn!("Transfer [{}] has no destination", self.transaction.reference);
                (TransactionStatus::NeedsReconciliation, None)
            }
        };

        SagaOutcome { status, reason, postings: self.postings }
    }

    async fn single(&mut self, account_id: AccountId, kind: EntryKind) -> (TransactionStatus, Option<FailureReason>) {
        match self.step(account_id, kind).await {
            StepOutcome::Applied => (TransactionStatus::Completed, None),
            StepOutcome::Rejected(error) => (TransactionStatus::Failed, Some(error.failure_reason())),
            StepOutcome::Unresolved => unknown(account_id, kind)
        }
    }

    async fn transfer(&mut self, source: AccountId, destination: AccountId) -> (TransactionStatus, Option<FailureReason>) {
        match self.step(source, EntryKind::Debit).await {
            StepOutcome::Applied => {}
            StepOutcome::Rejected(error) => return (TransactionStatus::Failed, Some(error.failure_reason())),
            StepOutcome::Unresolved => return unknown(source, EntryKind::Debit)
        }

        let rejection = match self.step(destination, EntryKind::Credit).await {
            StepOutcome::Applied => return (TransactionStatus::Completed, None),
            StepOutcome::Rejected(error) => error,
            //NOTE: The credit may have landed, refunding the source now could create money
            StepOutcome::Unresolved => return unknown(destination, EntryKind::Credit)
        };

        debug!("Transfer [{}] credit rejected, compensating account [{source}]: {rejection}", self.transaction.reference);

        match self.step(source, EntryKind::Compensation).await {
            StepOutcome::Applied => (TransactionStatus::Failed, Some(rejection.failure_reason())),
            StepOutcome::Rejected(_) | StepOutcome::Unresolved => (
                TransactionStatus::NeedsReconciliation,
                Some(FailureReason::CompensationFailed { account_id: source })
            )
        }
    }

    /// Runs one posting to a settled outcome.
    ///
    /// A transient failure is verified against the account's journal, then the
    /// posting is re-submitted under the same key, for up to `verify_attempts` rounds.
    /// Once the rounds are spent the journal is read one last time, so a posting
    /// that never reached the account ends as rejected rather than unknown.
    async fn step(&mut self, account_id: AccountId, kind: EntryKind) -> StepOutcome {
        let key = EntryKey::new(self.transaction.transaction_id, kind);
        let mut result = self.post(account_id, key).await;

        for round in 1..=self.config.verify_attempts {
            match &result {
                Err(error) if error.is_transient() => {
                    warn!("Transaction [{}]:[{:?}] outcome unknown, verifying (round {round}): {error}", self.transaction.reference, kind);
                }
                _ => break
            }

            sleep(self.config.backoff(round)).await;

            result = match self.verify(account_id, key).await {
                Ok(Some(_)) => {
                    debug!("Transaction [{}]:[{:?}] found in the journal of account [{account_id}]", self.transaction.reference, kind);
                    Ok(())
                }
                Ok(None) => self.post(account_id, key).await,
                Err(error) => Err(error)
            };
        }

        match result {
            Ok(()) => self.applied(account_id, kind),
            Err(error) if error.is_transient() => self.settle(account_id, key, error).await,
            Err(error) => StepOutcome::Rejected(error)
        }
    }

    /// Decides a step whose last attempt still failed transiently.
    ///
    /// The account handles its mailbox in order, so a read answered after the
    /// last submission sees that submission if it ever arrived.
    async fn settle(&mut self, account_id: AccountId, key: EntryKey, error: LedgerError) -> StepOutcome {
        match self.verify(account_id, key).await {
            Ok(Some(_)) => {
                debug!("Transaction [{}]:[{:?}] found in the journal after the last retry", self.transaction.reference, key.kind);
                self.applied(account_id, key.kind)
            }
            Ok(None) => {
                warn!("Transaction [{}]:[{:?}] never reached account [{account_id}], giving up: {error}", self.transaction.reference, key.kind);
                StepOutcome::Rejected(error)
            }
            Err(read_error) => {
                warn!("Transaction [{}]:[{:?}] could not be verified on account [{account_id}]: {read_error}", self.transaction.reference, key.kind);
                StepOutcome::Unresolved
            }
        }
    }

    fn applied(&mut self, account_id: AccountId, kind: EntryKind) -> StepOutcome {
        self.postings.push(AppliedPosting { account_id, kind, amount: self.transaction.amount });
        StepOutcome::Applied
    }

    async fn post(&self, account_id: AccountId, key: EntryKey) -> Result<(), LedgerError> {
        let amount = self.transaction.amount;

        let call = async {
            match key.kind {
                EntryKind::Debit => self.ledger.debit(account_id, amount, key).await,
                EntryKind::Credit | EntryKind::Compensation => self.ledger.credit(account_id, amount, key).await
            }
        };

        match timeout(self.config.ledger_timeout, call).await {
            Ok(result) => result.map(|_| ()),
            Err(_) => Err(LedgerError::Timeout { account_id })
        }
    }

    async fn verify(&self, account_id: AccountId, key: EntryKey) -> Result<Option<Monetary>, LedgerError> {
        match timeout(self.config.ledger_timeout, self.ledger.find_entry(account_id, key)).await {
            Ok(result) => result,
            Err(_) => Err(LedgerError::Timeout { account_id })
        }
    }
}

fn unknown(account_id: AccountId, kind: EntryKind) -> (TransactionStatus, Option<FailureReason>) {
    (TransactionStatus::NeedsReconciliation, Some(FailureReason::OutcomeUnknown { account_id, kind }))
}
