//! Outcome notifications.
//!
//! Events are an eventual-consistency channel for downstream consumers, not
//! part of the consistency protocol: publishing never blocks and a failed
//! publish never changes a transaction's outcome.

mod channel;
#[cfg(test)]
mod tests;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

use crate::models::{Destination, FailureReason, TransactionStatus, TransactionType};
use crate::types::{AccountId, Monetary, TransactionId, TransactionReference};

pub use channel::{spawn_event_logger, spawn_settlement_logger, ChannelPublisher};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum LedgerEvent {
    TransactionCreated {
        transaction_id: TransactionId,
        reference: TransactionReference,
        transaction_type: TransactionType,
        source_account_id: AccountId,
        destination: Option<Destination>,
        amount: Monetary,
        description: Option<String>,
        status: TransactionStatus,
        created_at: DateTime<Utc>
    },
    AccountCredited {
        account_id: AccountId,
        amount: Monetary,
        reference: TransactionReference,
        timestamp: DateTime<Utc>
    },
    AccountDebited {
        account_id: AccountId,
        amount: Monetary,
        reference: TransactionReference,
        timestamp: DateTime<Utc>
    },
    ReconciliationRequired {
        transaction_id: TransactionId,
        reference: TransactionReference,
        reason: Option<FailureReason>,
        timestamp: DateTime<Utc>
    }
}

impl LedgerEvent {
    /// Routing key of the event.
    pub fn kind(&self) -> &'static str {
        match self {
            LedgerEvent::TransactionCreated { .. } => "transaction.created",
            LedgerEvent::AccountCredited { .. } => "account.credited",
            LedgerEvent::AccountDebited { .. } => "account.debited",
            LedgerEvent::ReconciliationRequired { .. } => "transaction.reconciliation_required"
        }
    }
}

/// Instruction for the external settlement system after a local debit towards an IBAN.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SettlementInstruction {
    pub transaction_id: TransactionId,
    pub reference: TransactionReference,
    pub source_account_id: AccountId,
    pub iban: String,
    pub amount: Monetary,
    pub debited_at: DateTime<Utc>
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PublishError {
    #[error("Publisher queue is full, [{0}] dropped")]
    Backpressure(&'static str),
    #[error("Publisher is closed, [{0}] dropped")]
    Closed(&'static str)
}

/// Fan-out of ledger events. Implementations must return without waiting on I/O.
pub trait EventPublisher: Send + Sync + 'static {
    fn publish(&self, event: LedgerEvent) -> Result<(), PublishError>;
}

/// Hand-off to the settlement system for transfers leaving the ledger.
/// No response is awaited.
pub trait SettlementGateway: Send + Sync + 'static {
    fn notify_debit(&self, instruction: SettlementInstruction) -> Result<(), PublishError>;
}
