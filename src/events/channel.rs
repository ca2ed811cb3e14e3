use tokio::spawn;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::events::{EventPublisher, LedgerEvent, PublishError, SettlementGateway, SettlementInstruction};

/// Bounded in-process queue standing in for the message broker.
///
/// A full queue drops the message instead of waiting, consumers are expected
/// to tolerate gaps the same way they tolerate an at-least-once broker.
pub struct ChannelPublisher<T> {
    sender: mpsc::Sender<T>
}

impl<T> ChannelPublisher<T> {
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<T>) {
        let (sender, receiver) = mpsc::channel(capacity);
        (Self { sender }, receiver)
    }

    fn offer(&self, message: T, kind: &'static str) -> Result<(), PublishError> {
        self.sender.try_send(message).map_err(|error| match error {
            TrySendError::Full(_) => PublishError::Backpressure(kind),
            TrySendError::Closed(_) => PublishError::Closed(kind)
        })
    }
}

impl EventPublisher for ChannelPublisher<LedgerEvent> {
    fn publish(&self, event: LedgerEvent) -> Result<(), PublishError> {
        let kind = event.kind();
        self.offer(event, kind)
    }
}

impl SettlementGateway for ChannelPublisher<SettlementInstruction> {
    fn notify_debit(&self, instruction: SettlementInstruction) -> Result<(), PublishError> {
        self.offer(instruction, "settlement.debit")
    }
}

/// Drains the event queue into the log as JSON lines.
pub fn spawn_event_logger(mut receiver: mpsc::Receiver<LedgerEvent>) -> JoinHandle<usize> {
    spawn(async move {
        let mut delivered = 0;

        while let Some(event) = receiver.recv().await {
            match serde_json::to_string(&event) {
                Ok(payload) => debug!("Event [{}]: {payload}", event.kind()),
                Err(error) => warn!("Event [{}] could not be serialized: {error}", event.kind())
            }
            delivered += 1;
        }

        delivered
    })
}

/// Drains settlement instructions into the log.
pub fn spawn_settlement_logger(mut receiver: mpsc::Receiver<SettlementInstruction>) -> JoinHandle<usize> {
    spawn(async move {
        let mut delivered = 0;

        while let Some(instruction) = receiver.recv().await {
            info!(
                "Settlement of [{}] from account [{}] to [{}] handed off for [{}]",
                instruction.amount, instruction.source_account_id, instruction.iban, instruction.reference
            );
            delivered += 1;
        }

        delivered
    })
}
