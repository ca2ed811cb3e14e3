use super::{
    spawn_event_logger, ChannelPublisher, EventPublisher, LedgerEvent, PublishError, SettlementGateway,
    SettlementInstruction
};
use crate::types::{Monetary, TransactionReference};
use anyhow::Result;
use chrono::Utc;
use std::str::FromStr;

fn credited(account_id: u64) -> Result<LedgerEvent> {
    Ok(LedgerEvent::AccountCredited {
        account_id,
        amount: Monetary::from_str("10.00")?,
        reference: TransactionReference::from_str("TXN-000000000001")?,
        timestamp: Utc::now()
    })
}

#[tokio::test]
async fn test_published_events_reach_the_consumer() -> Result<()> {
    let (publisher, mut receiver) = ChannelPublisher::new(4);

    publisher.publish(credited(1)?)?;

    let event = receiver.recv().await;

    assert!(matches!(event, Some(LedgerEvent::AccountCredited { account_id: 1, .. })));

    Ok(())
}

#[tokio::test]
async fn test_full_queue_rejects_without_blocking() -> Result<()> {
    let (publisher, _receiver) = ChannelPublisher::new(1);

    publisher.publish(credited(1)?)?;

    assert_eq!(publisher.publish(credited(2)?), Err(PublishError::Backpressure("account.credited")));

    Ok(())
}

#[tokio::test]
async fn test_closed_queue_is_reported() -> Result<()> {
    let (publisher, receiver) = ChannelPublisher::<SettlementInstruction>::new(1);
    drop(receiver);

    let instruction = SettlementInstruction {
        transaction_id: 1,
        reference: TransactionReference::from_str("TXN-000000000001")?,
        source_account_id: 1,
        iban: "FR7630006000011234567890189".to_string(),
        amount: Monetary::from_str("10.00")?,
        debited_at: Utc::now()
    };

    assert_eq!(publisher.notify_debit(instruction), Err(PublishError::Closed("settlement.debit")));

    Ok(())
}

#[tokio::test]
async fn test_event_logger_drains_until_publisher_drops() -> Result<()> {
    let (publisher, receiver) = ChannelPublisher::new(8);
    let logger = spawn_event_logger(receiver);

    publisher.publish(credited(1)?)?;
    publisher.publish(credited(2)?)?;
    drop(publisher);

    assert_eq!(logger.await?, 2);

    Ok(())
}

#[test]
fn test_events_serialize_with_their_tag() -> Result<()> {
    let payload = serde_json::to_value(credited(3)?)?;

    assert_eq!(payload["event"], "account_credited");
    assert_eq!(payload["amount"], "10.00");
    assert_eq!(payload["reference"], "TXN-000000000001");

    Ok(())
}
