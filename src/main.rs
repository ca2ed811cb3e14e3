use std::io::{stderr, stdout, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::Parser;
use serde::Serialize;
use tracing::{info, warn};
use tracing::level_filters::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, Layer};

use funds_ledger::engine::{BatchEngine, FundsOrchestrator, OrchestratorConfig};
use funds_ledger::events::{spawn_event_logger, spawn_settlement_logger, ChannelPublisher};
use funds_ledger::ledger::AccountLedger;
use funds_ledger::models::{Transaction, TransactionStatus, TransactionType};
use funds_ledger::types::Monetary;
use funds_ledger::storage::{AccountStorage, TransactionStorage};

const EVENT_QUEUE_CAPACITY: usize = 1024;

/// Replays a CSV of ledger commands and prints the resulting accounts as CSV.
#[derive(Debug, Parser)]
#[command(name = "funds-ledger", version)]
struct Args {
    /// Command file with columns type,account,destination,iban,amount,reference,description,owner,account_type
    input: PathBuf,

    /// One of error, warn, info, debug, trace
    #[arg(long, env = "FUNDS_LEDGER_LOG_LEVEL", default_value = "error", value_parser = parse_log_level)]
    log_level: LevelFilter,

    /// Transactions processed concurrently
    #[arg(long, env = "FUNDS_LEDGER_WORKERS", default_value_t = 64)]
    workers: usize,

    #[arg(long, env = "FUNDS_LEDGER_LEDGER_TIMEOUT_MS", default_value_t = 5000)]
    ledger_timeout_ms: u64,

    #[arg(long, env = "FUNDS_LEDGER_VERIFY_ATTEMPTS", default_value_t = 3)]
    verify_attempts: u32,

    #[arg(long, env = "FUNDS_LEDGER_VERIFY_BACKOFF_MS", default_value_t = 50)]
    verify_backoff_ms: u64,

    /// Also write every transaction record to this file
    #[arg(long, env = "FUNDS_LEDGER_TRANSACTIONS_OUT")]
    transactions_out: Option<PathBuf>
}

#[derive(Debug, Serialize)]
struct TransactionRow {
    id: u64,
    reference: String,
    #[serde(rename = "type")]
    transaction_type: TransactionType,
    source: u64,
    destination: String,
    amount: Monetary,
    status: TransactionStatus,
    reason: String
}

impl From<&Transaction> for TransactionRow {
    fn from(transaction: &Transaction) -> Self {
        Self {
            id: transaction.transaction_id,
            reference: transaction.reference.to_string(),
            transaction_type: transaction.transaction_type,
            source: transaction.source_account_id,
            destination: transaction.destination.as_ref().map(ToString::to_string).unwrap_or_default(),
            amount: transaction.amount,
            status: transaction.status,
            reason: transaction.failure_reason.as_ref().map(ToString::to_string).unwrap_or_default()
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    setup_logging(args.log_level);

    let config = OrchestratorConfig::default()
        .with_ledger_timeout(Duration::from_millis(args.ledger_timeout_ms))
        .with_verify_attempts(args.verify_attempts)
        .with_verify_backoff(Duration::from_millis(args.verify_backoff_ms));

    let accounts = Arc::new(AccountStorage::new());
    let transactions = Arc::new(TransactionStorage::new());
    let ledger = Arc::new(AccountLedger::new(accounts.clone()));

    let (events, event_queue) = ChannelPublisher::new(EVENT_QUEUE_CAPACITY);
    let (settlements, settlement_queue) = ChannelPublisher::new(EVENT_QUEUE_CAPACITY);
    let event_logger = spawn_event_logger(event_queue);
    let settlement_logger = spawn_settlement_logger(settlement_queue);

    let orchestrator = Arc::new(FundsOrchestrator::new(
        ledger.clone(),
        transactions.clone(),
        Arc::new(events),
        Arc::new(settlements),
        config
    ));

    let engine = BatchEngine::new(ledger.clone(), orchestrator).with_workers(args.workers);

    let timer = Instant::now();
    let report = engine.run(&args.input).await?;
    let duration = timer.elapsed();

    info!("Processed {} rows in: {duration:?}", report.rows);
    info!("{report:?}");

    if report.needs_reconciliation > 0 {
        warn!("{} transactions need reconciliation", report.needs_reconciliation);
    }

    //NOTE: Dropping the engine drops the last handle on the publishers, which lets the loggers drain and stop
    drop(engine);
    ledger.shutdown().await;

    let delivered = event_logger.await?;
    let settled = settlement_logger.await?;
    info!("Delivered {delivered} events and {settled} settlement instructions");

    write_accounts_to_stdout(&accounts)?;

    if let Some(path) = &args.transactions_out {
        write_transactions(&transactions, path)?;
    }

    Ok(())
}

fn parse_log_level(level: &str) -> Result<LevelFilter, String> {
    match level.to_lowercase().as_str() {
        "trace" => Ok(LevelFilter::TRACE),
        "debug" => Ok(LevelFilter::DEBUG),
        "info" => Ok(LevelFilter::INFO),
        "warn" => Ok(LevelFilter::WARN),
        "error" => Ok(LevelFilter::ERROR),
        _ => Err(format!("invalid log level '{level}', expected error, warn, info, debug or trace"))
    }
}

fn setup_logging(level: LevelFilter) {
    //NOTE: stdout carries the account table, logging goes to stderr
    let terminal_log = fmt::layer()
        .with_target(false)
        .with_writer(stderr)
        .with_filter(level);

    tracing_subscriber::registry()
        .with(terminal_log)
        .init();
}

fn write_accounts_to_stdout(storage: &AccountStorage) -> Result<()> {
    let mut output = BufWriter::new(stdout().lock());

    writeln!(output, "account,number,owner,type,balance,status,version")?;

    for account in storage.snapshot() {
        let account_type = format!("{:?}", account.account_type).to_uppercase();
        let status = format!("{:?}", account.status).to_uppercase();

        writeln!(
            output,
            "{},{},{},{},{},{},{}",
            account.account_id, account.account_number, account.owner_id, account_type, account.balance, status, account.version
        )?;
    }

    output.flush()?;

    Ok(())
}

fn write_transactions(storage: &TransactionStorage, path: &Path) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("Error creating transactions file at path: {}", path.display()))?;

    for transaction in storage.snapshot() {
        writer.serialize(TransactionRow::from(&transaction))?;
    }

    writer.flush()?;

    Ok(())
}
