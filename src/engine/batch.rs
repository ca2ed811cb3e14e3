use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use csv::{ReaderBuilder, Trim};
use serde::Deserialize;
use tokio::sync::{mpsc, watch, Semaphore};
use tokio::task::{spawn_blocking, JoinError, JoinHandle, JoinSet};
use tracing::{error, warn};

use crate::engine::{FundsOrchestrator, OrchestratorError};
use crate::ledger::AccountLedger;
use crate::models::{AccountProfile, AccountStatus, AccountType, Transaction, TransactionRequest, TransactionStatus, TransactionType};
use crate::storage::Storage;
use crate::types::{AccountId, Monetary, OwnerId, TransactionReference};

const DEFAULT_WORKERS: usize = 64;
const DEFAULT_BACKPRESSURE: usize = 256;

/// One row of the command file.
#[derive(Debug, Clone, Deserialize)]
pub struct CommandRecord {
    #[serde(rename = "type")]
    pub command: CommandType,
    pub account: AccountId,
    #[serde(default)]
    pub destination: Option<AccountId>,
    #[serde(default)]
    pub iban: Option<String>,
    #[serde(default)]
    pub amount: Option<Monetary>,
    #[serde(default)]
    pub reference: Option<TransactionReference>,
    #[serde(default)]
    pub description: Option<String>,
    /// Client holding the account, `open` rows only.
    #[serde(default)]
    pub owner: Option<OwnerId>,
    /// `open` rows only.
    #[serde(default)]
    pub account_type: Option<AccountType>
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommandType {
    Open,
    Suspend,
    Activate,
    Close,
    Deposit,
    Withdrawal,
    Transfer
}

enum Command {
    /// Carries no profile when the row lacks an owner or an account type.
    Open(AccountId, Option<AccountProfile>),
    SetStatus(AccountId, AccountStatus),
    Move(TransactionRequest)
}

impl From<CommandRecord> for Command {
    fn from(record: CommandRecord) -> Self {
        let transaction_type = match record.command {
            CommandType::Open => {
                let profile = record.owner.zip(record.account_type)
                    .map(|(owner_id, account_type)| AccountProfile::new(owner_id, account_type));

                return Command::Open(record.account, profile)
            }
            CommandType::Suspend => return Command::SetStatus(record.account, AccountStatus::Suspended),
            CommandType::Activate => return Command::SetStatus(record.account, AccountStatus::Active),
            CommandType::Close => return Command::SetStatus(record.account, AccountStatus::Closed),
            CommandType::Deposit => TransactionType::Deposit,
            CommandType::Withdrawal => TransactionType::Withdrawal,
            CommandType::Transfer => TransactionType::Transfer
        };

        //NOTE: A missing amount is left as zero and rejected by validation like any other non-positive amount
        Command::Move(TransactionRequest {
            transaction_type,
            source_account_id: record.account,
            destination_account_id: record.destination,
            destination_iban: record.iban,
            amount: record.amount.unwrap_or_default(),
            description: record.description,
            reference: record.reference
        })
    }
}

/// Totals of one batch run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub rows: usize,
    pub malformed: usize,
    pub completed: usize,
    pub failed: usize,
    pub needs_reconciliation: usize,
    /// Rows refused before producing an outcome: invalid requests, reference conflicts, account commands.
    pub rejected: usize
}

impl BatchReport {
    fn tally(&mut self, result: Result<Result<Transaction, OrchestratorError>, JoinError>) {
        match result {
            Ok(Ok(transaction)) => match transaction.status {
                TransactionStatus::Completed => self.completed += 1,
                TransactionStatus::Failed => self.failed += 1,
                TransactionStatus::NeedsReconciliation => self.needs_reconciliation += 1,
                TransactionStatus::Pending => {}
            },
            Ok(Err(error)) => {
                warn!("Transaction request rejected: {error}");
                self.rejected += 1;
            }
            Err(error) => {
                error!("Transaction task did not complete: {error:?}");
                self.rejected += 1;
            }
        }
    }
}

/// Orders requests per account while letting unrelated accounts run in parallel.
///
/// Each request waits for the previous request touching any of its accounts.
#[derive(Default)]
struct Sequencer {
    tails: HashMap<AccountId, watch::Receiver<bool>>
}

impl Sequencer {
    fn enqueue(&mut self, request: &TransactionRequest) -> (Vec<watch::Receiver<bool>>, watch::Sender<bool>) {
        let (done, receiver) = watch::channel(false);
        let mut accounts = vec![request.source_account_id];

        if let Some(destination) = request.destination_account_id
            && destination != request.source_account_id
        {
            accounts.push(destination);
        }

        let predecessors = accounts.into_iter()
            .filter_map(|account_id| self.tails.insert(account_id, receiver.clone()))
            .collect();

        (predecessors, done)
    }

    fn clear(&mut self) {
        self.tails.clear();
    }
}

/// Replays a CSV of ledger commands through the orchestrator.
///
/// Transactions run concurrently up to the worker limit, account commands
/// (open, suspend, activate, close) wait for everything before them to finish.
pub struct BatchEngine<S: Storage> {
    ledger: Arc<AccountLedger<S>>,
    orchestrator: Arc<FundsOrchestrator>,
    workers: usize,
    backpressure: usize
}

impl<S: Storage> BatchEngine<S> {
    pub fn new(ledger: Arc<AccountLedger<S>>, orchestrator: Arc<FundsOrchestrator>) -> Self {
        Self {
            ledger,
            orchestrator,
            workers: DEFAULT_WORKERS,
            backpressure: DEFAULT_BACKPRESSURE
        }
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    /// Processes every row of the file at `path`.
    ///
    /// # Errors
    /// Returns an error if the file cannot be opened. Malformed rows are logged and counted, not fatal.
    pub async fn run(&self, path: impl AsRef<Path>) -> anyhow::Result<BatchReport> {
        let (sender, receiver) = mpsc::channel::<CommandRecord>(self.backpressure);
        let csv_handle = spawn_csv_reader(path.as_ref().to_path_buf(), sender);
        let mut report = self.process_commands(receiver).await;

        report.malformed = csv_handle.await.context("CSV reader task failed")??;

        Ok(report)
    }

    async fn process_commands(&self, mut receiver: mpsc::Receiver<CommandRecord>) -> BatchReport {
        let permits = Arc::new(Semaphore::new(self.workers));
        let mut in_flight = JoinSet::new();
        let mut sequencer = Sequencer::default();
        let mut report = BatchReport::default();

        while let Some(record) = receiver.recv().await {
            report.rows += 1;

            let request = match Command::from(record) {
                Command::Move(request) => request,
                command => {
                    //NOTE: Account commands act as barriers, every earlier row settles before the account changes
                    drain(&mut in_flight, &mut report).await;
                    sequencer.clear();
                    self.administer(command, &mut report).await;
                    continue;
                }
            };

            let Ok(permit) = permits.clone().acquire_owned().await else {
                error!("Worker pool closed, stopping at row {}", report.rows);
                break;
            };

            let (predecessors, done) = sequencer.enqueue(&request);
            let orchestrator = self.orchestrator.clone();

            in_flight.spawn(async move {
                let _permit = permit;

                for mut predecessor in predecessors {
                    let _ = predecessor.wait_for(|finished| *finished).await;
                }

                let result = orchestrator.create_transaction(request).await;
                let _ = done.send(true);

                result
            });

            while let Some(result) = in_flight.try_join_next() {
                report.tally(result);
            }
        }

        drain(&mut in_flight, &mut report).await;

        report
    }

    async fn administer(&self, command: Command, report: &mut BatchReport) {
        let result = match command {
            Command::Open(account_id, Some(profile)) => self.ledger.open_account_with_id(account_id, profile).await,
            Command::Open(account_id, None) => {
                warn!("Account command rejected: opening account [{account_id}] needs an owner and an account type");
                report.rejected += 1;
                return
            }
            Command::SetStatus(account_id, status) => self.ledger.set_status(account_id, status).await,
            Command::Move(_) => return
        };

        if let Err(error) = result {
            warn!("Account command rejected: {error}");
            report.rejected += 1;
        }
    }
}

async fn drain(in_flight: &mut JoinSet<Result<Transaction, OrchestratorError>>, report: &mut BatchReport) {
    while let Some(result) = in_flight.join_next().await {
        report.tally(result);
    }
}

fn spawn_csv_reader(path: PathBuf, sender: mpsc::Sender<CommandRecord>) -> JoinHandle<anyhow::Result<usize>> {
    spawn_blocking(move || {
        let file = File::open(&path)
            .with_context(|| format!("Error opening CSV at path: {}", path.display()))?;

        let mut reader = ReaderBuilder::new()
            .trim(Trim::All)
            .flexible(true)
            .from_reader(BufReader::new(file));

        let mut malformed = 0;

        for result in reader.deserialize::<CommandRecord>() {
            match result {
                Ok(record) => {
                    if sender.blocking_send(record).is_err() {
                        break;
                    }
                }
                Err(error) => {
                    error!("CSV deserialization error: {error}");
                    malformed += 1;
                }
            }
        }

        Ok(malformed)
    })
}
