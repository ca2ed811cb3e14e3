use std::sync::Arc;

use tokio::spawn;
use tokio::sync::{mpsc, oneshot};
use tokio::task::{JoinError, JoinHandle};
use tracing::{debug, warn};

use crate::models::{Account, AccountStatus, AccountSummary, EntryKey, LedgerError, Posting};
use crate::storage::Storage;
use crate::types::{AccountId, Monetary};

pub type Reply<T> = oneshot::Sender<T>;

/// Messages understood by an account actor.
///
/// Each command is handled to completion before the next one is read, which is
/// what serializes every mutation of one account.
#[derive(Debug)]
pub enum AccountCommand {
    Credit {
        amount: Monetary,
        key: EntryKey,
        reply: Reply<Result<AccountSummary, LedgerError>>
    },
    Debit {
        amount: Monetary,
        key: EntryKey,
        reply: Reply<Result<AccountSummary, LedgerError>>
    },
    SetStatus {
        status: AccountStatus,
        reply: Reply<Result<AccountSummary, LedgerError>>
    },
    Summary {
        reply: Reply<AccountSummary>
    },
    Entry {
        key: EntryKey,
        reply: Reply<Option<Monetary>>
    }
}

/// Single owner of one account's state.
pub struct AccountActor {
    account_id: AccountId,
    sender: mpsc::UnboundedSender<AccountCommand>,
    handle: JoinHandle<()>
}

impl AccountActor {
    /// Spawns a new actor owning `account`, which is saved back to `storage` once the actor stops.
    pub fn spawn<S: Storage>(account: Account, storage: Arc<S>) -> Self {
        let account_id = account.account_id;
        let (sender, mut receiver) = mpsc::unbounded_channel();

        let handle = spawn(async move {
            let mut account = account;

            while let Some(command) = receiver.recv().await {
                handle_command(&mut account, command);
            }

            storage.save(account.account_id, account);
        });

        Self { account_id, sender, handle }
    }

    pub fn account_id(&self) -> AccountId {
        self.account_id
    }

    /// Queues a command, returns `false` if the actor has already stopped.
    pub fn accept(&self, command: AccountCommand) -> bool {
        self.sender.send(command).is_ok()
    }

    /// Closes the mailbox and waits for the queued commands to drain and the account to be saved.
    pub async fn despawn(self) -> Result<(), JoinError> {
        drop(self.sender);
        self.handle.await
    }
}

fn handle_command(account: &mut Account, command: AccountCommand) {
    //NOTE: A caller that gave up waiting drops its receiver, the reply is then discarded but the
    //      posting stands. The orchestrator finds it again through the entry journal.
    match command {
        AccountCommand::Credit { amount, key, reply } => {
            let result = account.credit(amount, key);
            log_posting(account, &key, amount, &result);
            let _ = reply.send(result.map(|_| account.summary()));
        }
        AccountCommand::Debit { amount, key, reply } => {
            let result = account.debit(amount, key);
            log_posting(account, &key, amount, &result);
            let _ = reply.send(result.map(|_| account.summary()));
        }
        AccountCommand::SetStatus { status, reply } => {
            let result = account.set_status(status);
            if let Err(error) = &result {
                warn!("{error}");
            }
            let _ = reply.send(result.map(|_| account.summary()));
        }
        AccountCommand::Summary { reply } => {
            let _ = reply.send(account.summary());
        }
        AccountCommand::Entry { key, reply } => {
            let _ = reply.send(account.entry(&key));
        }
    }
}

fn log_posting(account: &Account, key: &EntryKey, amount: Monetary, result: &Result<Posting, LedgerError>) {
    match result {
        Ok(Posting::Applied) => {
            debug!("Posting [{}]:[{:?}] of [{}] applied to account [{}], balance [{}]", key.transaction_id, key.kind, amount, account.account_id, account.balance);
        }
        Ok(Posting::Replayed) => {
            debug!("Posting [{}]:[{:?}] replayed on account [{}], balance unchanged", key.transaction_id, key.kind, account.account_id);
        }
        Err(error) => {
            //NOTE: Business rejections are expected outcomes, the orchestrator records them on the transaction
            debug!("Posting [{}]:[{:?}] rejected: {error}", key.transaction_id, key.kind);
        }
    }
}
