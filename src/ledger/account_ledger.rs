use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::mapref::one::RefMut;
use dashmap::DashMap;
use tokio::sync::oneshot;
use tokio::task::JoinSet;
use tracing::{debug, error, info};

use crate::actors::{AccountActor, AccountCommand, Reply};
use crate::ledger::Ledger;
use crate::models::{Account, AccountProfile, AccountStatus, AccountSummary, EntryKey, LedgerError};
use crate::storage::Storage;
use crate::types::{AccountId, AccountNumber, Monetary, OwnerId};

const NUMBER_ATTEMPTS: usize = 16;

/// Ledger backed by one actor per account.
///
/// Actors are spawned on first use, hydrating the account from storage, and
/// live until [`AccountLedger::shutdown`] writes every account back. Account
/// numbers and owners are indexed here, they never change once an account is open.
pub struct AccountLedger<S: Storage> {
    storage: Arc<S>,
    actors: DashMap<AccountId, AccountActor>,
    numbers: DashMap<AccountNumber, AccountId>,
    owners: DashMap<OwnerId, BTreeSet<AccountId>>,
    next_id: AtomicU64,
    closed: AtomicBool
}

impl<S: Storage> AccountLedger<S> {
    pub fn new(storage: Arc<S>) -> Self {
        let ledger = Self {
            storage,
            actors: DashMap::new(),
            numbers: DashMap::new(),
            owners: DashMap::new(),
            next_id: AtomicU64::new(1),
            closed: AtomicBool::new(false)
        };

        for summary in ledger.storage.summaries() {
            ledger.index(summary.account_id, &summary.account_number, summary.owner_id);
        }

        ledger
    }

    /// Opens an account under the next free id, with a zero balance.
    pub async fn open_account(&self, profile: AccountProfile) -> Result<AccountSummary, LedgerError> {
        loop {
            let account_id = self.next_id.fetch_add(1, Ordering::Relaxed);

            match self.open_account_with_id(account_id, profile).await {
                Err(LedgerError::AccountExists { .. }) => continue,
                result => return result
            }
        }
    }

    pub async fn open_account_with_id(&self, account_id: AccountId, profile: AccountProfile) -> Result<AccountSummary, LedgerError> {
        self.ensure_open(account_id)?;

        match self.actors.entry(account_id) {
            Entry::Occupied(_) => Err(LedgerError::AccountExists { account_id }),
            Entry::Vacant(_) if self.storage.contains(account_id) => Err(LedgerError::AccountExists { account_id }),
            Entry::Vacant(entry) => {
                let account_number = self.reserve_number(account_id)?;
                let account = Account::new(account_id, account_number, profile);
                let summary = account.summary();

                self.owners.entry(profile.owner_id).or_default().insert(account_id);
                entry.insert(AccountActor::spawn(account, self.storage.clone()));
                info!("Account [{account_id}]:[{}] opened for owner [{}] as [{:?}]", summary.account_number, profile.owner_id, profile.account_type);

                Ok(summary)
            }
        }
    }

    /// Suspends, reactivates or closes an account.
    pub async fn set_status(&self, account_id: AccountId, status: AccountStatus) -> Result<AccountSummary, LedgerError> {
        let summary = self.request(account_id, |reply| AccountCommand::SetStatus { status, reply }).await??;
        info!("Account [{account_id}] is now [{status:?}]");
        Ok(summary)
    }

    /// The account carrying `account_number`, if any.
    pub async fn find_by_number(&self, account_number: &AccountNumber) -> Result<Option<AccountSummary>, LedgerError> {
        let Some(account_id) = self.numbers.get(account_number).map(|item| *item.value()) else {
            return Ok(None)
        };

        self.get_account(account_id).await.map(Some)
    }

    /// Every account held by `owner_id`, ordered by id.
    pub async fn find_by_owner(&self, owner_id: OwnerId) -> Result<Vec<AccountSummary>, LedgerError> {
        let account_ids: Vec<AccountId> = self.owners.get(&owner_id)
            .map(|item| item.value().iter().copied().collect())
            .unwrap_or_default();

        let mut accounts = Vec::with_capacity(account_ids.len());

        for account_id in account_ids {
            accounts.push(self.get_account(account_id).await?);
        }

        Ok(accounts)
    }

    /// Stops every actor once its queue is drained, saving all accounts to storage.
    ///
    /// Actors drain concurrently. Requests made afterwards are refused with
    /// `Unavailable`, the ledger cannot be reopened.
    pub async fn shutdown(&self) {
        self.closed.store(true, Ordering::SeqCst);

        let mut despawning = JoinSet::new();

        //NOTE: A request that passed the closed check just before may still spawn an actor, so drain until none is left
        loop {
            let account_ids: Vec<AccountId> = self.actors.iter().map(|item| *item.key()).collect();

            if account_ids.is_empty() {
                break;
            }

            for account_id in account_ids {
                if let Some((_, actor)) = self.actors.remove(&account_id) {
                    despawning.spawn(async move { (account_id, actor.despawn().await) });
                }
            }

            while let Some(result) = despawning.join_next().await {
                match result {
                    Ok((_, Ok(()))) => {}
                    Ok((account_id, Err(error))) => error!("Account actor [{account_id}] did not despawn gracefully: {error:?}"),
                    Err(error) => error!("Account despawn task failed: {error:?}")
                }
            }
        }

        info!("Ledger shut down");
    }

    async fn request<T, F>(&self, account_id: AccountId, build: F) -> Result<T, LedgerError>
    where
        T: Send,
        F: FnOnce(Reply<T>) -> AccountCommand + Send
    {
        let (reply, response) = oneshot::channel();

        self.dispatch(account_id, build(reply))?;

        response.await
            .map_err(|_| LedgerError::unavailable(account_id, "account actor dropped the request"))
    }

    fn dispatch(&self, account_id: AccountId, command: AccountCommand) -> Result<(), LedgerError> {
        self.ensure_open(account_id)?;

        let existing = self.actors.get(&account_id);

        let accepted = match existing {
            Some(actor) => actor.accept(command),
            None => self.hydrate(account_id)?.accept(command)
        };

        if !accepted {
            return Err(LedgerError::unavailable(account_id, "account actor has stopped"));
        }

        Ok(())
    }

    fn ensure_open(&self, account_id: AccountId) -> Result<(), LedgerError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(LedgerError::unavailable(account_id, "ledger is shut down"));
        }

        Ok(())
    }

    fn hydrate(&self, account_id: AccountId) -> Result<RefMut<'_, AccountId, AccountActor>, LedgerError> {
        match self.actors.entry(account_id) {
            Entry::Occupied(entry) => Ok(entry.into_ref()),
            Entry::Vacant(entry) => {
                let account = self.storage.load(account_id)
                    .ok_or(LedgerError::AccountNotFound { account_id })?;

                //NOTE: Covers accounts saved to storage after this ledger was built
                self.index(account_id, &account.account_number, account.owner_id);
                debug!("Account [{account_id}] hydrated from storage");

                Ok(entry.insert(AccountActor::spawn(account, self.storage.clone())))
            }
        }
    }

    /// Draws account numbers until one is free and claims it for `account_id`.
    fn reserve_number(&self, account_id: AccountId) -> Result<AccountNumber, LedgerError> {
        for _ in 0..NUMBER_ATTEMPTS {
            if let Entry::Vacant(entry) = self.numbers.entry(AccountNumber::generate()) {
                let account_number = entry.key().clone();
                entry.insert(account_id);
                return Ok(account_number);
            }
        }

        Err(LedgerError::NumberSpaceExhausted { account_id, attempts: NUMBER_ATTEMPTS })
    }

    fn index(&self, account_id: AccountId, account_number: &AccountNumber, owner_id: OwnerId) {
        self.numbers.insert(account_number.clone(), account_id);
        self.owners.entry(owner_id).or_default().insert(account_id);
    }
}

#[async_trait]
impl<S: Storage> Ledger for AccountLedger<S> {
    async fn credit(&self, account_id: AccountId, amount: Monetary, key: EntryKey) -> Result<AccountSummary, LedgerError> {
        self.request(account_id, |reply| AccountCommand::Credit { amount, key, reply }).await?
    }

    async fn debit(&self, account_id: AccountId, amount: Monetary, key: EntryKey) -> Result<AccountSummary, LedgerError> {
        self.request(account_id, |reply| AccountCommand::Debit { amount, key, reply }).await?
    }

    async fn get_account(&self, account_id: AccountId) -> Result<AccountSummary, LedgerError> {
        self.request(account_id, |reply| AccountCommand::Summary { reply }).await
    }

    async fn find_entry(&self, account_id: AccountId, key: EntryKey) -> Result<Option<Monetary>, LedgerError> {
        self.request(account_id, |reply| AccountCommand::Entry { key, reply }).await
    }
}
