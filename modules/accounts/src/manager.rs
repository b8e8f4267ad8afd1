//! Account manager - in-memory spendable balances and budget reservation

use parking_lot::Mutex;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::Arc;
use stowage_core::{AccountId, AccountStore, AccountsConfig, Currency, StowageError, StowageResult};
use tracing::{debug, error, info, warn};

use crate::budget::Budget;

/// Cached state of an account with open budgets
#[derive(Debug, Clone, Copy)]
pub(crate) struct AccountState {
    /// Durable balance minus every outstanding reservation
    pub balance: Currency,
    /// Number of unresolved budgets
    pub open_txns: u64,
}

/// Accounts with open budgets, plus a count of evictions so far.
///
/// A durable balance read before an eviction may predate that account's
/// last debit and must not be cached.
#[derive(Debug, Default)]
struct BalanceTable {
    accounts: HashMap<AccountId, AccountState>,
    evictions: u64,
}

/// Outcome of one reservation attempt under the table lock
enum Reservation {
    Reserved,
    /// Not cached and no usable balance; load again at this eviction count
    Load(u64),
}

/// Tracks the spendable balance of every account with in-flight requests.
///
/// Accounts are cached on the first budget request and dropped again once
/// their last budget is committed or rolled back.
pub struct AccountManager<S: AccountStore> {
    pub(crate) store: Arc<S>,
    config: AccountsConfig,
    balances: Mutex<BalanceTable>,
    deposits: tokio::sync::Mutex<()>,
}

impl<S: AccountStore + 'static> AccountManager<S> {
    pub fn new(store: Arc<S>, config: AccountsConfig) -> Self {
        Self {
            store,
            config,
            balances: Mutex::new(BalanceTable::default()),
            deposits: tokio::sync::Mutex::new(()),
        }
    }

    /// Reserve `amount` from the account's spendable balance
    pub async fn budget(
        self: &Arc<Self>,
        account: AccountId,
        amount: Currency,
    ) -> StowageResult<Budget<S>> {
        let mut loaded = None;
        loop {
            match self.try_reserve(&account, amount, loaded)? {
                Reservation::Reserved => {
                    debug!("Reserved {} from account {}", amount, account);
                    return Ok(Budget::new(account, amount, self.clone()));
                }
                Reservation::Load(evictions) => {
                    // Read the durable balance without holding the lock
                    let balance = self.store.balance(&account).await?;
                    loaded = Some((evictions, balance));
                }
            }
        }
    }

    /// `loaded` is a durable balance tagged with the eviction count seen
    /// before it was read. It is only used if no eviction happened since.
    fn try_reserve(
        &self,
        account: &AccountId,
        amount: Currency,
        loaded: Option<(u64, Currency)>,
    ) -> StowageResult<Reservation> {
        let mut table = self.balances.lock();
        let evictions = table.evictions;
        match table.accounts.entry(*account) {
            Entry::Occupied(mut entry) => {
                reserve(entry.get_mut(), amount)?;
            }
            Entry::Vacant(entry) => {
                let balance = match loaded {
                    Some((seen, balance)) if seen == evictions => balance,
                    Some(_) => {
                        debug!("Reloading balance of {} after an eviction", account);
                        return Ok(Reservation::Load(evictions));
                    }
                    None => return Ok(Reservation::Load(evictions)),
                };
                let mut state = AccountState {
                    balance,
                    open_txns: 0,
                };
                reserve(&mut state, amount)?;
                entry.insert(state);
            }
        }
        Ok(Reservation::Reserved)
    }

    /// Return `amount` to the spendable balance and close one budget.
    /// Evicts the account when its last budget closes.
    pub(crate) fn release(&self, account: &AccountId, amount: Currency) -> StowageResult<()> {
        let mut table = self.balances.lock();
        let state = match table.accounts.get_mut(account) {
            Some(state) if state.open_txns > 0 => state,
            _ => {
                error!("Account {} missing from memory with a budget open", account);
                return Err(StowageError::InvariantViolation(format!(
                    "account {} missing from memory",
                    account
                )));
            }
        };

        if state.open_txns == 1 {
            // The store is authoritative again once nothing is reserved
            table.accounts.remove(account);
            table.evictions += 1;
            return Ok(());
        }

        state.balance = state
            .balance
            .checked_add(amount)
            .ok_or(StowageError::Overflow)?;
        state.open_txns -= 1;
        Ok(())
    }

    /// Deposit funds into an account
    pub async fn credit(&self, account: &AccountId, amount: Currency) -> StowageResult<Currency> {
        let _guard = self.deposits.lock().await;

        let current = self.store.balance(account).await?;
        let total = current.checked_add(amount).ok_or(StowageError::Overflow)?;
        if total.0 > self.config.max_account_balance {
            warn!(
                "Refused deposit of {} to {}: balance would be {}",
                amount, account, total
            );
            return Err(StowageError::BalanceExceedsMax {
                balance: total.0,
                max: self.config.max_account_balance,
            });
        }

        let balance = self.store.credit(account, amount).await?;
        {
            let mut table = self.balances.lock();
            if let Some(state) = table.accounts.get_mut(account) {
                state.balance = state.balance.saturating_add(amount);
            }
        }

        info!("Credited {} to account {}, balance {}", amount, account, balance);
        Ok(balance)
    }

    /// Spendable balance: durable balance less outstanding reservations
    pub async fn balance(&self, account: &AccountId) -> StowageResult<Currency> {
        let cached = self
            .balances
            .lock()
            .accounts
            .get(account)
            .map(|state| state.balance);
        match cached {
            Some(balance) => Ok(balance),
            None => self.store.balance(account).await,
        }
    }

    /// Number of unresolved budgets against an account
    pub fn open_txns(&self, account: &AccountId) -> u64 {
        self.balances
            .lock()
            .accounts
            .get(account)
            .map(|state| state.open_txns)
            .unwrap_or(0)
    }

    /// Number of accounts currently cached
    pub fn open_accounts(&self) -> usize {
        self.balances.lock().accounts.len()
    }

    /// Get configuration
    pub fn config(&self) -> &AccountsConfig {
        &self.config
    }
}

fn reserve(state: &mut AccountState, amount: Currency) -> StowageResult<()> {
    let balance = state
        .balance
        .checked_sub(amount)
        .ok_or(StowageError::InsufficientFunds {
            required: amount.0,
            available: state.balance.0,
        })?;
    state.balance = balance;
    state.open_txns += 1;
    Ok(())
}

/// Shared account manager type
pub type SharedAccountManager<S> = Arc<AccountManager<S>>;
