//! Budget - a request's staged spending against one account's reservation

use std::fmt;
use std::sync::Arc;
use stowage_core::{AccountId, AccountStore, Currency, StowageError, StowageResult};
use tracing::{debug, error, warn};

use crate::manager::AccountManager;

/// Transactionally manages the spending of one request.
///
/// The full `max` is reserved from the account when the budget is created.
/// `commit` debits what was actually spent and returns the rest; `rollback`
/// returns the whole reservation. Both consume the budget. A budget dropped
/// without either is rolled back. Not shared between tasks.
///
/// ```
/// # use std::sync::Arc;
/// # use stowage_accounts::AccountManager;
/// # use stowage_core::{AccountId, Currency, StowageResult};
/// # use stowage_state::MemoryStore;
/// async fn upload(manager: &Arc<AccountManager<MemoryStore>>) -> StowageResult<Currency> {
///     let mut budget = manager.budget(AccountId::ZERO, Currency::new(10)).await?;
///     budget.spend(Currency::new(4))?;
///     budget.commit().await
/// }
/// ```
///
/// A committed budget can no longer be used:
///
/// ```compile_fail
/// # use std::sync::Arc;
/// # use stowage_accounts::AccountManager;
/// # use stowage_core::{AccountId, Currency, StowageResult};
/// # use stowage_state::MemoryStore;
/// async fn upload(manager: &Arc<AccountManager<MemoryStore>>) -> StowageResult<Currency> {
///     let mut budget = manager.budget(AccountId::ZERO, Currency::new(10)).await?;
///     budget.commit().await?;
///     budget.spend(Currency::new(4))?;
///     Ok(Currency::ZERO)
/// }
/// ```
///
/// Nor committed twice:
///
/// ```compile_fail
/// # use std::sync::Arc;
/// # use stowage_accounts::AccountManager;
/// # use stowage_core::{AccountId, Currency, StowageResult};
/// # use stowage_state::MemoryStore;
/// async fn upload(manager: &Arc<AccountManager<MemoryStore>>) -> StowageResult<Currency> {
///     let budget = manager.budget(AccountId::ZERO, Currency::new(10)).await?;
///     budget.commit().await?;
///     budget.commit().await
/// }
/// ```
pub struct Budget<S: AccountStore + 'static> {
    account: AccountId,
    max: Currency,
    spent: Currency,
    resolved: bool,
    manager: Arc<AccountManager<S>>,
}

impl<S: AccountStore + 'static> Budget<S> {
    pub(crate) fn new(account: AccountId, max: Currency, manager: Arc<AccountManager<S>>) -> Self {
        Self {
            account,
            max,
            spent: Currency::ZERO,
            resolved: false,
            manager,
        }
    }

    pub fn account(&self) -> &AccountId {
        &self.account
    }

    pub fn max(&self) -> Currency {
        self.max
    }

    pub fn spent(&self) -> Currency {
        self.spent
    }

    /// Amount remaining in the budget
    pub fn remaining(&self) -> Currency {
        self.max.saturating_sub(self.spent)
    }

    /// Subtract `amount` from the remaining budget.
    /// Nothing changes if the budget cannot cover it.
    pub fn spend(&mut self, amount: Currency) -> StowageResult<()> {
        let spent = self
            .spent
            .checked_add(amount)
            .filter(|spent| *spent <= self.max)
            .ok_or(StowageError::InsufficientBudget {
                requested: amount.0,
                remaining: self.remaining().0,
            })?;
        self.spent = spent;
        Ok(())
    }

    /// Give back part of what was spent
    pub fn refund(&mut self, amount: Currency) -> StowageResult<()> {
        match self.spent.checked_sub(amount) {
            Some(spent) => {
                self.spent = spent;
                Ok(())
            }
            None => {
                error!(
                    "Refund of {} exceeds spent {} on account {}",
                    amount, self.spent, self.account
                );
                Err(StowageError::InvariantViolation(format!(
                    "cannot refund {} with only {} spent",
                    amount.0, self.spent.0
                )))
            }
        }
    }

    /// Spend everything left, returning how much was unspent before the call
    pub fn empty(&mut self) -> Currency {
        let unspent = self.remaining();
        self.spent = self.max;
        unspent
    }

    /// Return the whole reservation to the account
    pub fn rollback(mut self) -> StowageResult<()> {
        self.resolved = true;
        debug!("Rolled back budget of {} on account {}", self.max, self.account);
        self.manager.release(&self.account, self.max)
    }

    /// Debit the spent amount from the durable ledger and return the unused
    /// reservation to the account. Returns the unused amount.
    ///
    /// If the debit fails nothing was charged and the reservation is released
    /// as the budget drops.
    pub async fn commit(mut self) -> StowageResult<Currency> {
        if let Err(e) = self.manager.store.debit(&self.account, self.spent).await {
            warn!("Failed to debit account {}: {}", self.account, e);
            return Err(e);
        }

        let rem = self.remaining();
        let spent = self.spent;
        self.max = Currency::ZERO;
        self.spent = Currency::ZERO;
        self.resolved = true;

        self.manager.release(&self.account, rem)?;
        debug!(
            "Committed budget on account {}: spent {}, returned {}",
            self.account, spent, rem
        );
        Ok(rem)
    }
}

impl<S: AccountStore + 'static> Drop for Budget<S> {
    fn drop(&mut self) {
        if self.resolved {
            return;
        }
        self.resolved = true;
        if let Err(e) = self.manager.release(&self.account, self.max) {
            error!("Failed to roll back dropped budget on {}: {}", self.account, e);
        }
    }
}

impl<S: AccountStore + 'static> fmt::Debug for Budget<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Budget")
            .field("account", &self.account)
            .field("max", &self.max)
            .field("spent", &self.spent)
            .field("resolved", &self.resolved)
            .finish()
    }
}
