//! In-memory store for testing and light hosts

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::{RwLock, RwLockWriteGuard};
use std::collections::HashMap;
use std::sync::Arc;
use stowage_core::{
    roots_window, AccountId, AccountStore, Contract, ContractId, ContractStore, ContractUpdate,
    Currency, SectorRoot, StowageError, StowageResult,
};
use tracing::debug;

use crate::store::{check_updates, ContractEntry};

/// In-memory account and contract store.
///
/// Each contract sits behind its own lock, so batches on different contracts
/// run side by side while batches on the same contract serialize.
pub struct MemoryStore {
    accounts: DashMap<AccountId, Currency>,
    contracts: DashMap<ContractId, Arc<RwLock<ContractEntry>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            accounts: DashMap::new(),
            contracts: DashMap::new(),
        }
    }

    pub fn with_balances(balances: Vec<(AccountId, Currency)>) -> Self {
        let store = Self::new();
        for (account, balance) in balances {
            store.accounts.insert(account, balance);
        }
        store
    }

    fn entry(&self, id: &ContractId) -> StowageResult<Arc<RwLock<ContractEntry>>> {
        self.contracts
            .get(id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| StowageError::ContractNotFound(id.to_hex()))
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AccountStore for MemoryStore {
    async fn balance(&self, account: &AccountId) -> StowageResult<Currency> {
        Ok(self
            .accounts
            .get(account)
            .map(|b| *b.value())
            .unwrap_or(Currency::ZERO))
    }

    async fn credit(&self, account: &AccountId, amount: Currency) -> StowageResult<Currency> {
        let mut balance = self.accounts.entry(*account).or_insert(Currency::ZERO);
        *balance = balance.checked_add(amount).ok_or(StowageError::Overflow)?;
        Ok(*balance)
    }

    async fn debit(&self, account: &AccountId, amount: Currency) -> StowageResult<Currency> {
        match self.accounts.entry(*account) {
            Entry::Occupied(mut entry) => {
                let balance = *entry.get();
                let new_balance =
                    balance
                        .checked_sub(amount)
                        .ok_or(StowageError::InsufficientFunds {
                            required: amount.0,
                            available: balance.0,
                        })?;
                entry.insert(new_balance);
                Ok(new_balance)
            }
            Entry::Vacant(_) if amount.is_zero() => Ok(Currency::ZERO),
            Entry::Vacant(_) => Err(StowageError::InsufficientFunds {
                required: amount.0,
                available: 0,
            }),
        }
    }
}

#[async_trait]
impl ContractStore for MemoryStore {
    async fn add_contract(&self, contract: &Contract) -> StowageResult<()> {
        match self.contracts.entry(contract.id) {
            Entry::Occupied(_) => Err(StowageError::ContractExists(contract.id.to_hex())),
            Entry::Vacant(entry) => {
                let mut contract = contract.clone();
                contract.sector_count = 0;
                entry.insert(Arc::new(RwLock::new(ContractEntry::new(contract))));
                Ok(())
            }
        }
    }

    async fn contract(&self, id: &ContractId) -> StowageResult<Contract> {
        let entry = self.entry(id)?;
        let contract = entry.read().contract.clone();
        Ok(contract)
    }

    async fn sector_roots(
        &self,
        id: &ContractId,
        offset: u64,
        limit: u64,
    ) -> StowageResult<Vec<SectorRoot>> {
        let entry = self.entry(id)?;
        let entry = entry.read();
        let window = roots_window(entry.roots.len() as u64, offset, limit);
        Ok(entry.roots[window.start as usize..window.end as usize].to_vec())
    }

    async fn apply_updates(&self, updates: Vec<ContractUpdate>) -> StowageResult<()> {
        let mut ids: Vec<ContractId> = updates.iter().map(|update| update.contract()).collect();
        ids.sort();
        ids.dedup();
        let entries = ids
            .iter()
            .map(|id| self.entry(id))
            .collect::<StowageResult<Vec<_>>>()?;

        // Locks are taken in id order so overlapping batches cannot deadlock
        let mut locked: HashMap<ContractId, RwLockWriteGuard<'_, ContractEntry>> = ids
            .iter()
            .copied()
            .zip(entries.iter().map(|entry| entry.write()))
            .collect();

        check_updates(&updates, |id| {
            locked.get(id).map(|entry| entry.roots.len() as u64)
        })?;
        for update in &updates {
            if let Some(entry) = locked.get_mut(&update.contract()) {
                entry.apply(update)?;
            }
        }

        debug!(
            "Applied {} contract updates across {} contracts",
            updates.len(),
            locked.len()
        );
        Ok(())
    }
}

/// Thread-safe memory store wrapper
pub type SharedMemoryStore = Arc<MemoryStore>;

/// Create a shared memory store
pub fn create_memory_store() -> SharedMemoryStore {
    Arc::new(MemoryStore::new())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::conformance;

    #[tokio::test]
    async fn test_memory_account_ledger() {
        conformance::account_ledger(&MemoryStore::new()).await;
    }

    #[tokio::test]
    async fn test_memory_sector_root_updates() {
        conformance::sector_root_updates(&MemoryStore::new()).await;
    }

    #[tokio::test]
    async fn test_memory_sector_root_windows() {
        conformance::sector_root_windows(&MemoryStore::new()).await;
    }

    #[tokio::test]
    async fn test_memory_revisions_and_missing_contracts() {
        conformance::revisions_and_missing_contracts(&MemoryStore::new()).await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_memory_concurrent_appends_to_one_contract() {
        conformance::concurrent_appends(Arc::new(MemoryStore::new())).await;
    }

    #[tokio::test]
    async fn test_locked_contract_does_not_block_others() {
        let store = MemoryStore::new();
        let busy = conformance::random_contract();
        let idle = conformance::random_contract();
        store.add_contract(&busy).await.unwrap();
        store.add_contract(&idle).await.unwrap();

        // a batch on `busy` is in progress
        let busy_entry = store.entry(&busy.id).unwrap();
        let _held = busy_entry.write();

        let root = conformance::random_root();
        store
            .apply_updates(vec![ContractUpdate::AppendSector {
                contract: idle.id,
                root,
            }])
            .await
            .unwrap();
        assert_eq!(store.sector_roots(&idle.id, 0, 10).await.unwrap(), vec![root]);
        assert_eq!(store.contract(&idle.id).await.unwrap().sector_count, 1);
    }

    #[tokio::test]
    async fn test_memory_credit_overflow() {
        let account = AccountId::from_bytes([1u8; 32]);
        let store = MemoryStore::with_balances(vec![(account, Currency::MAX)]);
        assert!(matches!(
            store.credit(&account, Currency::new(1)).await,
            Err(StowageError::Overflow)
        ));
        assert_eq!(store.balance(&account).await.unwrap(), Currency::MAX);
    }
}
