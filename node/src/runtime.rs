//! Host runtime combining all components

use stowage_accounts::{AccountManager, SharedAccountManager};
use stowage_contracts::{ContractManager, SharedContractManager};
use stowage_core::{
    AccountId, AccountStore, Contract, ContractId, Currency, Hash, HostConfig, SectorRoot,
    StowageResult,
};
use stowage_state::{create_persistent_store, PersistentStore, SharedPersistentStore};
use std::sync::Arc;
use tracing::info;

/// Host runtime managing the stores and managers
pub struct HostRuntime {
    config: HostConfig,
    store: SharedPersistentStore,
    accounts: SharedAccountManager<PersistentStore>,
    contracts: SharedContractManager<PersistentStore>,
}

impl HostRuntime {
    /// Open the host database and build the managers over it
    pub fn new(config: HostConfig) -> StowageResult<Self> {
        std::fs::create_dir_all(&config.data_dir)?;
        let store = create_persistent_store(config.db_path())?;

        let accounts = Arc::new(AccountManager::new(store.clone(), config.accounts.clone()));
        let contracts = Arc::new(ContractManager::new(store.clone()));

        info!("Host runtime ready, data dir {}", config.data_dir.display());

        Ok(Self {
            config,
            store,
            accounts,
            contracts,
        })
    }

    pub fn config(&self) -> &HostConfig {
        &self.config
    }

    pub fn accounts(&self) -> &SharedAccountManager<PersistentStore> {
        &self.accounts
    }

    pub fn contracts(&self) -> &SharedContractManager<PersistentStore> {
        &self.contracts
    }

    /// Spendable balance (durable balance less open reservations)
    pub async fn spendable_balance(&self, account: &AccountId) -> StowageResult<Currency> {
        self.accounts.balance(account).await
    }

    /// Balance recorded in the durable ledger
    pub async fn durable_balance(&self, account: &AccountId) -> StowageResult<Currency> {
        self.store.balance(account).await
    }

    pub async fn deposit(&self, account: &AccountId, amount: Currency) -> StowageResult<Currency> {
        self.accounts.credit(account, amount).await
    }

    pub async fn contract(&self, id: &ContractId) -> StowageResult<(Contract, Hash)> {
        let contract = self.contracts.contract(id).await?;
        let root = self.contracts.merkle_root(id).await?;
        Ok((contract, root))
    }

    pub async fn sector_roots(
        &self,
        id: &ContractId,
        offset: u64,
        limit: u64,
    ) -> StowageResult<Vec<SectorRoot>> {
        self.contracts.sector_roots(id, offset, limit).await
    }

    /// Number of accounts with open budgets
    pub fn open_accounts(&self) -> usize {
        self.accounts.open_accounts()
    }
}
