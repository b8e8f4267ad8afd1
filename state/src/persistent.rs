//! Persistent store using sled database

use async_trait::async_trait;
use sled::transaction::{
    abort, ConflictableTransactionResult, TransactionError, TransactionalTree,
};
use sled::{Db, Transactional, Tree};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use stowage_core::{
    check_swap, check_trim, roots_window, AccountId, AccountStore, Contract, ContractId,
    ContractStore, ContractUpdate, Currency, SectorRoot, StowageError, StowageResult,
};
use tracing::{debug, info};

use crate::store::{
    account_key, contract_key, decode_contract, decode_root, encode_contract, root_key,
    AccountRecord,
};

const ACCOUNTS_TREE: &str = "accounts";
const CONTRACTS_TREE: &str = "contracts";
const ROOTS_TREE: &str = "sector_roots";

type TxResult<T> = ConflictableTransactionResult<T, StowageError>;

fn storage_err(e: sled::Error) -> StowageError {
    StowageError::StorageError(e.to_string())
}

fn tx_err(e: TransactionError<StowageError>) -> StowageError {
    match e {
        TransactionError::Abort(e) => e,
        TransactionError::Storage(e) => storage_err(e),
    }
}

/// Persistent account and contract store backed by sled database
pub struct PersistentStore {
    db: Db,
    accounts: Tree,
    contracts: Tree,
    roots: Tree,
}

impl PersistentStore {
    pub fn open<P: AsRef<Path>>(path: P) -> StowageResult<Self> {
        let db = sled::open(path.as_ref()).map_err(storage_err)?;

        let accounts = db.open_tree(ACCOUNTS_TREE).map_err(storage_err)?;
        let contracts = db.open_tree(CONTRACTS_TREE).map_err(storage_err)?;
        let roots = db.open_tree(ROOTS_TREE).map_err(storage_err)?;

        info!(
            "Opened host store at {} ({} accounts, {} contracts)",
            path.as_ref().display(),
            accounts.len(),
            contracts.len()
        );

        Ok(Self {
            db,
            accounts,
            contracts,
            roots,
        })
    }

    /// Flush to disk
    async fn flush(&self) -> StowageResult<()> {
        self.db.flush_async().await.map_err(storage_err)?;
        Ok(())
    }

    fn read_balance(tree: &TransactionalTree, account: &AccountId) -> TxResult<Currency> {
        match tree.get(account_key(account))? {
            Some(bytes) => match AccountRecord::from_bytes(&bytes) {
                Ok(record) => Ok(record.balance()),
                Err(e) => abort(e),
            },
            None => Ok(Currency::ZERO),
        }
    }

    fn write_balance(
        tree: &TransactionalTree,
        account: &AccountId,
        balance: Currency,
    ) -> TxResult<()> {
        match AccountRecord::new(balance).to_bytes() {
            Ok(bytes) => {
                tree.insert(account_key(account), bytes)?;
                Ok(())
            }
            Err(e) => abort(e),
        }
    }

    fn read_contract(tree: &TransactionalTree, id: &ContractId) -> TxResult<Contract> {
        match tree.get(contract_key(id))? {
            Some(bytes) => match decode_contract(&bytes) {
                Ok(contract) => Ok(contract),
                Err(e) => abort(e),
            },
            None => abort(StowageError::ContractNotFound(id.to_hex())),
        }
    }

    fn read_root(tree: &TransactionalTree, id: &ContractId, index: u64) -> TxResult<SectorRoot> {
        match tree.get(root_key(id, index))? {
            Some(bytes) => match decode_root(&bytes) {
                Ok(root) => Ok(root),
                Err(e) => abort(e),
            },
            None => abort(StowageError::StorageError(format!(
                "sector root {} missing for contract {}",
                index, id
            ))),
        }
    }

    fn apply_one(
        contracts: &TransactionalTree,
        roots: &TransactionalTree,
        staged: &mut HashMap<ContractId, Contract>,
        update: &ContractUpdate,
    ) -> TxResult<()> {
        let id = update.contract();
        if !staged.contains_key(&id) {
            let contract = Self::read_contract(contracts, &id)?;
            staged.insert(id, contract);
        }
        let contract = match staged.get_mut(&id) {
            Some(contract) => contract,
            None => return abort(StowageError::ContractNotFound(id.to_hex())),
        };
        let length = contract.sector_count;

        match update {
            ContractUpdate::AppendSector { root, .. } => {
                roots.insert(&root_key(&id, length)[..], &root.as_bytes()[..])?;
                contract.sector_count = length + 1;
            }
            ContractUpdate::SwapSectors { i, j, .. } => {
                if let Err(e) = check_swap(length, *i, *j) {
                    return abort(e);
                }
                let a = Self::read_root(roots, &id, *i)?;
                let b = Self::read_root(roots, &id, *j)?;
                roots.insert(&root_key(&id, *i)[..], &b.as_bytes()[..])?;
                roots.insert(&root_key(&id, *j)[..], &a.as_bytes()[..])?;
            }
            ContractUpdate::TrimSectors { n, .. } => {
                if let Err(e) = check_trim(length, *n) {
                    return abort(e);
                }
                for index in (length - n)..length {
                    roots.remove(&root_key(&id, index)[..])?;
                }
                contract.sector_count = length - n;
            }
            ContractUpdate::ReviseContract { revision, .. } => {
                contract.revision = *revision;
            }
        }
        Ok(())
    }
}

#[async_trait]
impl AccountStore for PersistentStore {
    async fn balance(&self, account: &AccountId) -> StowageResult<Currency> {
        match self.accounts.get(account_key(account)).map_err(storage_err)? {
            Some(bytes) => Ok(AccountRecord::from_bytes(&bytes)?.balance()),
            None => Ok(Currency::ZERO),
        }
    }

    async fn credit(&self, account: &AccountId, amount: Currency) -> StowageResult<Currency> {
        let balance = self
            .accounts
            .transaction(|tx| {
                let balance = Self::read_balance(tx, account)?;
                let new_balance = match balance.checked_add(amount) {
                    Some(b) => b,
                    None => return abort(StowageError::Overflow),
                };
                Self::write_balance(tx, account, new_balance)?;
                Ok(new_balance)
            })
            .map_err(tx_err)?;
        self.flush().await?;
        Ok(balance)
    }

    async fn debit(&self, account: &AccountId, amount: Currency) -> StowageResult<Currency> {
        let balance = self
            .accounts
            .transaction(|tx| {
                let balance = Self::read_balance(tx, account)?;
                let new_balance = match balance.checked_sub(amount) {
                    Some(b) => b,
                    None => {
                        return abort(StowageError::InsufficientFunds {
                            required: amount.0,
                            available: balance.0,
                        })
                    }
                };
                Self::write_balance(tx, account, new_balance)?;
                Ok(new_balance)
            })
            .map_err(tx_err)?;
        self.flush().await?;
        Ok(balance)
    }
}

#[async_trait]
impl ContractStore for PersistentStore {
    async fn add_contract(&self, contract: &Contract) -> StowageResult<()> {
        let mut contract = contract.clone();
        contract.sector_count = 0;
        let bytes = encode_contract(&contract)?;
        let key = contract_key(&contract.id);

        self.contracts
            .transaction(|tx| {
                if tx.get(&key)?.is_some() {
                    return abort(StowageError::ContractExists(contract.id.to_hex()));
                }
                tx.insert(key.as_slice(), bytes.as_slice())?;
                Ok(())
            })
            .map_err(tx_err)?;
        self.flush().await
    }

    async fn contract(&self, id: &ContractId) -> StowageResult<Contract> {
        match self.contracts.get(contract_key(id)).map_err(storage_err)? {
            Some(bytes) => decode_contract(&bytes),
            None => Err(StowageError::ContractNotFound(id.to_hex())),
        }
    }

    async fn sector_roots(
        &self,
        id: &ContractId,
        offset: u64,
        limit: u64,
    ) -> StowageResult<Vec<SectorRoot>> {
        // Read inside a transaction so the count and the roots come from one commit
        (&self.contracts, &self.roots)
            .transaction(|(contracts, roots)| {
                let contract = Self::read_contract(contracts, id)?;
                let window = roots_window(contract.sector_count, offset, limit);
                let mut result = Vec::with_capacity((window.end - window.start) as usize);
                for index in window {
                    result.push(Self::read_root(roots, id, index)?);
                }
                Ok(result)
            })
            .map_err(tx_err)
    }

    async fn apply_updates(&self, updates: Vec<ContractUpdate>) -> StowageResult<()> {
        let touched = (&self.contracts, &self.roots)
            .transaction(|(contracts, roots)| {
                // Rebuilt on every attempt; sled retries the closure on conflict
                let mut staged: HashMap<ContractId, Contract> = HashMap::new();
                for update in &updates {
                    Self::apply_one(contracts, roots, &mut staged, update)?;
                }
                for contract in staged.values() {
                    match encode_contract(contract) {
                        Ok(bytes) => {
                            contracts.insert(contract_key(&contract.id), bytes)?;
                        }
                        Err(e) => return abort(e),
                    }
                }
                Ok(staged.len())
            })
            .map_err(tx_err)?;
        self.flush().await?;

        debug!(
            "Applied {} contract updates across {} contracts",
            updates.len(),
            touched
        );
        Ok(())
    }
}

/// Thread-safe persistent store wrapper
pub type SharedPersistentStore = Arc<PersistentStore>;

/// Create a shared persistent store
pub fn create_persistent_store<P: AsRef<Path>>(path: P) -> StowageResult<SharedPersistentStore> {
    Ok(Arc::new(PersistentStore::open(path)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::conformance;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_persistent_account_ledger() {
        let tmp = TempDir::new().unwrap();
        let store = PersistentStore::open(tmp.path()).unwrap();
        conformance::account_ledger(&store).await;
    }

    #[tokio::test]
    async fn test_persistent_sector_root_updates() {
        let tmp = TempDir::new().unwrap();
        let store = PersistentStore::open(tmp.path()).unwrap();
        conformance::sector_root_updates(&store).await;
    }

    #[tokio::test]
    async fn test_persistent_sector_root_windows() {
        let tmp = TempDir::new().unwrap();
        let store = PersistentStore::open(tmp.path()).unwrap();
        conformance::sector_root_windows(&store).await;
    }

    #[tokio::test]
    async fn test_persistent_revisions_and_missing_contracts() {
        let tmp = TempDir::new().unwrap();
        let store = PersistentStore::open(tmp.path()).unwrap();
        conformance::revisions_and_missing_contracts(&store).await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_persistent_concurrent_appends_to_one_contract() {
        let tmp = TempDir::new().unwrap();
        let store = Arc::new(PersistentStore::open(tmp.path()).unwrap());
        conformance::concurrent_appends(store).await;
    }

    #[tokio::test]
    async fn test_persistent_store_reopen() {
        let tmp = TempDir::new().unwrap();
        let account = AccountId::from_bytes([5u8; 32]);
        let contract = conformance::random_contract();
        let roots: Vec<SectorRoot> = (0..4).map(|_| conformance::random_root()).collect();

        // Write data
        {
            let store = PersistentStore::open(tmp.path()).unwrap();
            store.credit(&account, Currency::new(500)).await.unwrap();
            store.debit(&account, Currency::new(120)).await.unwrap();
            store.add_contract(&contract).await.unwrap();
            let updates = roots
                .iter()
                .map(|root| ContractUpdate::AppendSector {
                    contract: contract.id,
                    root: *root,
                })
                .collect();
            store.apply_updates(updates).await.unwrap();
        }

        // Reopen and verify
        {
            let store = PersistentStore::open(tmp.path()).unwrap();
            assert_eq!(store.balance(&account).await.unwrap(), Currency::new(380));
            assert_eq!(store.sector_roots(&contract.id, 0, 10).await.unwrap(), roots);
            assert_eq!(store.contract(&contract.id).await.unwrap().sector_count, 4);
        }
    }
}
