//! Record encodings, key layout, and the update semantics shared by the stores

use serde::{Deserialize, Serialize};
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use stowage_core::{
    check_swap, check_trim, AccountId, Contract, ContractId, ContractUpdate, Currency,
    SectorRoot, StowageError, StowageResult,
};

/// Durable account record
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AccountRecord {
    pub balance: u128,
}

impl AccountRecord {
    pub fn new(balance: Currency) -> Self {
        Self { balance: balance.0 }
    }

    pub fn balance(&self) -> Currency {
        Currency(self.balance)
    }

    pub fn to_bytes(&self) -> StowageResult<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> StowageResult<Self> {
        bincode::deserialize(bytes).map_err(|e| StowageError::DeserializationError(e.to_string()))
    }
}

/// Encode a contract record
pub fn encode_contract(contract: &Contract) -> StowageResult<Vec<u8>> {
    Ok(bincode::serialize(contract)?)
}

/// Decode a contract record
pub fn decode_contract(bytes: &[u8]) -> StowageResult<Contract> {
    bincode::deserialize(bytes).map_err(|e| StowageError::DeserializationError(e.to_string()))
}

/// Decode a stored sector root
pub fn decode_root(bytes: &[u8]) -> StowageResult<SectorRoot> {
    let arr: [u8; 32] = bytes.try_into().map_err(|_| {
        StowageError::DeserializationError(format!("sector root has {} bytes", bytes.len()))
    })?;
    Ok(SectorRoot::from_bytes(arr))
}

/// Build account key
pub fn account_key(account: &AccountId) -> Vec<u8> {
    account.as_bytes().to_vec()
}

/// Build contract key
pub fn contract_key(contract: &ContractId) -> Vec<u8> {
    contract.as_bytes().to_vec()
}

/// Build the key of one sector root: contract id followed by the big-endian
/// index, so a contract's roots sort in list order
pub fn root_key(contract: &ContractId, index: u64) -> [u8; 40] {
    let mut key = [0u8; 40];
    key[..32].copy_from_slice(contract.as_bytes());
    key[32..].copy_from_slice(&index.to_be_bytes());
    key
}

/// A contract and its full root list, as held by the in-memory store
#[derive(Debug, Clone)]
pub struct ContractEntry {
    pub contract: Contract,
    pub roots: Vec<SectorRoot>,
}

impl ContractEntry {
    pub fn new(contract: Contract) -> Self {
        Self {
            contract,
            roots: Vec::new(),
        }
    }

    /// Apply one update, validating it against the current list first
    pub fn apply(&mut self, update: &ContractUpdate) -> StowageResult<()> {
        let length = self.roots.len() as u64;
        match update {
            ContractUpdate::AppendSector { root, .. } => {
                self.roots.push(*root);
            }
            ContractUpdate::SwapSectors { i, j, .. } => {
                check_swap(length, *i, *j)?;
                self.roots.swap(*i as usize, *j as usize);
            }
            ContractUpdate::TrimSectors { n, .. } => {
                check_trim(length, *n)?;
                self.roots.truncate((length - n) as usize);
            }
            ContractUpdate::ReviseContract { revision, .. } => {
                self.contract.revision = *revision;
            }
        }
        self.contract.sector_count = self.roots.len() as u64;
        Ok(())
    }
}

/// Validate a batch in order against the current root list lengths.
/// `length` is consulted once per contract; no entry is touched, so a batch
/// that passes can be applied in place without failing halfway.
pub fn check_updates<F>(updates: &[ContractUpdate], mut length: F) -> StowageResult<()>
where
    F: FnMut(&ContractId) -> Option<u64>,
{
    let mut lengths: HashMap<ContractId, u64> = HashMap::new();
    for update in updates {
        let id = update.contract();
        let len = match lengths.entry(id) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => {
                let len = length(&id).ok_or_else(|| StowageError::ContractNotFound(id.to_hex()))?;
                entry.insert(len)
            }
        };
        match update {
            ContractUpdate::AppendSector { .. } => {
                *len = len.checked_add(1).ok_or(StowageError::Overflow)?;
            }
            ContractUpdate::SwapSectors { i, j, .. } => check_swap(*len, *i, *j)?,
            ContractUpdate::TrimSectors { n, .. } => {
                check_trim(*len, *n)?;
                *len -= n;
            }
            ContractUpdate::ReviseContract { .. } => {}
        }
    }
    Ok(())
}

#[cfg(test)]
pub(crate) mod conformance {
    //! Behaviour every store implementation must share

    use super::*;
    use rand::RngCore;
    use std::collections::HashSet;
    use std::sync::Arc;
    use stowage_core::{AccountStore, ContractRevision, ContractStore};

    pub fn random_root() -> SectorRoot {
        let mut bytes = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut bytes);
        SectorRoot::from_bytes(bytes)
    }

    pub fn random_contract() -> Contract {
        let mut bytes = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut bytes);
        Contract::new(
            ContractId::from_bytes(bytes),
            ContractRevision {
                revision_number: 1,
                window_start: 100,
                window_end: 200,
            },
            Currency::ZERO,
        )
    }

    fn append_all(contract: ContractId, roots: &[SectorRoot]) -> Vec<ContractUpdate> {
        roots
            .iter()
            .map(|root| ContractUpdate::AppendSector {
                contract,
                root: *root,
            })
            .collect()
    }

    pub async fn account_ledger<S: AccountStore>(store: &S) {
        let account = AccountId::from_bytes([9u8; 32]);
        assert_eq!(store.balance(&account).await.unwrap(), Currency::ZERO);

        assert_eq!(
            store.credit(&account, Currency::new(100)).await.unwrap(),
            Currency::new(100)
        );
        assert_eq!(
            store.debit(&account, Currency::new(40)).await.unwrap(),
            Currency::new(60)
        );

        let result = store.debit(&account, Currency::new(61)).await;
        assert!(matches!(
            result,
            Err(StowageError::InsufficientFunds {
                required: 61,
                available: 60
            })
        ));
        assert_eq!(store.balance(&account).await.unwrap(), Currency::new(60));

        let unknown = AccountId::from_bytes([8u8; 32]);
        assert_eq!(store.debit(&unknown, Currency::ZERO).await.unwrap(), Currency::ZERO);
        assert!(store.debit(&unknown, Currency::new(1)).await.is_err());
    }

    pub async fn sector_root_updates<S: ContractStore>(store: &S) {
        let contract = random_contract();
        let id = contract.id;
        store.add_contract(&contract).await.unwrap();
        assert!(matches!(
            store.add_contract(&contract).await,
            Err(StowageError::ContractExists(_))
        ));

        let mut roots: Vec<SectorRoot> = (0..10).map(|_| random_root()).collect();
        store.apply_updates(append_all(id, &roots)).await.unwrap();
        assert_eq!(store.sector_roots(&id, 0, 100).await.unwrap(), roots);
        assert_eq!(store.sector_count(&id).await.unwrap(), 10);

        // swap two roots
        roots.swap(5, 8);
        store
            .apply_updates(vec![ContractUpdate::SwapSectors { contract: id, i: 5, j: 8 }])
            .await
            .unwrap();
        assert_eq!(store.sector_roots(&id, 0, 100).await.unwrap(), roots);

        // trim the last 3 roots
        roots.truncate(7);
        store
            .apply_updates(vec![ContractUpdate::TrimSectors { contract: id, n: 3 }])
            .await
            .unwrap();
        assert_eq!(store.sector_roots(&id, 0, 100).await.unwrap(), roots);

        // an out of range swap after valid operations discards the whole batch
        let result = store
            .apply_updates(vec![
                ContractUpdate::AppendSector {
                    contract: id,
                    root: random_root(),
                },
                ContractUpdate::SwapSectors { contract: id, i: 0, j: 1 },
                ContractUpdate::SwapSectors { contract: id, i: 0, j: 100 },
            ])
            .await;
        assert!(matches!(
            result,
            Err(StowageError::IndexOutOfRange { index: 100, length: 8 })
        ));
        assert_eq!(store.sector_roots(&id, 0, 100).await.unwrap(), roots);
        assert_eq!(store.sector_count(&id).await.unwrap(), 7);

        // indices see the effect of earlier operations in the same batch
        let extra = random_root();
        store
            .apply_updates(vec![
                ContractUpdate::AppendSector {
                    contract: id,
                    root: extra,
                },
                ContractUpdate::SwapSectors { contract: id, i: 0, j: 7 },
            ])
            .await
            .unwrap();
        roots.push(extra);
        roots.swap(0, 7);
        assert_eq!(store.sector_roots(&id, 0, 100).await.unwrap(), roots);

        // trimming more than the list holds fails
        assert!(store
            .apply_updates(vec![ContractUpdate::TrimSectors { contract: id, n: 9 }])
            .await
            .is_err());
        assert_eq!(store.sector_count(&id).await.unwrap(), 8);
    }

    /// Single-append batches from many tasks on one contract all land
    pub async fn concurrent_appends<S: ContractStore + 'static>(store: Arc<S>) {
        const TASKS: usize = 8;
        const APPENDS: usize = 20;

        let contract = random_contract();
        let id = contract.id;
        store.add_contract(&contract).await.unwrap();

        let mut handles = Vec::new();
        for _ in 0..TASKS {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                let mut appended = Vec::with_capacity(APPENDS);
                for _ in 0..APPENDS {
                    let root = random_root();
                    store
                        .apply_updates(vec![ContractUpdate::AppendSector { contract: id, root }])
                        .await
                        .unwrap();
                    appended.push(root);
                }
                appended
            }));
        }

        let mut expected = HashSet::new();
        for handle in handles {
            expected.extend(handle.await.unwrap());
        }
        assert_eq!(expected.len(), TASKS * APPENDS);

        let total = (TASKS * APPENDS) as u64;
        let roots = store.sector_roots(&id, 0, total).await.unwrap();
        assert_eq!(roots.len(), TASKS * APPENDS);
        assert_eq!(store.sector_count(&id).await.unwrap(), total);
        assert_eq!(roots.into_iter().collect::<HashSet<_>>(), expected);
    }

    pub async fn sector_root_windows<S: ContractStore>(store: &S) {
        let contract = random_contract();
        let id = contract.id;
        store.add_contract(&contract).await.unwrap();

        let roots: Vec<SectorRoot> = (0..10).map(|_| random_root()).collect();
        store.apply_updates(append_all(id, &roots)).await.unwrap();

        assert_eq!(store.sector_roots(&id, 3, 4).await.unwrap(), roots[3..7].to_vec());
        assert_eq!(store.sector_roots(&id, 8, 10).await.unwrap(), roots[8..].to_vec());
        assert!(store.sector_roots(&id, 10, 5).await.unwrap().is_empty());
        assert!(store.sector_roots(&id, 50, 5).await.unwrap().is_empty());

        let missing = ContractId::from_bytes([0xee; 32]);
        assert!(matches!(
            store.sector_roots(&missing, 0, 1).await,
            Err(StowageError::ContractNotFound(_))
        ));
    }

    pub async fn revisions_and_missing_contracts<S: ContractStore>(store: &S) {
        let contract = random_contract();
        let id = contract.id;
        store.add_contract(&contract).await.unwrap();

        let revision = ContractRevision {
            revision_number: 2,
            window_start: 150,
            window_end: 250,
        };
        let root = random_root();
        store
            .apply_updates(vec![
                ContractUpdate::AppendSector { contract: id, root },
                ContractUpdate::ReviseContract { contract: id, revision },
            ])
            .await
            .unwrap();
        let stored = store.contract(&id).await.unwrap();
        assert_eq!(stored.revision, revision);
        assert_eq!(stored.sector_count, 1);

        // a batch touching an unknown contract leaves known contracts untouched
        let missing = ContractId::from_bytes([0xab; 32]);
        let result = store
            .apply_updates(vec![
                ContractUpdate::AppendSector { contract: id, root },
                ContractUpdate::AppendSector {
                    contract: missing,
                    root,
                },
            ])
            .await;
        assert!(matches!(result, Err(StowageError::ContractNotFound(_))));
        assert_eq!(store.sector_roots(&id, 0, 10).await.unwrap(), vec![root]);
    }
}
