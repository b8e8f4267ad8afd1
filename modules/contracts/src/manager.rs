//! Contract manager - contract registration, root reads, and update scopes

use std::sync::Arc;
use stowage_core::{Contract, ContractId, ContractStore, Hash, SectorRoot, StowageResult};
use stowage_crypto::contract_root;
use tracing::{debug, info};

use crate::transaction::ContractUpdateTransaction;

/// Contract service over a durable contract store
pub struct ContractManager<S: ContractStore> {
    store: Arc<S>,
}

impl<S: ContractStore + 'static> ContractManager<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Start tracking a newly formed contract
    pub async fn add_contract(&self, contract: &Contract) -> StowageResult<()> {
        self.store.add_contract(contract).await?;
        info!(
            "Added contract {} (revision {}, window {}..{})",
            contract.id,
            contract.revision.revision_number,
            contract.revision.window_start,
            contract.revision.window_end
        );
        Ok(())
    }

    pub async fn contract(&self, id: &ContractId) -> StowageResult<Contract> {
        self.store.contract(id).await
    }

    /// Get up to `limit` roots starting at `offset`
    pub async fn sector_roots(
        &self,
        id: &ContractId,
        offset: u64,
        limit: u64,
    ) -> StowageResult<Vec<SectorRoot>> {
        self.store.sector_roots(id, offset, limit).await
    }

    /// Run `f` against a fresh update transaction.
    ///
    /// If `f` fails its updates are discarded and the error returned;
    /// otherwise everything it queued is committed in one atomic batch.
    pub async fn update_contracts<F>(&self, f: F) -> StowageResult<()>
    where
        F: FnOnce(&mut ContractUpdateTransaction) -> StowageResult<()>,
    {
        let mut tx = ContractUpdateTransaction::new();
        f(&mut tx)?;

        let count = tx.len();
        tx.commit(self.store.as_ref()).await?;
        debug!("Committed {} contract updates", count);
        Ok(())
    }

    /// Merkle root over the contract's full sector list
    pub async fn merkle_root(&self, id: &ContractId) -> StowageResult<Hash> {
        let roots = self.store.sector_roots(id, 0, u64::MAX).await?;
        Ok(contract_root(&roots))
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }
}

/// Shared contract manager type
pub type SharedContractManager<S> = Arc<ContractManager<S>>;
