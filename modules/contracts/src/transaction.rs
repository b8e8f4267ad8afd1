//! Contract update transaction - an ordered batch of sector root mutations

use stowage_core::{
    ContractId, ContractRevision, ContractStore, ContractUpdate, SectorRoot, StowageResult,
};
use tracing::debug;

/// Queues mutations of contract sector lists until committed.
///
/// Updates are applied in the order they were queued, so the indices of a
/// swap or trim are relative to the list as left by the earlier updates.
/// Index bounds are checked by the store at commit; one failure discards the
/// whole batch. Dropping the transaction uncommitted discards it as well.
#[derive(Debug, Default)]
pub struct ContractUpdateTransaction {
    updates: Vec<ContractUpdate>,
}

impl ContractUpdateTransaction {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a root to the end of the contract's list
    pub fn append_sector(&mut self, contract: ContractId, root: SectorRoot) {
        self.updates.push(ContractUpdate::AppendSector { contract, root });
    }

    /// Exchange the roots at positions `i` and `j`
    pub fn swap_sectors(&mut self, contract: ContractId, i: u64, j: u64) {
        self.updates.push(ContractUpdate::SwapSectors { contract, i, j });
    }

    /// Remove the last `n` roots
    pub fn trim_sectors(&mut self, contract: ContractId, n: u64) {
        self.updates.push(ContractUpdate::TrimSectors { contract, n });
    }

    /// Record a newly accepted revision
    pub fn revise_contract(&mut self, contract: ContractId, revision: ContractRevision) {
        self.updates.push(ContractUpdate::ReviseContract { contract, revision });
    }

    pub fn updates(&self) -> &[ContractUpdate] {
        &self.updates
    }

    pub fn len(&self) -> usize {
        self.updates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.updates.is_empty()
    }

    /// Apply every queued update atomically
    pub async fn commit<S: ContractStore + ?Sized>(mut self, store: &S) -> StowageResult<()> {
        let updates = std::mem::take(&mut self.updates);
        if updates.is_empty() {
            return Ok(());
        }
        store.apply_updates(updates).await
    }
}

impl Drop for ContractUpdateTransaction {
    fn drop(&mut self) {
        if !self.updates.is_empty() {
            debug!("Discarded {} uncommitted contract updates", self.updates.len());
        }
    }
}
