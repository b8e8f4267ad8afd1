//! Core traits defining STOWAGE interfaces
//!
//! The managers only reach durable storage through these traits.

use crate::error::StowageError;
use crate::types::*;
use async_trait::async_trait;

/// Result type for STOWAGE operations
pub type StowageResult<T> = Result<T, StowageError>;

/// Durable ledger of ephemeral account balances
#[async_trait]
pub trait AccountStore: Send + Sync {
    /// Get the durable balance of an account; unknown accounts hold zero
    async fn balance(&self, account: &AccountId) -> StowageResult<Currency>;

    /// Add funds to an account, returning the new balance
    async fn credit(&self, account: &AccountId, amount: Currency) -> StowageResult<Currency>;

    /// Atomically remove funds from an account, returning the new balance.
    /// Fails with `InsufficientFunds` without changing anything if the balance is too low.
    async fn debit(&self, account: &AccountId, amount: Currency) -> StowageResult<Currency>;
}

/// Durable storage of contracts and their sector roots
#[async_trait]
pub trait ContractStore: Send + Sync {
    /// Register a new contract with an empty sector list
    async fn add_contract(&self, contract: &Contract) -> StowageResult<()>;

    /// Get a contract
    async fn contract(&self, id: &ContractId) -> StowageResult<Contract>;

    /// Get up to `limit` roots starting at `offset`, in list order
    async fn sector_roots(
        &self,
        id: &ContractId,
        offset: u64,
        limit: u64,
    ) -> StowageResult<Vec<SectorRoot>>;

    /// Get the length of a contract's sector list
    async fn sector_count(&self, id: &ContractId) -> StowageResult<u64> {
        Ok(self.contract(id).await?.sector_count)
    }

    /// Apply a batch of updates atomically, in order.
    /// Either every update becomes visible or none does.
    async fn apply_updates(&self, updates: Vec<ContractUpdate>) -> StowageResult<()>;
}

/// Check both swap indices against the current list length
pub fn check_swap(length: u64, i: u64, j: u64) -> StowageResult<()> {
    for index in [i, j] {
        if index >= length {
            return Err(StowageError::IndexOutOfRange { index, length });
        }
    }
    Ok(())
}

/// Check that `n` roots can be trimmed from a list of `length`
pub fn check_trim(length: u64, n: u64) -> StowageResult<()> {
    if n > length {
        return Err(StowageError::IndexOutOfRange { index: n, length });
    }
    Ok(())
}

/// Window `[offset, offset + limit)` clamped to `length`
pub fn roots_window(length: u64, offset: u64, limit: u64) -> std::ops::Range<u64> {
    let start = offset.min(length);
    let end = offset.saturating_add(limit).min(length);
    start..end
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_swap() {
        assert!(check_swap(10, 5, 8).is_ok());
        assert!(check_swap(10, 9, 0).is_ok());
        assert!(matches!(
            check_swap(10, 0, 10),
            Err(StowageError::IndexOutOfRange { index: 10, length: 10 })
        ));
        assert!(check_swap(0, 0, 0).is_err());
    }

    #[test]
    fn test_check_trim() {
        assert!(check_trim(10, 10).is_ok());
        assert!(check_trim(10, 0).is_ok());
        assert!(check_trim(3, 4).is_err());
    }

    #[test]
    fn test_roots_window() {
        assert_eq!(roots_window(10, 0, 100), 0..10);
        assert_eq!(roots_window(10, 4, 3), 4..7);
        assert_eq!(roots_window(10, 12, 5), 10..10);
        assert_eq!(roots_window(10, 2, u64::MAX), 2..10);
    }
}
