//! Error types for STOWAGE

use thiserror::Error;

/// Main error type for STOWAGE
#[derive(Error, Debug)]
pub enum StowageError {
    // ============ Account Errors ============
    #[error("insufficient budget: unable to spend {requested}, {remaining} remaining")]
    InsufficientBudget { requested: u128, remaining: u128 },

    #[error("insufficient funds: required {required}, available {available}")]
    InsufficientFunds { required: u128, available: u128 },

    #[error("balance would exceed maximum: {balance} > {max}")]
    BalanceExceedsMax { balance: u128, max: u128 },

    #[error("currency overflow")]
    Overflow,

    // ============ Contract Errors ============
    #[error("contract not found: {0}")]
    ContractNotFound(String),

    #[error("contract already exists: {0}")]
    ContractExists(String),

    #[error("sector index {index} out of range for {length} roots")]
    IndexOutOfRange { index: u64, length: u64 },

    // ============ Storage Errors ============
    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("Message serialization failed: {0}")]
    SerializationError(String),

    #[error("Message deserialization failed: {0}")]
    DeserializationError(String),

    // ============ Configuration Errors ============
    #[error("Configuration error: {0}")]
    ConfigError(String),

    // ============ General Errors ============
    /// Bookkeeping reached a state the calling code must never produce
    #[error("invariant violation: {0}")]
    InvariantViolation(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl StowageError {
    /// Whether the error signals a programming defect rather than a runtime condition
    pub fn is_fatal(&self) -> bool {
        matches!(self, StowageError::InvariantViolation(_))
    }
}

impl From<std::io::Error> for StowageError {
    fn from(err: std::io::Error) -> Self {
        StowageError::StorageError(err.to_string())
    }
}

impl From<bincode::Error> for StowageError {
    fn from(err: bincode::Error) -> Self {
        StowageError::SerializationError(err.to_string())
    }
}

impl From<serde_json::Error> for StowageError {
    fn from(err: serde_json::Error) -> Self {
        StowageError::SerializationError(err.to_string())
    }
}
