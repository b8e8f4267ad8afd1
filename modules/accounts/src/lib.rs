//! Ephemeral account module for STOWAGE
//!
//! Renters pay for metered operations from prepaid accounts. Each request:
//! - reserves its maximum cost as a [`Budget`] from the [`AccountManager`]
//! - spends and refunds against that reservation while it runs
//! - commits the actual spend to the durable ledger, or rolls back

pub mod budget;
pub mod manager;

pub use budget::*;
pub use manager::*;
