//! STOWAGE State Management
//!
//! Durable and in-memory implementations of the account and contract stores.
//! Accounts are a key-value ledger { account → balance }; each contract keeps
//! its record plus an index-addressed list { (contract, index) → sector root }.

pub mod store;
pub mod memory;
pub mod persistent;

pub use store::*;
pub use memory::*;
pub use persistent::*;
