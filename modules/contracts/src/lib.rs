//! Contract module for STOWAGE
//!
//! Every contract commits to an ordered list of sector roots. The list is only
//! changed through [`ContractUpdateTransaction`] batches, which the store applies
//! all together or not at all.

pub mod transaction;
pub mod manager;

pub use transaction::*;
pub use manager::*;
