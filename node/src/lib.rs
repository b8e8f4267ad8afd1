//! STOWAGE Host Daemon
//!
//! Combines the host components:
//! - sled-backed account and contract stores
//! - ephemeral account budgets
//! - contract sector root updates
//! - local HTTP admin API

mod api;
mod host;
mod runtime;

pub use api::*;
pub use host::*;
pub use runtime::*;
