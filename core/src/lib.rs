//! STOWAGE Core Library
//!
//! Core types, traits, and abstractions shared by the STOWAGE host components.
//! The account and contract stores are defined here as traits so the managers
//! never depend on a concrete persistence engine.

pub mod types;
pub mod traits;
pub mod error;
pub mod config;

pub use types::*;
pub use traits::*;
pub use error::*;
pub use config::*;
