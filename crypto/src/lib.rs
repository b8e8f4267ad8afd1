//! STOWAGE Cryptography Module
//!
//! Provides the hashing used for sector commitments:
//! - BLAKE3 for leaf and node hashing
//! - Merkle roots over sector data and over a contract's sector roots

pub mod hashing;

pub use hashing::*;
