//! Core types for STOWAGE
//!
//! Identifiers, currency, and the contract records shared by the stores and managers.

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! fixed_bytes {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub struct $name(pub [u8; 32]);

        impl $name {
            pub const ZERO: $name = $name([0u8; 32]);

            pub fn from_bytes(bytes: [u8; 32]) -> Self {
                $name(bytes)
            }

            pub fn as_bytes(&self) -> &[u8; 32] {
                &self.0
            }

            pub fn to_hex(&self) -> String {
                hex::encode(self.0)
            }

            pub fn from_hex(s: &str) -> Result<Self, hex::FromHexError> {
                let bytes = hex::decode(s)?;
                if bytes.len() != 32 {
                    return Err(hex::FromHexError::InvalidStringLength);
                }
                let mut arr = [0u8; 32];
                arr.copy_from_slice(&bytes);
                Ok($name(arr))
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", &self.to_hex()[..16])
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.to_hex())
            }
        }
    };
}

fixed_bytes!(
    /// 32-byte hash type
    Hash
);

fixed_bytes!(
    /// Ephemeral account identifier (the renter's account key)
    AccountId
);

fixed_bytes!(
    /// Contract identifier; stable across every revision of the contract
    ContractId
);

/// Content hash of one stored sector
pub type SectorRoot = Hash;

/// Currency amount in hastings
/// Using u128 so every ledger value fits without truncation
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
pub struct Currency(pub u128);

impl Currency {
    pub const ZERO: Currency = Currency(0);
    pub const MAX: Currency = Currency(u128::MAX);

    /// One siacoin = 10^24 hastings
    pub const DECIMALS: u32 = 24;
    pub const ONE_SC: u128 = 1_000_000_000_000_000_000_000_000;

    pub fn new(value: u128) -> Self {
        Currency(value)
    }

    pub fn from_sc(sc: u64) -> Self {
        Currency(sc as u128 * Self::ONE_SC)
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    pub fn checked_add(self, other: Currency) -> Option<Currency> {
        self.0.checked_add(other.0).map(Currency)
    }

    pub fn checked_sub(self, other: Currency) -> Option<Currency> {
        self.0.checked_sub(other.0).map(Currency)
    }

    pub fn saturating_add(self, other: Currency) -> Currency {
        Currency(self.0.saturating_add(other.0))
    }

    pub fn saturating_sub(self, other: Currency) -> Currency {
        Currency(self.0.saturating_sub(other.0))
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let whole = self.0 / Self::ONE_SC;
        let frac = self.0 % Self::ONE_SC;
        if frac == 0 {
            write!(f, "{} SC", whole)
        } else {
            write!(f, "{}.{:024} SC", whole, frac)
        }
    }
}

impl fmt::Debug for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Currency({})", self.0)
    }
}

/// Metadata of the latest revision the host accepted for a contract
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ContractRevision {
    pub revision_number: u64,
    pub window_start: u64,
    pub window_end: u64,
}

/// A contract as tracked by the host
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contract {
    pub id: ContractId,
    pub revision: ContractRevision,
    pub locked_collateral: Currency,
    /// Length of the contract's sector root list
    pub sector_count: u64,
}

impl Contract {
    pub fn new(id: ContractId, revision: ContractRevision, locked_collateral: Currency) -> Self {
        Self {
            id,
            revision,
            locked_collateral,
            sector_count: 0,
        }
    }
}

/// A single queued mutation of a contract
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContractUpdate {
    /// Append a root to the tail of the list
    AppendSector { contract: ContractId, root: SectorRoot },
    /// Exchange the roots at two positions
    SwapSectors { contract: ContractId, i: u64, j: u64 },
    /// Remove the last `n` roots
    TrimSectors { contract: ContractId, n: u64 },
    /// Replace the accepted revision metadata
    ReviseContract { contract: ContractId, revision: ContractRevision },
}

impl ContractUpdate {
    pub fn contract(&self) -> ContractId {
        match self {
            ContractUpdate::AppendSector { contract, .. }
            | ContractUpdate::SwapSectors { contract, .. }
            | ContractUpdate::TrimSectors { contract, .. }
            | ContractUpdate::ReviseContract { contract, .. } => *contract,
        }
    }
}
