//! Hashing functions using BLAKE3
//!
//! Leaves and interior nodes are domain separated so a sector's data can never
//! collide with an interior node of the tree built over it.

use stowage_core::{Hash, SectorRoot};

/// Size of one stored sector in bytes (4 MiB)
pub const SECTOR_SIZE: usize = 1 << 22;

/// Size of one Merkle leaf segment in bytes
pub const LEAF_SIZE: usize = 64;

const LEAF_PREFIX: u8 = 0x00;
const NODE_PREFIX: u8 = 0x01;

/// Compute BLAKE3 hash of data
pub fn blake3_hash(data: &[u8]) -> Hash {
    let hash = blake3::hash(data);
    Hash::from_bytes(*hash.as_bytes())
}

/// Default hash function (BLAKE3)
pub fn hash(data: &[u8]) -> Hash {
    blake3_hash(data)
}

/// Hash multiple pieces of data
pub fn hash_multiple(parts: &[&[u8]]) -> Hash {
    let mut hasher = blake3::Hasher::new();
    for part in parts {
        hasher.update(part);
    }
    let hash = hasher.finalize();
    Hash::from_bytes(*hash.as_bytes())
}

fn leaf_hash(segment: &[u8]) -> Hash {
    hash_multiple(&[&[LEAF_PREFIX], segment])
}

fn node_hash(left: &Hash, right: &Hash) -> Hash {
    hash_multiple(&[&[NODE_PREFIX], left.as_bytes(), right.as_bytes()])
}

/// Merkle tree root computation
///
/// An odd node at the end of a level is carried up unchanged, so appending a
/// leaf never changes the hashes of complete subtrees to its left.
pub fn merkle_root(leaves: &[Hash]) -> Hash {
    if leaves.is_empty() {
        return Hash::ZERO;
    }

    let mut current_level: Vec<Hash> = leaves.to_vec();

    while current_level.len() > 1 {
        let next_level = current_level
            .chunks(2)
            .map(|chunk| match chunk {
                [left, right] => node_hash(left, right),
                [single] => *single,
                _ => unreachable!("chunks(2) yields one or two elements"),
            })
            .collect();
        current_level = next_level;
    }

    current_level[0]
}

/// Root of a sector's data, built over its 64-byte segments
pub fn sector_root(data: &[u8]) -> SectorRoot {
    let leaves: Vec<Hash> = data.chunks(LEAF_SIZE).map(leaf_hash).collect();
    merkle_root(&leaves)
}

/// Aggregate commitment over a contract's ordered sector roots
pub fn contract_root(roots: &[SectorRoot]) -> Hash {
    merkle_root(roots)
}
