use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::ZERO_HASH;
use super::merkle::merkle_root;
use crate::transaction::Transaction;
use crate::utc_now_iso;

/// A single block in the ledger holding a list of transactions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub index: u64,
    pub timestamp: String, // ISO-8601 (UTC)
    pub transactions: Vec<Transaction>,
    pub previous_hash: String,
    pub nonce: u64, // winning search nonce
    pub merkle_root: String,
    pub block_hash: String,
    pub network: String,
}

/// Borrowed view with the same field order as `Block`, used so hashing
/// does not clone the transaction list.
#[derive(Serialize)]
struct HashView<'a> {
    index: u64,
    timestamp: &'a str,
    transactions: &'a [Transaction],
    previous_hash: &'a str,
    nonce: u64,
    merkle_root: &'a str,
    block_hash: &'a str,
    network: &'a str,
}

impl Block {
    /// Create the genesis block (first block in the chain).
    pub fn genesis(network: &str) -> Self {
        Self::new(0, ZERO_HASH.to_string(), Vec::new(), 0, network)
    }

    /// Assemble a sealed block: merkle root and block hash are computed here.
    pub fn new(
        index: u64,
        previous_hash: String,
        transactions: Vec<Transaction>,
        nonce: u64,
        network: &str,
    ) -> Self {
        let mut block = Self {
            index,
            timestamp: utc_now_iso(),
            merkle_root: merkle_root(&transactions),
            transactions,
            previous_hash,
            nonce,
            block_hash: String::new(),
            network: network.to_string(),
        };
        block.block_hash = block.compute_hash();
        block
    }

    /// SHA-256 over the canonical JSON of this block with `block_hash`
    /// blanked. Field order is fixed by the struct definition.
    pub fn compute_hash(&self) -> String {
        let view = HashView {
            index: self.index,
            timestamp: &self.timestamp,
            transactions: &self.transactions,
            previous_hash: &self.previous_hash,
            nonce: self.nonce,
            merkle_root: &self.merkle_root,
            block_hash: "",
            network: &self.network,
        };
        let preimage = serde_json::to_vec(&view).expect("serialize block");
        let mut hasher = Sha256::new();
        hasher.update(&preimage);
        hex::encode(hasher.finalize())
    }

    /// Stored hash matches content.
    pub fn hash_matches(&self) -> bool {
        self.block_hash == self.compute_hash()
    }

    pub fn merkle_matches(&self) -> bool {
        self.merkle_root == merkle_root(&self.transactions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn tx(id: &str) -> Transaction {
        Transaction::new("nwi_report", "NWI-TX", json!({ "id": id }))
    }

    #[test]
    fn genesis_shape() {
        let b = Block::genesis("nwi_testnet");
        assert_eq!(b.index, 0);
        assert_eq!(b.previous_hash, ZERO_HASH);
        assert_eq!(b.merkle_root, ZERO_HASH);
        assert_eq!(b.nonce, 0);
        assert!(b.transactions.is_empty());
        assert!(b.hash_matches());
        assert_eq!(b.block_hash.len(), 64);
    }

    #[test]
    fn hash_is_independent_of_stored_hash() {
        let mut b = Block::new(1, "ab".repeat(32), vec![tx("a")], 7, "nwi_testnet");
        let expected = b.compute_hash();
        b.block_hash = "garbage".into();
        assert_eq!(b.compute_hash(), expected);
    }

    #[test]
    fn view_matches_blanked_block_serialization() {
        let b = Block::new(3, "cd".repeat(32), vec![tx("a"), tx("b")], 99, "nwi_mainnet");
        let mut blank = b.clone();
        blank.block_hash = String::new();
        let bytes = serde_json::to_vec(&blank).unwrap();
        assert_eq!(b.block_hash, hex::encode(Sha256::digest(&bytes)));
    }

    #[test]
    fn invalid_when_mutated() {
        let mut b = Block::new(2, "prev".into(), vec![tx("a")], 5, "nwi_testnet");
        let old_hash = b.block_hash.clone();

        b.transactions.push(tx("extra"));

        assert_ne!(old_hash, b.compute_hash());
        assert!(!b.hash_matches());
        assert!(!b.merkle_matches());
    }
}
