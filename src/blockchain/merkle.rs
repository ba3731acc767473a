use sha2::{Digest, Sha256};

use super::ZERO_HASH;
use crate::transaction::Transaction;

/// Merkle root over transaction content hashes.
///
/// Adjacent hex digests are concatenated as text and re-hashed level by
/// level; an odd trailing hash is paired with itself. An empty list yields
/// the all-zero sentinel rather than a hash of anything.
pub fn merkle_root(transactions: &[Transaction]) -> String {
    if transactions.is_empty() {
        return ZERO_HASH.to_string();
    }

    let mut level: Vec<String> = transactions.iter().map(Transaction::content_hash).collect();
    while level.len() > 1 {
        level = level
            .chunks(2)
            .map(|pair| {
                let left = &pair[0];
                let right = pair.get(1).unwrap_or(left);
                let mut hasher = Sha256::new();
                hasher.update(left.as_bytes());
                hasher.update(right.as_bytes());
                hex::encode(hasher.finalize())
            })
            .collect();
    }
    level.swap_remove(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn tx(id: &str) -> Transaction {
        Transaction::new("nwi_report", "NWI-TX", json!({ "id": id }))
    }

    fn pair_hash(a: &str, b: &str) -> String {
        hex::encode(Sha256::digest(format!("{a}{b}").as_bytes()))
    }

    #[test]
    fn empty_list_is_zero_sentinel() {
        assert_eq!(merkle_root(&[]), "0".repeat(64));
    }

    #[test]
    fn single_transaction_is_its_own_hash() {
        let t = tx("a");
        let expected = hex::encode(Sha256::digest(t.canonical_bytes()));
        assert_eq!(merkle_root(std::slice::from_ref(&t)), expected);
    }

    #[test]
    fn even_list_is_order_sensitive() {
        let (a, b) = (tx("a"), tx("b"));
        let forward = merkle_root(&[a.clone(), b.clone()]);
        let swapped = merkle_root(&[b.clone(), a.clone()]);
        assert_ne!(forward, swapped);
        assert_eq!(forward, pair_hash(&a.content_hash(), &b.content_hash()));
    }

    #[test]
    fn odd_level_duplicates_last_hash() {
        let (a, b, c) = (tx("a"), tx("b"), tx("c"));
        let ab = pair_hash(&a.content_hash(), &b.content_hash());
        let cc = pair_hash(&c.content_hash(), &c.content_hash());
        assert_eq!(merkle_root(&[a, b, c]), pair_hash(&ab, &cc));
    }
}
