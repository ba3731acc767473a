use std::sync::{Arc, PoisonError, RwLock};

use log::warn;

use super::{Block, BlockLedger, IntegrityReport};
use crate::error::Result;
use crate::transaction::Transaction;

/// Thread-safe handle to a [`BlockLedger`].
///
/// Appends take the write lock, so only one writer runs at a time, and a
/// block is only appended if the tail it was built for is still the tail.
/// Verification and other reads share the read lock.
#[derive(Debug, Clone)]
pub struct SharedLedger {
    inner: Arc<RwLock<BlockLedger>>,
}

impl SharedLedger {
    pub fn new(ledger: BlockLedger) -> Self {
        Self {
            inner: Arc::new(RwLock::new(ledger)),
        }
    }

    /// Append a block linking to `previous_hash`.
    ///
    /// Returns `Ok(None)` without writing when another writer has moved the
    /// tail since `previous_hash` was read.
    pub fn append_on(
        &self,
        previous_hash: &str,
        transactions: Vec<Transaction>,
        nonce: u64,
    ) -> Result<Option<Block>> {
        // append writes to disk before touching the chain, so a poisoned
        // lock still guards a consistent ledger
        let mut ledger = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        if ledger.tail_hash() != previous_hash {
            warn!(
                "tail moved from {} to {}; block not appended",
                short(previous_hash),
                short(ledger.tail_hash())
            );
            return Ok(None);
        }
        let candidate = ledger.build_candidate(previous_hash, transactions, nonce);
        let block = ledger.append(candidate)?.clone();
        Ok(Some(block))
    }

    /// Hash the next block must link to.
    pub fn tail_hash(&self) -> String {
        self.read(|ledger| ledger.tail_hash().to_string())
    }

    pub fn verify(&self) -> IntegrityReport {
        self.read(BlockLedger::verify)
    }

    /// Run `f` under the read lock.
    pub fn read<R>(&self, f: impl FnOnce(&BlockLedger) -> R) -> R {
        let ledger = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        f(&ledger)
    }
}

fn short(hash: &str) -> &str {
    &hash[..hash.len().min(12)]
}
