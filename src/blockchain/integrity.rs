use serde::Serialize;

use super::{Block, MalformedLine, ZERO_HASH};
use crate::error::{Error, Result};

/// Why a block failed verification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockFault {
    /// Stored `block_hash` does not match the recomputed hash.
    HashMismatch,
    /// Stored `merkle_root` does not match the transactions.
    MerkleMismatch,
    /// `previous_hash` does not equal the prior block's `block_hash`
    /// (or the zero hash for genesis).
    BrokenLink,
    /// Stored `index` differs from the block's position in the chain.
    IndexMismatch,
    /// The stored line does not decode as a block.
    Malformed,
}

#[derive(Debug, Clone, Serialize)]
pub struct BlockCheck {
    /// Position in the chain.
    pub index: u64,
    pub valid: bool,
    pub block_hash: String,
    pub faults: Vec<BlockFault>,
}

/// Outcome of a full-chain walk.
#[derive(Debug, Clone, Serialize)]
pub struct IntegrityReport {
    pub total_blocks: usize,
    pub valid_blocks: usize,
    pub invalid_blocks: usize,
    pub tamper_detected: bool,
    pub details: Vec<BlockCheck>,
}

impl IntegrityReport {
    pub fn invalid_indices(&self) -> Vec<u64> {
        self.details
            .iter()
            .filter(|c| !c.valid)
            .map(|c| c.index)
            .collect()
    }

    /// Turn findings into `LedgerIntegrityViolation`.
    pub fn into_result(self) -> Result<Self> {
        if self.tamper_detected {
            return Err(Error::LedgerIntegrityViolation {
                indices: self.invalid_indices(),
            });
        }
        Ok(self)
    }
}

/// Check every block; does not stop at the first failure.
pub fn verify_blocks(blocks: &[Block]) -> IntegrityReport {
    verify_records(blocks, &[])
}

/// Walk decoded blocks and malformed lines in file order.
///
/// A malformed line is its own invalid entry. The block after it is linked
/// against whatever `block_hash` the line still carried; when none could be
/// recovered the link check for that block is skipped.
pub fn verify_records(blocks: &[Block], malformed: &[MalformedLine]) -> IntegrityReport {
    let total = blocks.len() + malformed.len();
    let mut details = Vec::with_capacity(total);
    let mut blocks = blocks.iter();
    let mut malformed = malformed.iter().peekable();
    let mut expected_prev = Some(ZERO_HASH);

    for pos in 0..total as u64 {
        if let Some(bad) = malformed.next_if(|m| m.position == pos) {
            details.push(BlockCheck {
                index: pos,
                valid: false,
                block_hash: bad.block_hash.clone().unwrap_or_default(),
                faults: vec![BlockFault::Malformed],
            });
            expected_prev = bad.block_hash.as_deref();
            continue;
        }
        let Some(block) = blocks.next() else { break };

        let mut faults = Vec::new();
        if !block.hash_matches() {
            faults.push(BlockFault::HashMismatch);
        }
        if !block.merkle_matches() {
            faults.push(BlockFault::MerkleMismatch);
        }
        if expected_prev.is_some_and(|prev| block.previous_hash != prev) {
            faults.push(BlockFault::BrokenLink);
        }
        if block.index != pos {
            faults.push(BlockFault::IndexMismatch);
        }

        details.push(BlockCheck {
            index: pos,
            valid: faults.is_empty(),
            block_hash: block.block_hash.clone(),
            faults,
        });
        expected_prev = Some(block.block_hash.as_str());
    }

    let invalid_blocks = details.iter().filter(|c| !c.valid).count();
    IntegrityReport {
        total_blocks: details.len(),
        valid_blocks: details.len() - invalid_blocks,
        invalid_blocks,
        tamper_detected: invalid_blocks > 0,
        details,
    }
}
