use std::path::Path;

use log::{info, warn};
use serde::Serialize;

use super::integrity::{IntegrityReport, verify_records};
use super::store::{ChainStore, MalformedLine};
use super::{Block, ZERO_HASH};
use crate::error::Result;
use crate::transaction::{KIND_REPORT, Transaction};

/// Summary figures over the whole chain.
#[derive(Debug, Clone, Serialize)]
pub struct ChainStats {
    pub total_blocks: usize,
    /// Lines in the chain file that did not decode as blocks.
    pub malformed_records: usize,
    pub total_transactions: usize,
    pub report_transactions: usize,
    pub first_block_timestamp: Option<String>,
    pub last_block_timestamp: Option<String>,
    /// Size of the backing file, when the ledger is persisted.
    pub chain_size_bytes: Option<u64>,
}

/// Append-only, hash-linked ledger.
///
/// The chain always starts with a genesis block and only grows through
/// [`BlockLedger::append`]. For concurrent use wrap it in a
/// [`SharedLedger`](super::SharedLedger).
#[derive(Debug)]
pub struct BlockLedger {
    chain: Vec<Block>,
    /// Undecodable file lines, kept at their chain positions.
    malformed: Vec<MalformedLine>,
    network: String,
    store: Option<ChainStore>,
}

impl BlockLedger {
    /// Ledger without persistence, initialised with a genesis block.
    pub fn in_memory(network: &str) -> Self {
        Self {
            chain: vec![Block::genesis(network)],
            malformed: Vec::new(),
            network: network.to_string(),
            store: None,
        }
    }

    /// Load the chain file under `dir`, or create it with a genesis block.
    pub fn open(dir: &Path, network: &str) -> Result<Self> {
        let store = ChainStore::in_dir(dir)?;
        let loaded = store.load()?;

        let mut ledger = Self {
            chain: loaded.blocks,
            malformed: loaded.malformed,
            network: network.to_string(),
            store: Some(store),
        };

        if ledger.is_empty() {
            ledger.append(Block::genesis(network))?;
            info!("genesis block created for {network}");
        } else {
            info!("loaded {} record(s) for {network}", ledger.len());
            let report = ledger.verify();
            if report.tamper_detected {
                warn!(
                    "ledger loaded with {} invalid block(s) at {:?}",
                    report.invalid_blocks,
                    report.invalid_indices()
                );
            }
        }
        Ok(ledger)
    }

    /// Assemble the next block on top of `previous_hash`.
    ///
    /// The block is not appended; see [`BlockLedger::append`].
    pub fn build_candidate(&self, previous_hash: &str, transactions: Vec<Transaction>, nonce: u64) -> Block {
        Block::new(
            self.len() as u64,
            previous_hash.to_string(),
            transactions,
            nonce,
            &self.network,
        )
    }

    /// Append `block` to the chain, writing it to disk first when persisted.
    ///
    /// The block is trusted: callers validate it against the current tail.
    /// If the write fails the in-memory chain is left unchanged.
    pub fn append(&mut self, block: Block) -> Result<&Block> {
        if let Some(store) = &self.store {
            store.append(&block)?;
        }
        info!(
            "block #{} added to {}: {}",
            block.index,
            self.network,
            &block.block_hash[..block.block_hash.len().min(12)]
        );
        self.chain.push(block);
        Ok(&self.chain[self.chain.len() - 1])
    }

    /// Recompute every hash, merkle root and link.
    pub fn verify(&self) -> IntegrityReport {
        verify_records(&self.chain, &self.malformed)
    }

    /// Like [`verify`](Self::verify) but fails with
    /// `LedgerIntegrityViolation` when anything is off.
    pub fn ensure_intact(&self) -> Result<IntegrityReport> {
        self.verify().into_result()
    }

    pub fn last_block(&self) -> Option<&Block> {
        self.chain.last()
    }

    /// Hash the next block must link to.
    ///
    /// When the last record is malformed this is the hash it still carried,
    /// or the zero hash if none survived.
    pub fn tail_hash(&self) -> &str {
        if let Some(bad) = self.malformed.last().filter(|m| m.position + 1 == self.len() as u64) {
            return bad.block_hash.as_deref().unwrap_or(ZERO_HASH);
        }
        self.chain
            .last()
            .map(|b| b.block_hash.as_str())
            .unwrap_or(ZERO_HASH)
    }

    /// Decoded blocks, without any malformed records.
    pub fn chain(&self) -> &[Block] {
        &self.chain
    }

    pub fn malformed(&self) -> &[MalformedLine] {
        &self.malformed
    }

    /// Number of records, decoded or not.
    pub fn len(&self) -> usize {
        self.chain.len() + self.malformed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn network(&self) -> &str {
        &self.network
    }

    pub fn stats(&self) -> Result<ChainStats> {
        let chain_size_bytes = match &self.store {
            Some(store) => Some(store.size_bytes()?),
            None => None,
        };
        let transactions = || self.chain.iter().flat_map(|b| b.transactions.iter());
        Ok(ChainStats {
            total_blocks: self.chain.len(),
            malformed_records: self.malformed.len(),
            total_transactions: transactions().count(),
            report_transactions: transactions().filter(|t| t.kind == KIND_REPORT).count(),
            first_block_timestamp: self.chain.first().map(|b| b.timestamp.clone()),
            last_block_timestamp: self.chain.last().map(|b| b.timestamp.clone()),
            chain_size_bytes,
        })
    }

    /// Report transactions whose payload `location` equals `location`.
    pub fn reports_at_location(&self, location: &str) -> Vec<&Transaction> {
        self.chain
            .iter()
            .flat_map(|b| b.transactions.iter())
            .filter(|t| t.kind == KIND_REPORT && t.payload["location"].as_str() == Some(location))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockchain::BlockFault;
    use crate::error::Error;
    use serde_json::json;
    use std::fs;
    use std::io::Write;

    fn report_tx(id: &str, location: &str) -> Transaction {
        Transaction::new(KIND_REPORT, "NWI-TX", json!({ "id": id, "location": location }))
    }

    fn append_next(ledger: &mut BlockLedger, txs: Vec<Transaction>, nonce: u64) -> Block {
        let prev = ledger.tail_hash().to_string();
        let candidate = ledger.build_candidate(&prev, txs, nonce);
        ledger.append(candidate).unwrap().clone()
    }

    #[test]
    fn new_ledger_holds_only_genesis() {
        let ledger = BlockLedger::in_memory("nwi_testnet");
        assert_eq!(ledger.len(), 1);
        assert_eq!(ledger.chain()[0].previous_hash, ZERO_HASH);
        assert!(!ledger.verify().tamper_detected);
    }

    #[test]
    fn appended_candidate_verifies() {
        let mut ledger = BlockLedger::in_memory("nwi_testnet");
        let block = append_next(&mut ledger, vec![report_tx("LIVE-1", "dock")], 4242);

        assert_eq!(block.index, 1);
        assert_eq!(block.previous_hash, ledger.chain()[0].block_hash);
        assert_eq!(block.network, "nwi_testnet");

        let report = ledger.verify();
        assert_eq!(report.total_blocks, 2);
        assert_eq!(report.valid_blocks, 2);
        assert!(!report.tamper_detected);
        assert!(report.details[1].valid);
    }

    #[test]
    fn reopening_reconstructs_the_same_chain() {
        let dir = tempfile::tempdir().unwrap();
        let original = {
            let mut ledger = BlockLedger::open(dir.path(), "nwi_testnet").unwrap();
            append_next(&mut ledger, vec![report_tx("a", "dock")], 1);
            append_next(&mut ledger, vec![report_tx("b", "dock"), report_tx("c", "gate")], 2);
            ledger.chain().to_vec()
        };

        let reopened = BlockLedger::open(dir.path(), "nwi_testnet").unwrap();
        assert_eq!(reopened.chain(), original.as_slice());
        assert!(reopened.ensure_intact().is_ok());
    }

    #[test]
    fn tampered_file_is_detected_at_the_right_index() {
        let dir = tempfile::tempdir().unwrap();
        let path = {
            let mut ledger = BlockLedger::open(dir.path(), "nwi_testnet").unwrap();
            append_next(&mut ledger, vec![report_tx("LIVE-1", "dock")], 11);
            append_next(&mut ledger, vec![report_tx("LIVE-2", "dock")], 12);
            dir.path().join(crate::blockchain::CHAIN_FILE_NAME)
        };

        let contents = fs::read_to_string(&path).unwrap();
        let mut lines: Vec<String> = contents.lines().map(str::to_string).collect();
        assert!(lines[1].contains("LIVE-1"));
        lines[1] = lines[1].replacen("LIVE-1", "LIVE-7", 1);
        fs::write(&path, lines.join("\n") + "\n").unwrap();

        let reopened = BlockLedger::open(dir.path(), "nwi_testnet").unwrap();
        let report = reopened.verify();
        assert!(report.tamper_detected);
        assert_eq!(report.invalid_blocks, 1);
        assert_eq!(report.invalid_indices(), vec![1]);
        assert!(matches!(
            reopened.ensure_intact(),
            Err(Error::LedgerIntegrityViolation { .. })
        ));
    }

    #[test]
    fn failed_write_leaves_chain_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let ledger_dir = dir.path().join("ledger");
        let mut ledger = BlockLedger::open(&ledger_dir, "nwi_testnet").unwrap();
        fs::remove_dir_all(&ledger_dir).unwrap();

        let prev = ledger.tail_hash().to_string();
        let candidate = ledger.build_candidate(&prev, vec![report_tx("x", "dock")], 3);
        assert!(matches!(
            ledger.append(candidate),
            Err(Error::PersistenceFailure { .. })
        ));
        assert_eq!(ledger.len(), 1);
    }

    #[test]
    fn stats_and_location_queries() {
        let mut ledger = BlockLedger::in_memory("nwi_testnet");
        append_next(&mut ledger, vec![report_tx("a", "dock"), report_tx("b", "gate")], 1);
        append_next(
            &mut ledger,
            vec![Transaction::new("token_reward", "TOKEN", json!({ "amount": 1.5 }))],
            2,
        );

        let stats = ledger.stats().unwrap();
        assert_eq!(stats.total_blocks, 3);
        assert_eq!(stats.total_transactions, 3);
        assert_eq!(stats.report_transactions, 2);
        assert!(stats.chain_size_bytes.is_none());
        assert!(stats.first_block_timestamp.is_some());

        let at_dock = ledger.reports_at_location("dock");
        assert_eq!(at_dock.len(), 1);
        assert_eq!(at_dock[0].payload["id"], "a");
        assert!(ledger.reports_at_location("harbor").is_empty());
    }

    #[test]
    fn malformed_line_and_value_tamper_are_reported_together() {
        let dir = tempfile::tempdir().unwrap();
        let path = {
            let mut ledger = BlockLedger::open(dir.path(), "nwi_testnet").unwrap();
            for (i, id) in ["LIVE-1", "LIVE-2", "LIVE-3"].into_iter().enumerate() {
                append_next(&mut ledger, vec![report_tx(id, "dock")], i as u64);
            }
            dir.path().join(crate::blockchain::CHAIN_FILE_NAME)
        };

        let contents = fs::read_to_string(&path).unwrap();
        let mut lines: Vec<String> = contents.lines().map(str::to_string).collect();
        lines[1] = lines[1].replacen("\"tx_id\"", "\"tx_ie\"", 1);
        lines[3] = lines[3].replacen("LIVE-3", "LIVE-9", 1);
        fs::write(&path, lines.join("\n") + "\n").unwrap();

        let mut reopened = BlockLedger::open(dir.path(), "nwi_testnet").unwrap();
        assert_eq!(reopened.len(), 4);
        assert_eq!(reopened.malformed().len(), 1);

        let report = reopened.verify();
        assert_eq!(report.total_blocks, 4);
        assert_eq!(report.invalid_indices(), vec![1, 3]);
        assert_eq!(report.details[1].faults, vec![BlockFault::Malformed]);
        assert!(report.details[2].valid);
        assert!(report.details[3].faults.contains(&BlockFault::HashMismatch));
        assert_eq!(reopened.stats().unwrap().malformed_records, 1);

        // New blocks still land after the last record.
        let block = append_next(&mut reopened, vec![report_tx("LIVE-4", "gate")], 9);
        assert_eq!(block.index, 4);
        assert_eq!(reopened.verify().invalid_indices(), vec![1, 3]);
    }

    #[test]
    fn trailing_malformed_record_sets_the_tail() {
        let dir = tempfile::tempdir().unwrap();
        let path = {
            let mut ledger = BlockLedger::open(dir.path(), "nwi_testnet").unwrap();
            append_next(&mut ledger, vec![report_tx("LIVE-1", "dock")], 1);
            dir.path().join(crate::blockchain::CHAIN_FILE_NAME)
        };
        let mut f = fs::OpenOptions::new().append(true).open(&path).unwrap();
        writeln!(f, r#"{{"index": 2, "block_hash": "{}"}}"#, "e".repeat(64)).unwrap();
        drop(f);

        let ledger = BlockLedger::open(dir.path(), "nwi_testnet").unwrap();
        assert_eq!(ledger.len(), 3);
        assert_eq!(ledger.tail_hash(), "e".repeat(64));
    }
}
