use log::{error, info, warn};
use rand::RngCore;
use rand::rngs::OsRng;
use serde::Serialize;
use serde_json::{Value, json};
use sha2::{Digest, Sha256};

use super::{MINER_ID_PREFIX, WALLET_PREFIX};
use crate::blockchain::{Block, BlockLedger, SharedLedger};
use crate::config::MinerConfig;
use crate::error::Result;
use crate::hooks::{AlertSink, Incident, IncidentMonitor, LogAlertSink, LogRewardSink, RewardEvent, RewardSink};
use crate::mining::{CancelToken, search_batch};
use crate::report::Report;
use crate::reward::RewardCalculator;
use crate::scoring::{ScoreEngine, ScoreResult};
use crate::targeting::{NonceTarget, NonceTargeter};
use crate::transaction::Transaction;

/// Block produced by a successful cycle.
#[derive(Debug, Clone, Serialize)]
pub struct MinedBlock {
    pub block: Block,
    pub report_id: String,
    pub ratio: f64,
    pub nonce: u64,
    pub digest_hex: String,
    pub reward: f64,
    pub elapsed_seconds: f64,
}

/// What one pass over a batch of reports did.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CycleOutcome {
    /// Reports that passed validation and produced a target.
    pub accepted: usize,
    pub skipped: usize,
    pub incidents: Vec<Incident>,
    /// `None` when no target met the difficulty in time.
    pub mined: Option<MinedBlock>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LoopSummary {
    pub cycles: u64,
    pub blocks_mined: u64,
    pub failed_cycles: u64,
}

impl LoopSummary {
    /// No cycle failed.
    pub fn is_clean(&self) -> bool {
        self.failed_cycles == 0
    }
}

/// A scored report waiting for the search.
struct Candidate {
    report: Report,
    score: ScoreResult,
    target: NonceTarget,
}

/// Reports validated, scored, alerted on and targeted once, ready to be
/// mined by any number of cycles.
pub struct PreparedBatch {
    candidates: Vec<Candidate>,
    pub skipped: usize,
    pub incidents: Vec<Incident>,
}

impl PreparedBatch {
    /// Reports that passed validation and produced a target.
    pub fn accepted(&self) -> usize {
        self.candidates.len()
    }
}

/// Drives score -> target -> search -> reward -> append.
pub struct Miner {
    miner_id: String,
    wallet: String,
    config: MinerConfig,
    engine: ScoreEngine,
    targeter: NonceTargeter,
    rewards: RewardCalculator,
    ledger: SharedLedger,
    monitor: IncidentMonitor,
    reward_sink: Box<dyn RewardSink>,
}

impl Miner {
    /// Miner over an existing ledger, with logging sinks.
    pub fn new(config: MinerConfig, ledger: SharedLedger) -> Result<Self> {
        config.validate()?;
        let miner_id = generate_miner_id();
        let wallet = wallet_address(&miner_id);
        info!("miner {miner_id} ready (wallet {wallet}, network {})", config.network);

        Ok(Self {
            engine: ScoreEngine::new(config.honor)?,
            monitor: IncidentMonitor::new(config.alert_threshold, Box::new(LogAlertSink))?,
            targeter: NonceTargeter::new(),
            rewards: RewardCalculator::new(),
            reward_sink: Box::new(LogRewardSink),
            miner_id,
            wallet,
            config,
            ledger,
        })
    }

    /// Miner over the ledger file in `config.ledger_dir`.
    pub fn open(config: MinerConfig) -> Result<Self> {
        config.validate()?;
        let ledger = BlockLedger::open(&config.ledger_dir, &config.network)?;
        Self::new(config, SharedLedger::new(ledger))
    }

    pub fn with_alert_sink(mut self, sink: Box<dyn AlertSink>) -> Result<Self> {
        self.monitor = IncidentMonitor::new(self.config.alert_threshold, sink)?;
        Ok(self)
    }

    pub fn with_reward_sink(mut self, sink: Box<dyn RewardSink>) -> Self {
        self.reward_sink = sink;
        self
    }

    pub fn miner_id(&self) -> &str {
        &self.miner_id
    }

    pub fn wallet(&self) -> &str {
        &self.wallet
    }

    pub fn config(&self) -> &MinerConfig {
        &self.config
    }

    pub fn ledger(&self) -> &SharedLedger {
        &self.ledger
    }

    /// Score and mine one batch of raw reports.
    ///
    /// Invalid reports are logged and skipped. Only ledger I/O fails the
    /// cycle; running out of time yields `mined: None`.
    pub fn run_cycle(&self, raw_reports: &[Value], cancel: &CancelToken) -> Result<CycleOutcome> {
        let batch = self.ingest(raw_reports);
        let mined = self.mine(&batch, cancel)?;
        Ok(CycleOutcome {
            accepted: batch.accepted(),
            skipped: batch.skipped,
            incidents: batch.incidents,
            mined,
        })
    }

    /// Validate, score and target every report, raising an incident for
    /// each one over the alert threshold.
    pub fn ingest(&self, raw_reports: &[Value]) -> PreparedBatch {
        let mut batch = PreparedBatch {
            candidates: Vec::with_capacity(raw_reports.len()),
            skipped: 0,
            incidents: Vec::new(),
        };
        for (pos, raw) in raw_reports.iter().enumerate() {
            match self.prepare(raw) {
                Ok(candidate) => {
                    if let Some(incident) = self.monitor.observe(&candidate.report, &candidate.score) {
                        batch.incidents.push(incident);
                    }
                    batch.candidates.push(candidate);
                }
                Err(e) => {
                    warn!("skipping report #{pos}: {e}");
                    batch.skipped += 1;
                }
            }
        }
        if batch.candidates.is_empty() {
            info!("no valid reports in batch of {}", raw_reports.len());
        }
        batch
    }

    /// Search the batch against the current tail and append the winner.
    ///
    /// `Ok(None)` when nothing met the difficulty in time, or when another
    /// writer moved the tail while the search ran.
    pub fn mine(&self, batch: &PreparedBatch, cancel: &CancelToken) -> Result<Option<MinedBlock>> {
        let candidates = &batch.candidates;
        if candidates.is_empty() {
            return Ok(None);
        }

        let previous_hash = self.ledger.tail_hash();
        let contexts: Vec<String> = candidates
            .iter()
            .map(|c| self.search_context(c, &previous_hash))
            .collect();
        let targets: Vec<NonceTarget> = candidates.iter().map(|c| c.target.clone()).collect();
        let winner = search_batch(
            &targets,
            self.config.difficulty,
            self.config.timeout,
            cancel,
            self.config.parallel,
            |i, nonce, _| format!("{nonce}:{}", contexts[i]).into_bytes(),
        )?;
        let Some(winner) = winner else {
            info!("no block found within {:?}", self.config.timeout);
            return Ok(None);
        };

        let chosen = &candidates[winner.index];
        let mined = winner.result;
        let amount = self
            .rewards
            .reward(self.config.base_reward, chosen.score.ratio, self.config.threat_level)?;

        let transactions = vec![
            Transaction::report(&chosen.report, &chosen.score, &self.config.network),
            Transaction::reward(&self.config.network, &self.wallet, amount, &mined),
        ];
        let Some(block) = self.ledger.append_on(&previous_hash, transactions, mined.nonce)? else {
            warn!("discarding solution for report {}: chain tail changed", chosen.report.id);
            return Ok(None);
        };

        self.reward_sink.emit(&RewardEvent {
            wallet_id: self.wallet.clone(),
            amount,
            block_hash: block.block_hash.clone(),
        });
        info!(
            "mined block #{} for report {} (ratio {}, nonce {}, reward {:.8})",
            block.index, chosen.report.id, chosen.score.ratio, mined.nonce, amount
        );

        Ok(Some(MinedBlock {
            report_id: chosen.report.id.clone(),
            ratio: chosen.score.ratio,
            nonce: mined.nonce,
            digest_hex: mined.digest_hex,
            reward: amount,
            elapsed_seconds: mined.elapsed_seconds,
            block,
        }))
    }

    /// Ingest `raw_reports` once, then mine the batch until cancelled or
    /// `max_cycles` have run. A failed cycle is logged and the loop carries
    /// on after the configured backoff.
    pub fn run_continuous(&self, raw_reports: &[Value], cancel: &CancelToken, max_cycles: Option<u64>) -> LoopSummary {
        let mut summary = LoopSummary::default();
        if cancel.is_cancelled() {
            return summary;
        }
        let batch = self.ingest(raw_reports);

        while !cancel.is_cancelled() {
            summary.cycles += 1;
            match self.mine(&batch, cancel) {
                Ok(Some(_)) => summary.blocks_mined += 1,
                Ok(None) => {}
                Err(e) => {
                    summary.failed_cycles += 1;
                    error!("cycle {} failed: {e}", summary.cycles);
                }
            }
            if max_cycles.is_some_and(|max| summary.cycles >= max) {
                break;
            }
            if cancel.sleep(self.config.cycle_backoff) {
                break;
            }
        }
        info!(
            "mining loop stopped after {} cycle(s): {} block(s), {} failure(s)",
            summary.cycles, summary.blocks_mined, summary.failed_cycles
        );
        summary
    }

    fn prepare(&self, raw: &Value) -> Result<Candidate> {
        let report = Report::from_value(raw)?;
        let score = report.score_with(&self.engine);
        let target = self.targeter.target(&report, &score)?;
        Ok(Candidate { report, score, target })
    }

    /// Search preimage suffix binding a candidate to one chain tail.
    fn search_context(&self, candidate: &Candidate, previous_hash: &str) -> String {
        // json! objects keep their keys sorted
        json!({
            "difficulty": self.config.difficulty,
            "miner_id": self.miner_id,
            "network": self.config.network,
            "previous_hash": previous_hash,
            "report_id": candidate.report.id,
            "trajectory_ratio": candidate.score.ratio,
        })
        .to_string()
    }
}

fn generate_miner_id() -> String {
    let mut bytes = [0u8; 8];
    OsRng.fill_bytes(&mut bytes);
    format!("{MINER_ID_PREFIX}{}", hex::encode(bytes))
}

/// `NWI_` followed by the first 40 hex characters of SHA-256(miner id).
pub fn wallet_address(miner_id: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(miner_id.as_bytes());
    let hash = hex::encode(hasher.finalize());
    format!("{WALLET_PREFIX}{}", &hash[..40])
}
