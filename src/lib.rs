//! Signal-scoring proof-of-work miner.
//!
//! Reports are scored into a trajectory ratio, the ratio steers a nonce
//! window, the best window across a batch is mined and the winning report is
//! sealed into an append-only, hash-linked ledger.

pub mod blockchain;
pub mod config;
pub mod error;
pub mod hooks;
pub mod miner;
pub mod mining;
pub mod report;
pub mod reward;
pub mod scoring;
pub mod targeting;
pub mod transaction;

use chrono::{SecondsFormat, Utc};

pub use error::{Error, Result};

/// Current UTC time as RFC 3339 with microseconds and a `Z` suffix.
pub fn utc_now_iso() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}
