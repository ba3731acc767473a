pub mod model;

pub use model::{CycleOutcome, LoopSummary, MinedBlock, Miner, PreparedBatch};

/// Prefix of generated miner identities.
pub const MINER_ID_PREFIX: &str = "MINER-";

/// Prefix of wallet addresses derived from a miner id.
pub const WALLET_PREFIX: &str = "NWI_";
