pub mod block;
pub mod integrity;
pub mod merkle;
pub mod model;
pub mod shared;
pub mod store;

pub use block::Block;
pub use integrity::{BlockCheck, BlockFault, IntegrityReport};
pub use merkle::merkle_root;
pub use model::{BlockLedger, ChainStats};
pub use shared::SharedLedger;
pub use store::{ChainStore, LoadedChain, MalformedLine};

/// Previous hash of the genesis block and merkle root of an empty block.
pub const ZERO_HASH: &str = "0000000000000000000000000000000000000000000000000000000000000000";

/// Ledger file name inside the ledger directory.
pub const CHAIN_FILE_NAME: &str = "nwi_blockchain.ndjson";

/// Network label when none is configured.
pub const DEFAULT_NETWORK: &str = "nwi_mainnet";
