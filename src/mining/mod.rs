pub mod batch;
pub mod cancel;
pub mod search;

pub use batch::{BatchWinner, search_batch};
pub use cancel::CancelToken;
pub use search::{MiningResult, digest, meets_difficulty, search, validate_difficulty};

/// Candidates hashed between two clock/cancel checks.
pub const CHECK_INTERVAL: u64 = 1000;

/// A SHA-256 hex digest has 64 characters, so no larger prefix is satisfiable.
pub const MAX_DIFFICULTY: u32 = 64;
