pub mod model;

pub use model::Transaction;

/// Transaction type of a scored report.
pub const KIND_REPORT: &str = "nwi_report";

/// Transaction type of a mining payout.
pub const KIND_REWARD: &str = "token_reward";

/// Version tag written into report payloads.
pub const PAYLOAD_VERSION: &str = "1.0";
