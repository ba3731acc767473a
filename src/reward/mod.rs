pub mod model;

pub use model::{RewardCalculator, ThreatLevel};

/// Base payout per mined block when none is configured.
pub const DEFAULT_BASE_REWARD: f64 = 0.01;

/// Score tiers as (minimum ratio, multiplier), checked top-down.
pub const SCORE_TIERS: [(f64, f64); 4] = [(0.9, 2.5), (0.8, 2.0), (0.7, 1.5), (0.6, 1.2)];
