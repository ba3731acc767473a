pub mod engine;
pub mod tracker;

pub use engine::{Phase, ScoreEngine, ScoreResult, coerce_component, score};
pub use tracker::{Snapshot, TrajectoryTracker};

/// Honor divisor used when none is configured.
pub const DEFAULT_HONOR: f64 = 1.0;

/// Per-call honor values are floored here to avoid dividing by zero.
pub const HONOR_FLOOR: f64 = 1e-6;

/// Ratio precision (decimal places).
pub const RATIO_DECIMALS: i32 = 4;
