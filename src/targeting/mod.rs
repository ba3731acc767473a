pub mod model;

pub use model::{NonceTarget, NonceTargeter};

/// Start nonces are reduced into `0..START_MODULUS`.
pub const START_MODULUS: u64 = 1_000_000;

/// Range width before the per-phase multiplier is applied.
pub const BASE_RANGE: u64 = 1_000_000;

/// Fixed-point scale for score components and coordinates.
pub const COMPONENT_SCALE: f64 = 1000.0;
pub const COORDINATE_SCALE: f64 = 1e6;
