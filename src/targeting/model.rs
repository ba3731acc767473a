use serde::{Deserialize, Serialize};

use super::{BASE_RANGE, COMPONENT_SCALE, COORDINATE_SCALE, START_MODULUS};
use crate::error::{Error, Result};
use crate::report::Report;
use crate::scoring::{Phase, ScoreResult};

/// Search window derived from a scored report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NonceTarget {
    pub start_nonce: u64,
    pub range_size: u64,
    pub source_ratio: f64,
    pub source_phase: Phase,
}

impl NonceTarget {
    /// Exclusive upper bound of the window.
    pub fn end_nonce(&self) -> u64 {
        // checked when the target was built
        self.start_nonce.saturating_add(self.range_size)
    }
}

/// Derives a deterministic nonce window from a score.
///
/// The mixing is not cryptographic; identical inputs only need to yield
/// identical targets.
#[derive(Debug, Default, Clone, Copy)]
pub struct NonceTargeter;

impl NonceTargeter {
    pub fn new() -> Self {
        Self
    }

    pub fn target(&self, report: &Report, score: &ScoreResult) -> Result<NonceTarget> {
        let start_nonce = start_nonce(score, report.coordinates());
        let range_size = BASE_RANGE * Self::phase_multiplier_permille(score.phase) / 1000;

        if range_size == 0 {
            return Err(Error::InvalidInput(format!(
                "report {} derives an empty nonce range",
                report.id
            )));
        }
        if start_nonce.checked_add(range_size).is_none() {
            return Err(Error::InvalidInput(format!(
                "report {} derives a nonce range past u64::MAX",
                report.id
            )));
        }

        Ok(NonceTarget {
            start_nonce,
            range_size,
            source_ratio: score.ratio,
            source_phase: score.phase,
        })
    }

    /// Range multiplier per phase, in thousandths. Higher-confidence phases
    /// search a narrower window.
    pub fn phase_multiplier_permille(phase: Phase) -> u64 {
        match phase {
            Phase::Initiation => 2000,
            Phase::Adaptation => 1500,
            Phase::Verification => 1200,
            Phase::Action => 800,
            Phase::Equilibrium => 500,
        }
    }
}

fn start_nonce(score: &ScoreResult, coordinates: Option<(f64, f64)>) -> u64 {
    let [c, d, m, a] = score.components().map(|v| (v * COMPONENT_SCALE).round() as i64);
    let mut combo = (c ^ d) + (m | a);

    if let Some((lat, lon)) = coordinates {
        combo ^= (lat.abs() * COORDINATE_SCALE) as i64;
        combo += (lon.abs() * COORDINATE_SCALE) as i64;
    }

    combo.unsigned_abs() % START_MODULUS
}
