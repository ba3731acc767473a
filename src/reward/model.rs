use std::fmt;

use serde::{Deserialize, Serialize};

use super::SCORE_TIERS;
use crate::error::{Error, Result};

/// Threat level attached to a payout. Unrecognised labels map to `Unknown`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ThreatLevel {
    Critical,
    High,
    Medium,
    Low,
    Unknown,
}

impl ThreatLevel {
    /// Case-insensitive; never fails.
    pub fn parse(label: &str) -> Self {
        match label.trim().to_ascii_uppercase().as_str() {
            "CRITICAL" => ThreatLevel::Critical,
            "HIGH" => ThreatLevel::High,
            "MEDIUM" => ThreatLevel::Medium,
            "LOW" => ThreatLevel::Low,
            _ => ThreatLevel::Unknown,
        }
    }

    pub fn multiplier(&self) -> f64 {
        match self {
            ThreatLevel::Critical => 3.0,
            ThreatLevel::High => 2.0,
            ThreatLevel::Medium => 1.5,
            ThreatLevel::Low | ThreatLevel::Unknown => 1.0,
        }
    }
}

impl fmt::Display for ThreatLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ThreatLevel::Critical => "CRITICAL",
            ThreatLevel::High => "HIGH",
            ThreatLevel::Medium => "MEDIUM",
            ThreatLevel::Low => "LOW",
            ThreatLevel::Unknown => "UNKNOWN",
        };
        f.write_str(s)
    }
}

/// Maps a winning ratio and threat level to a payout.
#[derive(Debug, Default, Clone, Copy)]
pub struct RewardCalculator;

impl RewardCalculator {
    pub fn new() -> Self {
        Self
    }

    /// First matching tier wins; below the lowest tier the multiplier is 1.0.
    pub fn score_multiplier(ratio: f64) -> f64 {
        SCORE_TIERS
            .iter()
            .find(|(min, _)| ratio >= *min)
            .map(|(_, mult)| *mult)
            .unwrap_or(1.0)
    }

    /// `base * score multiplier * level multiplier`.
    ///
    /// A negative or non-finite base is rejected, not clamped.
    pub fn reward(&self, base_reward: f64, ratio: f64, level: ThreatLevel) -> Result<f64> {
        if !base_reward.is_finite() || base_reward < 0.0 {
            return Err(Error::InvalidConfiguration(format!(
                "base reward must be finite and non-negative, got {base_reward}"
            )));
        }
        Ok(base_reward * Self::score_multiplier(ratio) * level.multiplier())
    }
}
