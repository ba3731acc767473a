use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{DEFAULT_HONOR, HONOR_FLOOR, RATIO_DECIMALS};
use crate::error::{Error, Result};

/// Named bucket of a trajectory ratio.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Phase {
    #[serde(rename = "Initiation (Courage)")]
    Initiation,
    #[serde(rename = "Adaptation (Dexterity)")]
    Adaptation,
    #[serde(rename = "Verification (Clause Matter)")]
    Verification,
    #[serde(rename = "Action (Audacity)")]
    Action,
    #[serde(rename = "Equilibrium (Honor)")]
    Equilibrium,
}

impl Phase {
    /// Bins are left-closed/right-open; everything from 1.0 up is Equilibrium.
    pub fn from_ratio(ratio: f64) -> Self {
        if ratio < 0.25 {
            Phase::Initiation
        } else if ratio < 0.5 {
            Phase::Adaptation
        } else if ratio < 0.75 {
            Phase::Verification
        } else if ratio < 1.0 {
            Phase::Action
        } else {
            Phase::Equilibrium
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Phase::Initiation => "Initiation (Courage)",
            Phase::Adaptation => "Adaptation (Dexterity)",
            Phase::Verification => "Verification (Clause Matter)",
            Phase::Action => "Action (Audacity)",
            Phase::Equilibrium => "Equilibrium (Honor)",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Clamped score components with the derived ratio and phase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreResult {
    pub courage: f64,
    pub dexterity: f64,
    pub clause_matter: f64,
    pub audacity: f64,
    pub ratio: f64,
    pub phase: Phase,
    pub honor: f64,
}

impl ScoreResult {
    pub fn components(&self) -> [f64; 4] {
        [self.courage, self.dexterity, self.clause_matter, self.audacity]
    }
}

/// Score engine bound to a validated honor divisor.
#[derive(Debug, Clone, Copy)]
pub struct ScoreEngine {
    honor: f64,
}

impl Default for ScoreEngine {
    fn default() -> Self {
        Self {
            honor: DEFAULT_HONOR,
        }
    }
}

impl ScoreEngine {
    /// Honor must satisfy `0 < honor <= 1`; anything else is rejected.
    pub fn new(honor: f64) -> Result<Self> {
        if !(honor > 0.0 && honor <= 1.0) {
            return Err(Error::InvalidConfiguration(format!(
                "honor must be in (0, 1], got {honor}"
            )));
        }
        Ok(Self { honor })
    }

    pub fn honor(&self) -> f64 {
        self.honor
    }

    pub fn score(&self, courage: f64, dexterity: f64, clause_matter: f64, audacity: f64) -> ScoreResult {
        score(courage, dexterity, clause_matter, audacity, self.honor)
    }
}

/// Score four components against a per-call honor divisor.
///
/// Unlike [`ScoreEngine::new`], the divisor is not validated here: it is
/// floored at [`HONOR_FLOOR`] so the call never fails.
pub fn score(courage: f64, dexterity: f64, clause_matter: f64, audacity: f64, honor: f64) -> ScoreResult {
    let c = clamp_component(courage);
    let d = clamp_component(dexterity);
    let m = clamp_component(clause_matter);
    let a = clamp_component(audacity);

    let denominator = 4.0 * honor.max(HONOR_FLOOR);
    let ratio = round_ratio((c + d + m + a) / denominator);

    ScoreResult {
        courage: c,
        dexterity: d,
        clause_matter: m,
        audacity: a,
        ratio,
        phase: Phase::from_ratio(ratio),
        honor,
    }
}

/// Best-effort numeric coercion of a raw report field.
///
/// Numbers and numeric strings are clamped; anything else scores 0.0.
pub fn coerce_component(value: Option<&Value>) -> f64 {
    let raw = match value {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    raw.map(clamp_component).unwrap_or(0.0)
}

fn clamp_component(v: f64) -> f64 {
    if v.is_finite() { v.clamp(0.0, 1.0) } else { 0.0 }
}

pub(crate) fn round_ratio(x: f64) -> f64 {
    let scale = 10f64.powi(RATIO_DECIMALS);
    (x * scale).round() / scale
}
