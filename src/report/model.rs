use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use super::{DEFAULT_CLASSIFICATION, DEFAULT_SOURCE, MAX_TEXT_CHARS};
use crate::error::{Error, Result};
use crate::scoring::{ScoreEngine, ScoreResult};

/// A validated signal report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub id: String,
    pub courage: f64,
    pub dexterity: f64,
    pub clause_matter: f64,
    pub audacity: f64,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub text: String,
    pub source: String,
    pub meta: Map<String, Value>,
}

impl Report {
    /// Validate and normalise a raw report mapping.
    ///
    /// Score fields default to 0 when absent but must otherwise be numbers
    /// (or numeric strings) in [0, 1]. Coordinates must be in range.
    pub fn from_value(value: &Value) -> Result<Self> {
        let obj = value
            .as_object()
            .ok_or_else(|| Error::InvalidInput("report must be a JSON object".into()))?;

        let lat = numeric_field(obj, "lat")?;
        if let Some(lat) = lat {
            if !(-90.0..=90.0).contains(&lat) {
                return Err(Error::InvalidInput(format!(
                    "latitude must be between -90 and 90, got {lat}"
                )));
            }
        }
        let lon = numeric_field(obj, "lon")?;
        if let Some(lon) = lon {
            if !(-180.0..=180.0).contains(&lon) {
                return Err(Error::InvalidInput(format!(
                    "longitude must be between -180 and 180, got {lon}"
                )));
            }
        }

        let id = match obj.get("id") {
            Some(Value::String(s)) if !s.trim().is_empty() => s.trim().to_string(),
            Some(Value::Number(n)) => n.to_string(),
            _ => Uuid::new_v4().to_string(),
        };

        Ok(Self {
            id,
            courage: score_field(obj, "courage")?,
            dexterity: score_field(obj, "dexterity")?,
            clause_matter: score_field(obj, "clause_matter")?,
            audacity: score_field(obj, "audacity")?,
            lat,
            lon,
            text: obj
                .get("text")
                .and_then(Value::as_str)
                .map(|t| t.chars().take(MAX_TEXT_CHARS).collect())
                .unwrap_or_default(),
            source: obj
                .get("source")
                .and_then(Value::as_str)
                .unwrap_or(DEFAULT_SOURCE)
                .to_string(),
            meta: obj
                .get("meta")
                .and_then(Value::as_object)
                .cloned()
                .unwrap_or_default(),
        })
    }

    pub fn score_with(&self, engine: &ScoreEngine) -> ScoreResult {
        engine.score(self.courage, self.dexterity, self.clause_matter, self.audacity)
    }

    /// Both coordinates, when the report carries both.
    pub fn coordinates(&self) -> Option<(f64, f64)> {
        self.lat.zip(self.lon)
    }

    pub fn location(&self) -> Option<&str> {
        self.meta.get("location").and_then(Value::as_str)
    }

    pub fn classification(&self) -> &str {
        self.meta
            .get("classification")
            .and_then(Value::as_str)
            .unwrap_or(DEFAULT_CLASSIFICATION)
    }

    /// SHA-256 (hex) of the report's canonical JSON form.
    pub fn evidence_hash(&self) -> String {
        // Struct fields serialize in declaration order and `meta` keys are sorted.
        let bytes = serde_json::to_vec(self).unwrap_or_default();
        hex::encode(Sha256::digest(&bytes))
    }
}

/// Split an input document into raw report mappings.
///
/// Accepts either a top-level array or an object with a `reports` array.
pub fn parse_batch(input: &str) -> Result<Vec<Value>> {
    let doc: Value = serde_json::from_str(input)
        .map_err(|e| Error::InvalidInput(format!("reports are not valid JSON: {e}")))?;
    match doc {
        Value::Array(items) => Ok(items),
        Value::Object(mut obj) => match obj.remove("reports") {
            Some(Value::Array(items)) => Ok(items),
            _ => Err(Error::InvalidInput("expected a `reports` array".into())),
        },
        _ => Err(Error::InvalidInput("expected an array of reports".into())),
    }
}

fn numeric_field(obj: &Map<String, Value>, key: &str) -> Result<Option<f64>> {
    let parsed = match obj.get(key) {
        None | Some(Value::Null) => return Ok(None),
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        Some(_) => None,
    };
    match parsed {
        Some(v) if v.is_finite() => Ok(Some(v)),
        _ => Err(Error::InvalidInput(format!("invalid {key} value"))),
    }
}

fn score_field(obj: &Map<String, Value>, key: &str) -> Result<f64> {
    let value = numeric_field(obj, key)?.unwrap_or(0.0);
    if !(0.0..=1.0).contains(&value) {
        return Err(Error::InvalidInput(format!(
            "{key} must be between 0 and 1, got {value}"
        )));
    }
    Ok(value)
}
