use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use serde_json::Value;

use super::engine::{Phase, ScoreEngine, ScoreResult, coerce_component, round_ratio};
use crate::error::{Error, Result};

/// One recorded update of a [`TrajectoryTracker`].
#[derive(Debug, Clone, Serialize)]
pub struct Snapshot {
    pub score: ScoreResult,
    /// Ratio after smoothing; equals `score.ratio` when smoothing is off.
    pub smoothed_ratio: f64,
    pub phase: Phase,
    pub timestamp: String,
}

/// Stateful scorer keeping a history of snapshots and an optional
/// exponential moving average of the ratio.
#[derive(Debug)]
pub struct TrajectoryTracker {
    engine: ScoreEngine,
    smoothing_alpha: f64,
    ema: Option<f64>,
    history: Vec<Snapshot>,
}

impl TrajectoryTracker {
    /// `smoothing_alpha` must lie in [0, 1]; 0 disables smoothing.
    pub fn new(engine: ScoreEngine, smoothing_alpha: f64) -> Result<Self> {
        if !(0.0..=1.0).contains(&smoothing_alpha) {
            return Err(Error::InvalidConfiguration(format!(
                "smoothing alpha must be in [0, 1], got {smoothing_alpha}"
            )));
        }
        Ok(Self {
            engine,
            smoothing_alpha,
            ema: None,
            history: Vec::new(),
        })
    }

    pub fn update(&mut self, courage: f64, dexterity: f64, clause_matter: f64, audacity: f64) -> &Snapshot {
        let score = self.engine.score(courage, dexterity, clause_matter, audacity);

        let smoothed_ratio = if self.smoothing_alpha > 0.0 {
            let next = match self.ema {
                None => score.ratio,
                Some(prev) => self.smoothing_alpha * score.ratio + (1.0 - self.smoothing_alpha) * prev,
            };
            self.ema = Some(next);
            round_ratio(next)
        } else {
            score.ratio
        };

        self.history.push(Snapshot {
            phase: Phase::from_ratio(smoothed_ratio),
            smoothed_ratio,
            score,
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
        });
        // just pushed
        &self.history[self.history.len() - 1]
    }

    /// Score raw report mappings in order. Missing or non-numeric fields
    /// count as 0.0.
    pub fn batch_update(&mut self, updates: &[Value]) -> Vec<Snapshot> {
        updates
            .iter()
            .map(|u| {
                self.update(
                    coerce_component(u.get("courage")),
                    coerce_component(u.get("dexterity")),
                    coerce_component(u.get("clause_matter")),
                    coerce_component(u.get("audacity")),
                )
                .clone()
            })
            .collect()
    }

    pub fn latest(&self) -> Option<&Snapshot> {
        self.history.last()
    }

    pub fn history(&self) -> &[Snapshot] {
        &self.history
    }

    /// History as newline-delimited JSON.
    pub fn history_ndjson(&self) -> String {
        let mut out = String::new();
        for snap in &self.history {
            out.push_str(&serde_json::to_string(snap).expect("serialize snapshot"));
            out.push('\n');
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn without_smoothing_ratio_is_raw() {
        let mut t = TrajectoryTracker::new(ScoreEngine::default(), 0.0).unwrap();
        let snap = t.update(0.8, 0.7, 0.85, 0.6);
        assert_eq!(snap.smoothed_ratio, 0.7375);
        assert_eq!(snap.phase, Phase::Verification);
    }

    #[test]
    fn ema_pulls_towards_history() {
        let mut t = TrajectoryTracker::new(ScoreEngine::default(), 0.5).unwrap();
        t.update(0.0, 0.0, 0.0, 0.0);
        let snap = t.update(1.0, 1.0, 1.0, 1.0);
        assert_eq!(snap.score.ratio, 1.0);
        assert_eq!(snap.smoothed_ratio, 0.5);
        assert_eq!(snap.phase, Phase::Verification);
        assert_eq!(t.history().len(), 2);
    }

    #[test]
    fn batch_update_defaults_missing_fields() {
        let mut t = TrajectoryTracker::new(ScoreEngine::default(), 0.0).unwrap();
        let out = t.batch_update(&[
            json!({"courage": 1.0, "dexterity": 1.0}),
            json!({"courage": "oops", "audacity": 1.0}),
        ]);
        assert_eq!(out[0].smoothed_ratio, 0.5);
        assert_eq!(out[1].smoothed_ratio, 0.25);
        assert_eq!(t.latest().map(|s| s.phase), Some(Phase::Adaptation));
    }

    #[test]
    fn rejects_bad_alpha() {
        assert!(TrajectoryTracker::new(ScoreEngine::default(), 1.5).is_err());
        assert!(TrajectoryTracker::new(ScoreEngine::default(), f64::NAN).is_err());
    }

    #[test]
    fn history_exports_one_line_per_update() {
        let mut t = TrajectoryTracker::new(ScoreEngine::default(), 0.3).unwrap();
        assert_eq!(t.history_ndjson(), "");
        t.update(0.1, 0.2, 0.3, 0.4);
        t.update(0.4, 0.3, 0.2, 0.1);
        let dump = t.history_ndjson();
        assert_eq!(dump.lines().count(), 2);
        assert!(dump.contains("\"smoothed_ratio\""));
    }
}
