use chrono::Utc;
use log::{debug, warn};
use serde::Serialize;
use uuid::Uuid;

use super::HIGH_PRIORITY_RATIO;
use crate::error::{Error, Result};
use crate::report::Report;
use crate::scoring::{Phase, ScoreResult};
use crate::utc_now_iso;

/// Record handed to an external notifier when a score crosses the threshold.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Incident {
    pub incident_id: String,
    pub created_at: String,
    pub priority: String,
    pub report_id: String,
    pub ratio: f64,
    pub phase: Phase,
    pub evidence_hash: String,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
}

/// Delivery of incidents is external; implementors only receive them.
pub trait AlertSink: Send + Sync {
    fn emit(&self, incident: &Incident);
}

impl<F> AlertSink for F
where
    F: Fn(&Incident) + Send + Sync,
{
    fn emit(&self, incident: &Incident) {
        self(incident)
    }
}

/// Writes incidents to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogAlertSink;

impl AlertSink for LogAlertSink {
    fn emit(&self, incident: &Incident) {
        warn!(
            "INCIDENT {} priority={} report={} ratio={} phase={} evidence={}",
            incident.incident_id,
            incident.priority,
            incident.report_id,
            incident.ratio,
            incident.phase,
            incident.evidence_hash
        );
    }
}

/// Raises incidents for scores at or above a threshold.
pub struct IncidentMonitor {
    threshold: f64,
    sink: Box<dyn AlertSink>,
}

impl IncidentMonitor {
    pub fn new(threshold: f64, sink: Box<dyn AlertSink>) -> Result<Self> {
        if !threshold.is_finite() {
            return Err(Error::InvalidConfiguration(format!(
                "alert threshold must be finite, got {threshold}"
            )));
        }
        Ok(Self { threshold, sink })
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Emit and return an incident when `score` crosses the threshold.
    pub fn observe(&self, report: &Report, score: &ScoreResult) -> Option<Incident> {
        if score.ratio < self.threshold {
            debug!("report {} below threshold (ratio {})", report.id, score.ratio);
            return None;
        }

        let priority = if score.ratio >= HIGH_PRIORITY_RATIO { "HIGH" } else { "MEDIUM" };
        let suffix = Uuid::new_v4().simple().to_string();
        let incident = Incident {
            incident_id: format!("INC-{}-{}", Utc::now().format("%Y%m%dT%H%M%SZ"), &suffix[..8]),
            created_at: utc_now_iso(),
            priority: priority.to_string(),
            report_id: report.id.clone(),
            ratio: score.ratio,
            phase: score.phase,
            evidence_hash: report.evidence_hash(),
            lat: report.lat,
            lon: report.lon,
        };
        self.sink.emit(&incident);
        Some(incident)
    }
}
