pub mod alert;
pub mod reward;

pub use alert::{AlertSink, Incident, IncidentMonitor, LogAlertSink};
pub use reward::{LogRewardSink, RewardEvent, RewardSink};

/// Ratio at or above which a report raises an incident.
pub const DEFAULT_ALERT_THRESHOLD: f64 = 0.8;

/// Ratio at or above which an incident is HIGH priority.
pub const HIGH_PRIORITY_RATIO: f64 = 0.95;
