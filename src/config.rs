use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use log::warn;

use crate::blockchain::DEFAULT_NETWORK;
use crate::error::{Error, Result};
use crate::hooks::DEFAULT_ALERT_THRESHOLD;
use crate::mining::validate_difficulty;
use crate::reward::{DEFAULT_BASE_REWARD, ThreatLevel};
use crate::scoring::DEFAULT_HONOR;

/// Settings for a [`Miner`](crate::miner::Miner).
#[derive(Debug, Clone, PartialEq)]
pub struct MinerConfig {
    /// Leading zero hex characters a digest needs.
    pub difficulty: u32,
    /// Wall-clock budget shared by every search in one batch.
    pub timeout: Duration,
    pub base_reward: f64,
    pub honor: f64,
    pub alert_threshold: f64,
    /// Threat level applied to payouts.
    pub threat_level: ThreatLevel,
    pub network: String,
    pub ledger_dir: PathBuf,
    /// Pause between cycles of the continuous loop.
    pub cycle_backoff: Duration,
    /// Search batch targets on the rayon thread pool.
    pub parallel: bool,
}

impl Default for MinerConfig {
    fn default() -> Self {
        Self {
            difficulty: 3,
            timeout: Duration::from_secs(20),
            base_reward: DEFAULT_BASE_REWARD,
            honor: DEFAULT_HONOR,
            alert_threshold: DEFAULT_ALERT_THRESHOLD,
            threat_level: ThreatLevel::High,
            network: DEFAULT_NETWORK.to_string(),
            ledger_dir: PathBuf::from("ledger"),
            cycle_backoff: Duration::from_secs(2),
            parallel: false,
        }
    }
}

impl MinerConfig {
    /// Defaults overridden by `SIGNAL_*` environment variables.
    ///
    /// Unparseable values are logged and ignored. Call after `dotenvy` so a
    /// `.env` file is honoured.
    pub fn from_env() -> Self {
        let d = Self::default();
        Self {
            difficulty: env_parse("SIGNAL_DIFFICULTY").unwrap_or(d.difficulty),
            timeout: env_parse("SIGNAL_TIMEOUT_SECS")
                .and_then(secs_duration)
                .unwrap_or(d.timeout),
            base_reward: env_parse("SIGNAL_BASE_REWARD").unwrap_or(d.base_reward),
            honor: env_parse("SIGNAL_HONOR").unwrap_or(d.honor),
            alert_threshold: env_parse("SIGNAL_ALERT_THRESHOLD").unwrap_or(d.alert_threshold),
            threat_level: env::var("SIGNAL_THREAT_LEVEL")
                .map(|v| ThreatLevel::parse(&v))
                .unwrap_or(d.threat_level),
            network: env::var("SIGNAL_NETWORK").unwrap_or(d.network),
            ledger_dir: env::var("SIGNAL_LEDGER_DIR")
                .map(PathBuf::from)
                .unwrap_or(d.ledger_dir),
            cycle_backoff: env_parse("SIGNAL_CYCLE_BACKOFF_SECS")
                .and_then(secs_duration)
                .unwrap_or(d.cycle_backoff),
            parallel: env_parse("SIGNAL_PARALLEL").unwrap_or(d.parallel),
        }
    }

    pub fn validate(&self) -> Result<()> {
        validate_difficulty(self.difficulty)?;
        if self.timeout.is_zero() {
            return Err(Error::InvalidConfiguration("timeout must be positive".into()));
        }
        if !self.base_reward.is_finite() || self.base_reward < 0.0 {
            return Err(Error::InvalidConfiguration(format!(
                "base reward must be a non-negative number, got {}",
                self.base_reward
            )));
        }
        if !(self.honor > 0.0 && self.honor <= 1.0) {
            return Err(Error::InvalidConfiguration(format!(
                "honor must be in (0, 1], got {}",
                self.honor
            )));
        }
        if !self.alert_threshold.is_finite() {
            return Err(Error::InvalidConfiguration(format!(
                "alert threshold must be finite, got {}",
                self.alert_threshold
            )));
        }
        if self.network.trim().is_empty() {
            return Err(Error::InvalidConfiguration("network must not be empty".into()));
        }
        Ok(())
    }
}

fn secs_duration(secs: f64) -> Option<Duration> {
    Duration::try_from_secs_f64(secs).ok()
}

fn env_parse<T: FromStr>(key: &str) -> Option<T> {
    let raw = env::var(key).ok()?;
    match raw.trim().parse() {
        Ok(v) => Some(v),
        Err(_) => {
            warn!("ignoring {key}={raw:?}: not a valid value");
            None
        }
    }
}
