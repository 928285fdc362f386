use std::env;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::backoff::Backoff;
use crate::error::ProviderError;

/// Slowest non-zero global rate: one reconcile every ~17 minutes.
const MIN_RATE: f64 = 0.001;

/// Tuning for the reconciler, the work queue and the worker pool.
///
/// Durations are whole seconds on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ReconcilerConfig {
    /// Steady-state re-observe interval for resources that are in sync.
    #[serde(with = "secs")]
    pub poll_interval: Duration,
    /// Re-observe delay after a successful create or update.
    #[serde(with = "secs")]
    pub short_wait: Duration,
    /// Upper bound on a single reconcile.
    #[serde(with = "secs")]
    pub timeout: Duration,
    #[serde(with = "secs")]
    pub backoff_floor: Duration,
    #[serde(with = "secs")]
    pub backoff_cap: Duration,
    pub workers: usize,
    /// Reconciles per second across all resources. `0` disables the limit.
    pub max_reconcile_rate: f64,
    pub burst: u32,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(60),
            short_wait: Duration::from_secs(5),
            timeout: Duration::from_secs(10 * 60),
            backoff_floor: Duration::from_secs(60),
            backoff_cap: Duration::from_secs(60 * 60),
            workers: 4,
            max_reconcile_rate: 10.0,
            burst: 20,
        }
    }
}

impl ReconcilerConfig {
    /// Apply `EXO_*` environment overrides on top of `self`, then validate.
    pub fn with_env(mut self) -> Result<Self, ProviderError> {
        if let Some(v) = env_parse::<u64>("EXO_POLL_INTERVAL_SECS")? {
            self.poll_interval = Duration::from_secs(v);
        }
        if let Some(v) = env_parse::<u64>("EXO_SHORT_WAIT_SECS")? {
            self.short_wait = Duration::from_secs(v);
        }
        if let Some(v) = env_parse::<u64>("EXO_RECONCILE_TIMEOUT_SECS")? {
            self.timeout = Duration::from_secs(v);
        }
        if let Some(v) = env_parse::<u64>("EXO_BACKOFF_FLOOR_SECS")? {
            self.backoff_floor = Duration::from_secs(v);
        }
        if let Some(v) = env_parse::<u64>("EXO_BACKOFF_CAP_SECS")? {
            self.backoff_cap = Duration::from_secs(v);
        }
        if let Some(v) = env_parse("EXO_WORKERS")? {
            self.workers = v;
        }
        if let Some(v) = env_parse("EXO_MAX_RECONCILE_RATE")? {
            self.max_reconcile_rate = v;
        }
        if let Some(v) = env_parse("EXO_RECONCILE_BURST")? {
            self.burst = v;
        }
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<(), ProviderError> {
        if self.workers == 0 {
            return Err(ProviderError::Config("workers must be at least 1".into()));
        }
        if self.backoff_floor.is_zero() || self.backoff_floor > self.backoff_cap {
            return Err(ProviderError::Config(format!(
                "backoff floor {:?} must be non-zero and not above cap {:?}",
                self.backoff_floor, self.backoff_cap
            )));
        }
        if self.timeout.is_zero() {
            return Err(ProviderError::Config("timeout must be non-zero".into()));
        }
        let rate = self.max_reconcile_rate;
        if !rate.is_finite() || rate < 0.0 || (rate > 0.0 && rate < MIN_RATE) {
            return Err(ProviderError::Config(format!(
                "max reconcile rate {rate} must be 0 or a finite value of at least {MIN_RATE}"
            )));
        }
        Ok(())
    }

    pub fn backoff(&self) -> Backoff {
        Backoff::new(self.backoff_floor, self.backoff_cap)
    }
}

fn env_parse<T: FromStr>(key: &str) -> Result<Option<T>, ProviderError>
where
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| ProviderError::Config(format!("{key}={raw}: {e}"))),
        Err(_) => Ok(None),
    }
}

mod secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_secs)
    }
}
