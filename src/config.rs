//! Tunables recognised by the engine (spec §6's configuration table). Not a config-file
//! parser — that belongs to the external service wiring this crate plugs into — just a plain
//! struct with documented defaults and a builder-style API.

use crate::model::Currency;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum RoundingMode {
    BankersRounding,
    HalfUp,
}

impl Default for RoundingMode {
    fn default() -> Self {
        RoundingMode::BankersRounding
    }
}

/// What to do when a `proportional_on` strategy can't find usage for any parent (spec §7).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum MissingUsagePolicy {
    FallbackEqual,
    Error,
}

impl Default for MissingUsagePolicy {
    fn default() -> Self {
        MissingUsagePolicy::FallbackEqual
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EngineConfig {
    pub decimal_scale: u32,
    pub rounding_mode: RoundingMode,
    pub tolerance_absolute: Decimal,
    pub tolerance_relative: Decimal,
    pub default_currency: Currency,
    pub worker_pool_size: usize,
    #[serde(with = "duration_seconds")]
    pub run_deadline: Duration,
    pub missing_usage_policy: MissingUsagePolicy,
    /// Number of `StorageUnavailable` retries the Run Coordinator attempts before failing
    /// the run (spec §7).
    pub storage_retry_attempts: u32,
    pub storage_retry_backoff: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            decimal_scale: 6,
            rounding_mode: RoundingMode::default(),
            tolerance_absolute: Decimal::new(1, 2), // 0.01
            tolerance_relative: Decimal::new(1, 2), // 1%
            default_currency: Currency::default(),
            worker_pool_size: 4,
            run_deadline: Duration::from_secs(300),
            missing_usage_policy: MissingUsagePolicy::default(),
            storage_retry_attempts: 3,
            storage_retry_backoff: Duration::from_millis(200),
        }
    }
}

impl EngineConfig {
    pub fn with_decimal_scale(mut self, scale: u32) -> Self {
        self.decimal_scale = scale;
        self
    }

    pub fn with_rounding_mode(mut self, mode: RoundingMode) -> Self {
        self.rounding_mode = mode;
        self
    }

    pub fn with_tolerance_absolute(mut self, tolerance: Decimal) -> Self {
        self.tolerance_absolute = tolerance;
        self
    }

    pub fn with_tolerance_relative(mut self, tolerance: Decimal) -> Self {
        self.tolerance_relative = tolerance;
        self
    }

    pub fn with_default_currency(mut self, currency: Currency) -> Self {
        self.default_currency = currency;
        self
    }

    pub fn with_worker_pool_size(mut self, size: usize) -> Self {
        self.worker_pool_size = size.max(1);
        self
    }

    pub fn with_run_deadline(mut self, deadline: Duration) -> Self {
        self.run_deadline = deadline;
        self
    }

    pub fn with_missing_usage_policy(mut self, policy: MissingUsagePolicy) -> Self {
        self.missing_usage_policy = policy;
        self
    }

    /// Conservation/non-amplification tolerance for a given raw amount: `max(absolute, raw *
    /// relative)` (spec §4.E).
    pub fn tolerance_for(&self, raw: Decimal) -> Decimal {
        let relative = raw.abs() * self.tolerance_relative;
        self.tolerance_absolute.max(relative)
    }
}

mod duration_seconds {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        value.as_secs_f64().serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Ok(Duration::from_secs_f64(secs))
    }
}
