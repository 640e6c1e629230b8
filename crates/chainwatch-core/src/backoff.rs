//! Exponential reconnect backoff: `min(max_delay, unit * base^attempt)`.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Configuration for the reconnect backoff.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackoffConfig {
    /// Duration of one "unit" of delay; the exponent counts in these.
    #[serde(default = "default_unit_ms")]
    pub unit_ms: u64,
    /// Exponential base.
    #[serde(default = "default_base")]
    pub base: u32,
    /// Ceiling for any single wait.
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

fn default_unit_ms() -> u64 { 1_000 }
fn default_base() -> u32 { 2 }
fn default_max_delay_ms() -> u64 { 60_000 }

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            unit_ms: default_unit_ms(),
            base: default_base(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

/// Stateless backoff policy — computes the wait for a given attempt number.
#[derive(Debug, Clone)]
pub struct Backoff {
    pub config: BackoffConfig,
}

impl Backoff {
    pub fn new(config: BackoffConfig) -> Self {
        Self { config }
    }

    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.config.max_delay_ms)
    }

    /// Wait before reconnecting after the `attempt`-th connect attempt.
    ///
    /// Non-decreasing in `attempt` and never above `max_delay`, including
    /// for attempt counts large enough to overflow the exponent.
    pub fn delay(&self, attempt: u32) -> Duration {
        let cap = self.config.max_delay_ms;
        let factor = u64::from(self.config.base.max(1))
            .checked_pow(attempt)
            .unwrap_or(u64::MAX);
        let millis = self.config.unit_ms.saturating_mul(factor).min(cap);
        Duration::from_millis(millis)
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new(BackoffConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_matches_two_pow_seconds_capped_at_minute() {
        let b = Backoff::default();
        assert_eq!(b.delay(1), Duration::from_secs(2));
        assert_eq!(b.delay(2), Duration::from_secs(4));
        assert_eq!(b.delay(5), Duration::from_secs(32));
        assert_eq!(b.delay(6), Duration::from_secs(60));
        assert_eq!(b.delay(40), Duration::from_secs(60));
    }

    #[test]
    fn delays_are_monotonic_and_capped() {
        let b = Backoff::new(BackoffConfig {
            unit_ms: 10,
            base: 3,
            max_delay_ms: 5_000,
        });
        let delays: Vec<_> = (1..=200).map(|a| b.delay(a)).collect();
        assert!(delays.windows(2).all(|w| w[0] <= w[1]), "{delays:?}");
        assert!(delays.iter().all(|d| *d <= b.max_delay()));
        assert_eq!(*delays.last().unwrap(), b.max_delay());
    }

    #[test]
    fn base_one_is_constant() {
        let b = Backoff::new(BackoffConfig {
            unit_ms: 250,
            base: 1,
            max_delay_ms: 1_000,
        });
        assert_eq!(b.delay(1), b.delay(30));
    }

    #[test]
    fn config_defaults_from_empty_yaml_object() {
        let cfg: BackoffConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(cfg, BackoffConfig::default());
    }
}
