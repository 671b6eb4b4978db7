use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::InvalidConfig;

/// Sizing and maintenance options for a [`ResourcePool`](crate::ResourcePool).
///
/// Durations are stored as milliseconds so the structure reads naturally from
/// TOML; use the accessor methods to get [`Duration`]s.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Cap on objects in existence (idle plus borrowed).
    pub max_total: usize,
    /// Cap on idle objects; extra returns are destroyed.
    pub max_idle: usize,
    /// Floor the evictor keeps warm.
    pub min_idle: usize,
    /// Validate an idle object before handing it out.
    pub test_on_borrow: bool,
    /// Validate an object when it is returned.
    pub test_on_return: bool,
    /// Validate idle objects during eviction runs.
    pub test_while_idle: bool,
    /// Sweep interval; `None` disables the evictor thread.
    pub time_between_eviction_runs_ms: Option<u64>,
    /// Minimum idle time before an object is eligible for eviction.
    pub min_evictable_idle_time_ms: u64,
    /// How long `borrow` waits when the pool is at capacity.
    pub max_wait_ms: u64,
    /// Hand out the most recently returned object first.
    pub lifo: bool,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_total: 8,
            max_idle: 8,
            min_idle: 0,
            test_on_borrow: true,
            test_on_return: false,
            test_while_idle: false,
            time_between_eviction_runs_ms: None,
            min_evictable_idle_time_ms: 30 * 60 * 1000,
            max_wait_ms: 3_000,
            lifo: true,
        }
    }
}

impl PoolConfig {
    pub fn max_wait(&self) -> Duration {
        Duration::from_millis(self.max_wait_ms)
    }

    pub fn time_between_eviction_runs(&self) -> Option<Duration> {
        self.time_between_eviction_runs_ms
            .filter(|ms| *ms > 0)
            .map(Duration::from_millis)
    }

    pub fn min_evictable_idle_time(&self) -> Duration {
        Duration::from_millis(self.min_evictable_idle_time_ms)
    }

    pub fn validate(&self) -> Result<(), InvalidConfig> {
        if self.max_total == 0 {
            return Err(InvalidConfig("max_total must be at least 1"));
        }
        if self.min_idle > self.max_idle {
            return Err(InvalidConfig("min_idle must not exceed max_idle"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = PoolConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.max_wait(), Duration::from_secs(3));
        assert_eq!(config.time_between_eviction_runs(), None);
    }

    #[test]
    fn rejects_zero_max_total() {
        let config = PoolConfig {
            max_total: 0,
            ..PoolConfig::default()
        };
        assert_eq!(
            config.validate(),
            Err(InvalidConfig("max_total must be at least 1"))
        );
    }

    #[test]
    fn rejects_min_idle_above_max_idle() {
        let config = PoolConfig {
            min_idle: 4,
            max_idle: 2,
            ..PoolConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_interval_disables_evictor() {
        let config = PoolConfig {
            time_between_eviction_runs_ms: Some(0),
            ..PoolConfig::default()
        };
        assert_eq!(config.time_between_eviction_runs(), None);
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config: PoolConfig = toml::from_str(
            r#"
            max_total = 2
            time_between_eviction_runs_ms = 500
            "#,
        )
        .unwrap();
        assert_eq!(config.max_total, 2);
        assert_eq!(config.max_idle, 8);
        assert_eq!(
            config.time_between_eviction_runs(),
            Some(Duration::from_millis(500))
        );
    }
}
