use std::time::Duration;

use drawq_queue::config::{parse_minutes_or, parse_or, ConfigError};
use drawq_queue::QueueConfig;
use validator::{Validate, ValidationError};

const DEFAULT_STORE_TIMEOUT_MINUTES: u64 = 30 * 24 * 60;
const DEFAULT_SWEEP_SECS: u64 = 60;
const DEFAULT_NOTIFY_POOL_SIZE: usize = 10;

/// Upper bound on the store idle window (ten years).
const MAX_STORE_TIMEOUT: Duration = Duration::from_secs(10 * 365 * 24 * 3600);

/// Worker process configuration loaded from environment variables.
#[derive(Debug, Clone, Validate)]
pub struct WorkerConfig {
    #[validate(nested)]
    pub queue: QueueConfig,
    /// Idle window after which a stored task is forgotten.
    #[validate(custom(function = "validate_store_timeout"))]
    pub store_timeout: Duration,
    /// How often expired store entries are evicted.
    pub sweep_interval: Duration,
    /// Concurrent webhook deliveries.
    pub notify_pool_size: usize,
}

impl WorkerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                      | Default           |
    /// |------------------------------|-------------------|
    /// | `TASK_STORE_TIMEOUT_MINUTES` | `43200` (30 days) |
    /// | `TASK_STORE_SWEEP_SECS`      | `60`              |
    /// | `NOTIFY_POOL_SIZE`           | `10`              |
    ///
    /// Queue variables are documented on [`QueueConfig::from_env`].
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let queue = QueueConfig::from_lookup(&lookup)?;
        let store_timeout = parse_minutes_or(
            &lookup,
            "TASK_STORE_TIMEOUT_MINUTES",
            DEFAULT_STORE_TIMEOUT_MINUTES,
        )?;
        let sweep_secs: u64 = parse_or(&lookup, "TASK_STORE_SWEEP_SECS", DEFAULT_SWEEP_SECS)?;
        let notify_pool_size = parse_or(&lookup, "NOTIFY_POOL_SIZE", DEFAULT_NOTIFY_POOL_SIZE)?;

        let config = Self {
            queue,
            store_timeout,
            sweep_interval: Duration::from_secs(sweep_secs.max(1)),
            notify_pool_size: notify_pool_size.max(1),
        };
        config.validate()?;
        Ok(config)
    }
}

fn validate_store_timeout(timeout: &Duration) -> Result<(), ValidationError> {
    if timeout.is_zero() {
        return Err(ValidationError::new("store_timeout_zero"));
    }
    if *timeout > MAX_STORE_TIMEOUT {
        return Err(ValidationError::new("store_timeout_too_long"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn defaults_when_unset() {
        let config = WorkerConfig::from_lookup(|_| None).unwrap();
        assert_eq!(config.store_timeout, Duration::from_secs(30 * 24 * 3600));
        assert_eq!(config.sweep_interval, Duration::from_secs(60));
        assert_eq!(config.notify_pool_size, 10);
        assert_eq!(config.queue.core_size, 3);
    }

    #[test]
    fn reads_store_and_queue_variables() {
        let config = WorkerConfig::from_lookup(|key: &str| match key {
            "TASK_STORE_TIMEOUT_MINUTES" => Some("10".into()),
            "TASK_QUEUE_CORE_SIZE" => Some("5".into()),
            "NOTIFY_POOL_SIZE" => Some("0".into()),
            _ => None,
        })
        .unwrap();
        assert_eq!(config.store_timeout, Duration::from_secs(600));
        assert_eq!(config.queue.core_size, 5);
        assert_eq!(config.notify_pool_size, 1);
    }

    #[test]
    fn huge_store_timeout_is_rejected() {
        let err = WorkerConfig::from_lookup(|key: &str| {
            (key == "TASK_STORE_TIMEOUT_MINUTES").then(|| u64::MAX.to_string())
        })
        .unwrap_err();
        assert_matches!(
            err,
            ConfigError::Invalid {
                key: "TASK_STORE_TIMEOUT_MINUTES",
                ..
            }
        );

        let err = WorkerConfig::from_lookup(|key: &str| {
            (key == "TASK_STORE_TIMEOUT_MINUTES").then(|| "100000000".to_string())
        })
        .unwrap_err();
        assert_matches!(err, ConfigError::Validation(_));
    }

    #[test]
    fn malformed_sweep_interval_is_reported() {
        let err = WorkerConfig::from_lookup(|key: &str| {
            (key == "TASK_STORE_SWEEP_SECS").then(|| "soon".to_string())
        })
        .unwrap_err();
        assert_matches!(
            err,
            ConfigError::Invalid {
                key: "TASK_STORE_SWEEP_SECS",
                ..
            }
        );
    }
}
