use std::str::FromStr;
use std::time::Duration;

use validator::{Validate, ValidationError};

/// Default number of worker slots.
pub const DEFAULT_CORE_SIZE: usize = 3;

/// Default number of tasks that may wait for a slot.
pub const DEFAULT_QUEUE_SIZE: usize = 10;

/// Default bound on a single wait for the next backend status.
pub const DEFAULT_TASK_TIMEOUT_MINUTES: u64 = 5;

/// Upper bound on a single wait for the next backend status.
pub const MAX_TASK_TIMEOUT: Duration = Duration::from_secs(7 * 24 * 3600);

/// Errors raised while reading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{key} must be a valid {expected}, got {value:?}")]
    Invalid {
        key: &'static str,
        value: String,
        expected: &'static str,
    },

    #[error("Invalid configuration: {0}")]
    Validation(#[from] validator::ValidationErrors),
}

/// Task queue sizing and timeouts.
///
/// Capacity is `core_size + queue_size`: up to `core_size` tasks run at
/// once and up to `queue_size` more wait for a slot.
#[derive(Debug, Clone, Validate)]
pub struct QueueConfig {
    #[validate(range(min = 1))]
    pub core_size: usize,
    pub queue_size: usize,
    /// Bound on one wait for the next backend status report.
    #[validate(custom(function = "validate_timeout"))]
    pub task_timeout: Duration,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            core_size: DEFAULT_CORE_SIZE,
            queue_size: DEFAULT_QUEUE_SIZE,
            task_timeout: Duration::from_secs(DEFAULT_TASK_TIMEOUT_MINUTES * 60),
        }
    }
}

impl QueueConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                | Default |
    /// |------------------------|---------|
    /// | `TASK_QUEUE_CORE_SIZE` | `3`     |
    /// | `TASK_QUEUE_SIZE`      | `10`    |
    /// | `TASK_TIMEOUT_MINUTES` | `5`     |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) with a custom variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let core_size = parse_or(&lookup, "TASK_QUEUE_CORE_SIZE", DEFAULT_CORE_SIZE)?;
        let queue_size = parse_or(&lookup, "TASK_QUEUE_SIZE", DEFAULT_QUEUE_SIZE)?;
        let task_timeout =
            parse_minutes_or(&lookup, "TASK_TIMEOUT_MINUTES", DEFAULT_TASK_TIMEOUT_MINUTES)?;

        let config = Self {
            core_size,
            queue_size,
            task_timeout,
        };
        config.validate()?;
        Ok(config)
    }

    /// Total number of tasks that can be admitted at once.
    pub fn capacity(&self) -> usize {
        self.core_size + self.queue_size
    }
}

/// Parse `key` from `lookup`, falling back to `default` when unset or blank.
pub fn parse_or<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match lookup(key) {
        Some(raw) if !raw.trim().is_empty() => {
            raw.trim().parse().map_err(|_| ConfigError::Invalid {
                key,
                value: raw,
                expected: std::any::type_name::<T>(),
            })
        }
        _ => Ok(default),
    }
}

/// Parse a whole number of minutes from `key` into a [`Duration`].
pub fn parse_minutes_or(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default_minutes: u64,
) -> Result<Duration, ConfigError> {
    let minutes: u64 = parse_or(lookup, key, default_minutes)?;
    minutes
        .checked_mul(60)
        .map(Duration::from_secs)
        .ok_or_else(|| ConfigError::Invalid {
            key,
            value: minutes.to_string(),
            expected: "number of minutes",
        })
}

fn validate_timeout(timeout: &Duration) -> Result<(), ValidationError> {
    if timeout.is_zero() {
        return Err(ValidationError::new("task_timeout_zero"));
    }
    if *timeout > MAX_TASK_TIMEOUT {
        return Err(ValidationError::new("task_timeout_too_long"));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
