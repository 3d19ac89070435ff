//! Configuration types.

use std::time::Duration;

use secrecy::SecretString;

use crate::error::ConfigError;

/// Worker pool and runner configuration.
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    /// Workers kept alive for the lifetime of the pool.
    pub min_workers: usize,
    /// Upper bound on concurrently running tasks.
    pub max_workers: usize,
    /// How long an overflow worker waits for work before retiring.
    pub worker_keep_alive: Duration,
    /// Progress lines retained per task for completion-time summaries.
    pub progress_buffer_capacity: usize,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            min_workers: 10,
            max_workers: 15,
            worker_keep_alive: Duration::from_secs(60),
            progress_buffer_capacity: 100,
        }
    }
}

impl RunnerConfig {
    /// Build config from environment variables, falling back to defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let config = Self {
            min_workers: env_parse("TASK_WORKER_MIN_WORKERS", defaults.min_workers)?,
            max_workers: env_parse("TASK_WORKER_MAX_WORKERS", defaults.max_workers)?,
            worker_keep_alive: Duration::from_secs(env_parse(
                "TASK_WORKER_KEEP_ALIVE_SECS",
                defaults.worker_keep_alive.as_secs(),
            )?),
            progress_buffer_capacity: env_parse(
                "TASK_WORKER_PROGRESS_BUFFER",
                defaults.progress_buffer_capacity,
            )?,
        };
        config.validate()?;
        Ok(config)
    }

    /// Check worker bounds.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.min_workers == 0 {
            return Err(ConfigError::InvalidValue {
                key: "min_workers".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        if self.max_workers < self.min_workers {
            return Err(ConfigError::InvalidValue {
                key: "max_workers".to_string(),
                message: format!(
                    "{} is below min_workers ({})",
                    self.max_workers, self.min_workers
                ),
            });
        }
        Ok(())
    }
}

/// Destinations used when the worker talks to a remote submitter.
///
/// Per-task destinations are the prefix followed by the task id.
#[derive(Debug, Clone)]
pub struct QueueConfig {
    pub enabled: bool,
    pub submission_queue: String,
    pub control_queue: String,
    pub lifecycle_queue_prefix: String,
    pub progress_queue_prefix: String,
    pub result_queue_prefix: String,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            submission_queue: "tasks.submission".to_string(),
            control_queue: "tasks.control".to_string(),
            lifecycle_queue_prefix: "tasks.lifecycle.".to_string(),
            progress_queue_prefix: "tasks.progress.".to_string(),
            result_queue_prefix: "tasks.result.".to_string(),
        }
    }
}

impl QueueConfig {
    /// Build config from environment variables, falling back to defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        Ok(Self {
            enabled: env_parse("TASK_WORKER_REMOTE_ENABLED", defaults.enabled)?,
            submission_queue: env_or("TASK_WORKER_SUBMISSION_QUEUE", defaults.submission_queue),
            control_queue: env_or("TASK_WORKER_CONTROL_QUEUE", defaults.control_queue),
            lifecycle_queue_prefix: env_or(
                "TASK_WORKER_LIFECYCLE_PREFIX",
                defaults.lifecycle_queue_prefix,
            ),
            progress_queue_prefix: env_or(
                "TASK_WORKER_PROGRESS_PREFIX",
                defaults.progress_queue_prefix,
            ),
            result_queue_prefix: env_or("TASK_WORKER_RESULT_PREFIX", defaults.result_queue_prefix),
        })
    }

    pub fn lifecycle_queue(&self, task_id: &str) -> String {
        format!("{}{}", self.lifecycle_queue_prefix, task_id)
    }

    pub fn progress_queue(&self, task_id: &str) -> String {
        format!("{}{}", self.progress_queue_prefix, task_id)
    }

    pub fn result_queue(&self, task_id: &str) -> String {
        format!("{}{}", self.result_queue_prefix, task_id)
    }
}

/// SMTP settings for completion notifications.
#[derive(Debug, Clone)]
pub struct EmailConfig {
    pub smtp_host: String,
    pub smtp_port: u16,
    pub username: String,
    pub password: SecretString,
    pub from_address: String,
}

impl EmailConfig {
    /// Build config from environment variables.
    /// Returns `None` if `TASK_WORKER_SMTP_HOST` is not set (email disabled).
    pub fn from_env() -> Option<Self> {
        let smtp_host = std::env::var("TASK_WORKER_SMTP_HOST").ok()?;

        let smtp_port: u16 = std::env::var("TASK_WORKER_SMTP_PORT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(587);

        let username = std::env::var("TASK_WORKER_SMTP_USERNAME").unwrap_or_default();
        let password = std::env::var("TASK_WORKER_SMTP_PASSWORD").unwrap_or_default();
        let from_address =
            std::env::var("TASK_WORKER_MAIL_FROM").unwrap_or_else(|_| username.clone());

        Some(Self {
            smtp_host,
            smtp_port,
            username,
            password: SecretString::from(password),
            from_address,
        })
    }
}

fn env_or(key: &str, default: String) -> String {
    std::env::var(key).unwrap_or(default)
}

fn env_parse<T>(key: &str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        }),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn runner_defaults() {
        let config = RunnerConfig::default();
        assert_eq!(config.min_workers, 10);
        assert_eq!(config.max_workers, 15);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn rejects_max_below_min() {
        let config = RunnerConfig {
            min_workers: 4,
            max_workers: 2,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { ref key, .. }) if key == "max_workers"
        ));
    }

    #[test]
    fn rejects_zero_workers() {
        let config = RunnerConfig {
            min_workers: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn per_task_destinations() {
        let queues = QueueConfig::default();
        assert_eq!(queues.lifecycle_queue("t1"), "tasks.lifecycle.t1");
        assert_eq!(queues.progress_queue("t1"), "tasks.progress.t1");
        assert_eq!(queues.result_queue("t1"), "tasks.result.t1");
    }
}
