use std::time::Duration;

use config::ConfigError;
use serde::Deserialize;
use serde::Serialize;

use crate::Error;
use crate::Result;

/// Basic retry policy template
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    /// Maximum number of attempts, first one included
    #[serde(default = "default_max_retries")]
    pub max_retries: usize,

    /// Single operation timeout (unit: milliseconds)
    #[serde(default = "default_op_timeout_ms")]
    pub timeout_ms: u64,

    /// Backoff base (unit: milliseconds)
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    /// Maximum backoff time (unit: milliseconds)
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            timeout_ms: default_op_timeout_ms(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

impl BackoffPolicy {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Delay to wait after the given failed attempt (0-based), doubling from
    /// `base_delay_ms` and capped at `max_delay_ms`.
    pub fn delay_for(
        &self,
        attempt: usize,
    ) -> Duration {
        let shift = attempt.min(32) as u32;
        let delay = self.base_delay_ms.saturating_mul(1u64 << shift);
        Duration::from_millis(delay.min(self.max_delay_ms))
    }

    pub(crate) fn validate(
        &self,
        name: &str,
    ) -> Result<()> {
        if self.max_retries == 0 {
            return Err(Error::Config(ConfigError::Message(format!(
                "retry.{name}.max_retries must be greater than 0"
            ))));
        }

        if self.timeout_ms == 0 {
            return Err(Error::Config(ConfigError::Message(format!(
                "retry.{name}.timeout_ms must be at least 1ms"
            ))));
        }

        if self.base_delay_ms > self.max_delay_ms {
            return Err(Error::Config(ConfigError::Message(format!(
                "retry.{name}.base_delay_ms ({}) exceeds max_delay_ms ({})",
                self.base_delay_ms, self.max_delay_ms
            ))));
        }

        Ok(())
    }
}

/// Divide strategies by operation
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RetryPolicies {
    /// Full listing of the source (resync)
    #[serde(default = "default_list_policy")]
    pub list: BackoffPolicy,

    /// Opening an incremental watch stream
    #[serde(default = "default_watch_policy")]
    pub watch: BackoffPolicy,

    /// Per-sink event delivery
    #[serde(default = "default_sink_policy")]
    pub sink: BackoffPolicy,
}

impl Default for RetryPolicies {
    fn default() -> Self {
        Self {
            list: default_list_policy(),
            watch: default_watch_policy(),
            sink: default_sink_policy(),
        }
    }
}

impl RetryPolicies {
    pub fn validate(&self) -> Result<()> {
        self.list.validate("list")?;
        self.watch.validate("watch")?;
        self.sink.validate("sink")?;
        Ok(())
    }
}

fn default_list_policy() -> BackoffPolicy {
    BackoffPolicy {
        max_retries: 10,
        timeout_ms: 30_000,
        base_delay_ms: 500,
        max_delay_ms: 30_000,
    }
}
fn default_watch_policy() -> BackoffPolicy {
    BackoffPolicy {
        max_retries: 5,
        timeout_ms: 10_000,
        base_delay_ms: 200,
        max_delay_ms: 10_000,
    }
}
fn default_sink_policy() -> BackoffPolicy {
    BackoffPolicy {
        max_retries: 3,
        timeout_ms: 5_000,
        base_delay_ms: 100,
        max_delay_ms: 2_000,
    }
}
fn default_max_retries() -> usize {
    3
}
fn default_op_timeout_ms() -> u64 {
    1000
}
fn default_base_delay_ms() -> u64 {
    50
}
fn default_max_delay_ms() -> u64 {
    1000
}
