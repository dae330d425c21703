use std::time::Duration;

use config::ConfigError;
use serde::Deserialize;
use serde::Serialize;

use crate::Error;
use crate::Result;

/// Which event a full sink queue gives up
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum OverflowPolicy {
    /// Evict the oldest queued event to make room for the new one
    #[default]
    DropOldest,
    /// Reject the incoming event, keep what is queued
    DropNewest,
}

/// Sink queueing and shutdown parameters
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct DispatchConfig {
    /// Capacity of each per-sink queue
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// Policy applied when a per-sink queue is full
    #[serde(default)]
    pub overflow: OverflowPolicy,

    /// How long pending deliveries may keep running after a stop request
    /// (unit: milliseconds)
    #[serde(default = "default_shutdown_grace_ms")]
    pub shutdown_grace_ms: u64,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            queue_capacity: default_queue_capacity(),
            overflow: OverflowPolicy::default(),
            shutdown_grace_ms: default_shutdown_grace_ms(),
        }
    }
}

impl DispatchConfig {
    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_ms)
    }

    pub fn validate(&self) -> Result<()> {
        if self.queue_capacity == 0 {
            return Err(Error::Config(ConfigError::Message(
                "dispatch.queue_capacity must be greater than 0".into(),
            )));
        }

        Ok(())
    }
}

fn default_queue_capacity() -> usize {
    1024
}
fn default_shutdown_grace_ms() -> u64 {
    5_000
}
