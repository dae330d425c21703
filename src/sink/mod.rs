//! Sink contract and the dispatcher that fans events out to every registered
//! sink.
//!
//! ```text
//!                 deliver() [non-blocking]
//! watch loop ───────────┬──────────────┬──────────────┐
//!                       ▼              ▼              ▼
//!                ┌────────────┐ ┌────────────┐ ┌────────────┐
//!                │ queue (cap)│ │ queue (cap)│ │ queue (cap)│  drop_oldest | drop_newest
//!                └─────┬──────┘ └─────┬──────┘ └─────┬──────┘
//!                      ▼              ▼              ▼
//!                   worker         worker         worker       timeout + backoff per attempt
//!                      ▼              ▼              ▼
//!                    Sink A         Sink B         Sink C
//! ```
//!
//! A slow or failing sink only ever fills its own queue.
mod delivery_queue;
mod dispatcher;
mod log_sink;
pub use delivery_queue::*;
pub use dispatcher::*;
pub use log_sink::*;


use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;

use crate::BackoffPolicy;
use crate::DomainEvent;
use crate::OverflowPolicy;
use crate::RelayConfig;
use crate::SinkError;

/// Delivery target for domain events.
///
/// Calls are at-least-once: the dispatcher redelivers on retry, so
/// implementations should be idempotent on `(key, generation)`.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait Sink: Send + Sync + 'static {
    async fn send_event(
        &self,
        event: &DomainEvent,
    ) -> Result<(), SinkError>;
}

/// Per-sink delivery parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeliveryPolicy {
    pub retry: BackoffPolicy,
    pub queue_capacity: usize,
    pub overflow: OverflowPolicy,
}

impl DeliveryPolicy {
    pub fn from_config(config: &RelayConfig) -> Self {
        Self {
            retry: config.retry.sink,
            queue_capacity: config.dispatch.queue_capacity,
            overflow: config.dispatch.overflow,
        }
    }
}

impl Default for DeliveryPolicy {
    fn default() -> Self {
        Self::from_config(&RelayConfig::default())
    }
}

/// A named sink plus its delivery policy. Fixed for the lifetime of an engine.
#[derive(Clone)]
pub struct SinkRegistration {
    pub name: String,
    pub sink: Arc<dyn Sink>,
    pub policy: DeliveryPolicy,
}

impl SinkRegistration {
    pub fn new(
        name: impl Into<String>,
        sink: Arc<dyn Sink>,
        policy: DeliveryPolicy,
    ) -> Self {
        Self {
            name: name.into(),
            sink,
            policy,
        }
    }
}

impl fmt::Debug for SinkRegistration {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct("SinkRegistration")
            .field("name", &self.name)
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}
