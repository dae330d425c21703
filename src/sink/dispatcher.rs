//! Per-sink fan-out.
//!
//! Every registered sink gets its own [`DeliveryQueue`] and one worker task.
//! The worker drains its queue in FIFO order, so events for one sink are
//! delivered in the order they were produced. Workers never talk to each
//! other: a sink that is slow, down or rejecting events only delays and drops
//! its own events.

use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::error;
use tracing::info;
use tracing::warn;

use super::DeliveryQueue;
use super::PushOutcome;
use super::Sink;
use super::SinkRegistration;
use crate::utils::async_task::task_with_timeout_and_exponential_backoff;
use crate::utils::async_task::RetryError;
use crate::BackoffPolicy;
use crate::DomainEvent;
use crate::SinkError;

/// Delivery counters of one sink
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SinkStats {
    pub name: String,
    /// Events the sink accepted
    pub delivered: u64,
    /// Events dropped after the retry policy gave up
    pub failed: u64,
    /// Events lost to the queue overflow policy
    pub overflowed: u64,
    /// Events still queued when shutdown cancelled delivery
    pub abandoned: u64,
    /// Events currently waiting in the queue
    pub queued: usize,
}

#[derive(Debug, Default)]
struct SinkCounters {
    delivered: AtomicU64,
    failed: AtomicU64,
    overflowed: AtomicU64,
    abandoned: AtomicU64,
}

struct SinkLane {
    name: String,
    queue: Arc<DeliveryQueue>,
    counters: Arc<SinkCounters>,
}

impl SinkLane {
    fn stats(&self) -> SinkStats {
        SinkStats {
            name: self.name.clone(),
            delivered: self.counters.delivered.load(Ordering::Relaxed),
            failed: self.counters.failed.load(Ordering::Relaxed),
            overflowed: self.counters.overflowed.load(Ordering::Relaxed),
            abandoned: self.counters.abandoned.load(Ordering::Relaxed),
            queued: self.queue.len(),
        }
    }
}

pub struct SinkDispatcher {
    lanes: Vec<SinkLane>,
    workers: Vec<JoinHandle<()>>,

    /// Cancelled once the shutdown grace period runs out
    retry_cancel: CancellationToken,
}

impl SinkDispatcher {
    /// Spawns one worker per registration. Must be called inside a tokio runtime.
    pub fn start(registrations: Vec<SinkRegistration>) -> Self {
        let retry_cancel = CancellationToken::new();
        let (lanes, workers) = registrations
            .into_iter()
            .map(|registration| Self::spawn_lane(registration, retry_cancel.clone()))
            .unzip::<_, _, Vec<_>, Vec<_>>();

        info!(sinks = lanes.len(), "Sink dispatcher started");
        Self {
            lanes,
            workers,
            retry_cancel,
        }
    }

    fn spawn_lane(
        registration: SinkRegistration,
        retry_cancel: CancellationToken,
    ) -> (SinkLane, JoinHandle<()>) {
        let SinkRegistration { name, sink, policy } = registration;

        let queue = Arc::new(DeliveryQueue::new(policy.queue_capacity, policy.overflow));
        let counters = Arc::new(SinkCounters::default());

        let worker = SinkWorker {
            name: name.clone(),
            sink,
            retry: policy.retry,
            queue: queue.clone(),
            counters: counters.clone(),
            cancel: retry_cancel,
        };
        let worker = tokio::spawn(worker.run());

        (
            SinkLane {
                name,
                queue,
                counters,
            },
            worker,
        )
    }

    /// Offers `event` to every sink queue. Never waits on a sink.
    pub fn deliver(
        &self,
        event: DomainEvent,
    ) {
        let event = Arc::new(event);
        for lane in &self.lanes {
            match lane.queue.push(event.clone()) {
                PushOutcome::Queued => {}
                PushOutcome::Evicted(lost) | PushOutcome::Rejected(lost) => {
                    lane.counters.overflowed.fetch_add(1, Ordering::Relaxed);
                    warn!(
                        sink = %lane.name,
                        key = %lost.key,
                        generation = lost.generation,
                        "Sink queue full, event dropped"
                    );
                }
                PushOutcome::Closed(lost) => {
                    debug!(sink = %lane.name, key = %lost.key, "Sink queue closed, event ignored");
                }
            }
        }
    }

    pub fn stats(&self) -> Vec<SinkStats> {
        self.lanes.iter().map(SinkLane::stats).collect()
    }

    pub fn sink_count(&self) -> usize {
        self.lanes.len()
    }

    /// Stops accepting events and lets workers drain their queues.
    ///
    /// After `grace`, pending retries are cancelled and whatever is still
    /// queued is abandoned. Attempts already in flight finish (bounded by the
    /// per-attempt timeout) before this returns.
    pub async fn shutdown(
        self,
        grace: Duration,
    ) -> Vec<SinkStats> {
        let SinkDispatcher {
            lanes,
            workers,
            retry_cancel,
        } = self;

        for lane in &lanes {
            lane.queue.close();
        }

        let mut all_workers = Box::pin(join_all(workers));
        let results = match timeout(grace, all_workers.as_mut()).await {
            Ok(results) => results,
            Err(_) => {
                warn!(?grace, "Sink drain grace period elapsed, cancelling pending deliveries");
                retry_cancel.cancel();
                all_workers.await
            }
        };

        for result in results {
            if let Err(e) = result {
                error!("Sink worker failed: {:?}", e);
            }
        }

        let stats = lanes
            .iter()
            .map(|lane| {
                let leftover = lane.queue.drain().len() as u64;
                lane.counters.abandoned.fetch_add(leftover, Ordering::Relaxed);
                lane.stats()
            })
            .collect::<Vec<_>>();

        for s in &stats {
            info!(
                sink = %s.name,
                delivered = s.delivered,
                failed = s.failed,
                overflowed = s.overflowed,
                abandoned = s.abandoned,
                "Sink stopped"
            );
        }
        stats
    }
}

struct SinkWorker {
    name: String,
    sink: Arc<dyn Sink>,
    retry: BackoffPolicy,
    queue: Arc<DeliveryQueue>,
    counters: Arc<SinkCounters>,
    cancel: CancellationToken,
}

impl SinkWorker {
    async fn run(self) {
        debug!(sink = %self.name, "Sink worker started");

        while let Some(event) = self.queue.pop().await {
            if self.cancel.is_cancelled() {
                let leftover = 1 + self.queue.drain().len() as u64;
                self.counters.abandoned.fetch_add(leftover, Ordering::Relaxed);
                break;
            }
            self.send(&event).await;
        }

        debug!(sink = %self.name, "Sink worker completed");
    }

    async fn send(
        &self,
        event: &DomainEvent,
    ) {
        let result = task_with_timeout_and_exponential_backoff(
            || self.sink.send_event(event),
            &self.retry,
            &self.cancel,
            |_: &SinkError| true,
            SinkError::Timeout,
        )
        .await;

        match result {
            Ok(()) => {
                self.counters.delivered.fetch_add(1, Ordering::Relaxed);
                debug!(sink = %self.name, key = %event.key, generation = event.generation, "Event delivered");
            }
            Err(RetryError::Exhausted { attempts, last }) => {
                self.counters.failed.fetch_add(1, Ordering::Relaxed);
                warn!(
                    sink = %self.name,
                    key = %event.key,
                    generation = event.generation,
                    attempts,
                    reason = %last,
                    "Dropping event after delivery retries exhausted"
                );
            }
            Err(RetryError::Aborted(last)) => {
                self.counters.failed.fetch_add(1, Ordering::Relaxed);
                warn!(
                    sink = %self.name,
                    key = %event.key,
                    generation = event.generation,
                    reason = %last,
                    "Dropping event rejected by sink"
                );
            }
            Err(RetryError::Cancelled { last }) => {
                self.counters.abandoned.fetch_add(1, Ordering::Relaxed);
                warn!(
                    sink = %self.name,
                    key = %event.key,
                    generation = event.generation,
                    reason = ?last.map(|e| e.to_string()),
                    "Delivery cancelled by shutdown"
                );
            }
        }
    }
}
