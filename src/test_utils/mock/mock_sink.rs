use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::Notify;

use crate::DomainEvent;
use crate::Sink;
use crate::SinkError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkBehavior {
    /// Accepts every event
    Healthy,
    /// Rejects every attempt as unavailable
    Failing,
    /// Fails the first `n` attempts, then accepts
    FlakyFor(usize),
    /// Accepts every event after sleeping
    Slow(Duration),
}

/// Sink double that records accepted events and counts attempts.
pub struct RecordingSink {
    behavior: SinkBehavior,
    events: Mutex<Vec<DomainEvent>>,
    attempts: AtomicUsize,
    received: Notify,
}

impl RecordingSink {
    pub fn new(behavior: SinkBehavior) -> Self {
        Self {
            behavior,
            events: Mutex::new(Vec::new()),
            attempts: AtomicUsize::new(0),
            received: Notify::new(),
        }
    }

    pub fn healthy() -> Self {
        Self::new(SinkBehavior::Healthy)
    }

    pub fn failing() -> Self {
        Self::new(SinkBehavior::Failing)
    }

    /// Events accepted so far, in delivery order
    pub fn events(&self) -> Vec<DomainEvent> {
        self.events.lock().clone()
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    /// Waits until at least `n` events were accepted.
    pub async fn wait_for_events(
        &self,
        n: usize,
    ) -> Vec<DomainEvent> {
        loop {
            let notified = self.received.notified();
            {
                let events = self.events.lock();
                if events.len() >= n {
                    return events.clone();
                }
            }
            notified.await;
        }
    }
}

#[async_trait]
impl Sink for RecordingSink {
    async fn send_event(
        &self,
        event: &DomainEvent,
    ) -> Result<(), SinkError> {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst);

        match self.behavior {
            SinkBehavior::Healthy => {}
            SinkBehavior::Failing => return Err(SinkError::Unavailable("connection refused".to_string())),
            SinkBehavior::FlakyFor(n) if attempt < n => {
                return Err(SinkError::Unavailable(format!("attempt {attempt} failed")));
            }
            SinkBehavior::FlakyFor(_) => {}
            SinkBehavior::Slow(delay) => tokio::time::sleep(delay).await,
        }

        self.events.lock().push(event.clone());
        self.received.notify_waiters();
        Ok(())
    }
}
