use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::Notify;

use crate::DomainEvent;
use crate::OverflowPolicy;

/// Result of offering an event to a [`DeliveryQueue`]
#[derive(Debug, PartialEq)]
pub enum PushOutcome {
    Queued,
    /// Queue was full; the returned (oldest) event was evicted
    Evicted(Arc<DomainEvent>),
    /// Queue was full; the offered event was rejected
    Rejected(Arc<DomainEvent>),
    /// Queue no longer accepts events
    Closed(Arc<DomainEvent>),
}

#[derive(Debug, Default)]
struct QueueState {
    items: VecDeque<Arc<DomainEvent>>,
    closed: bool,
}

/// Bounded single-consumer FIFO feeding one sink worker.
///
/// `push` never waits; when full, the overflow policy decides which event is lost.
#[derive(Debug)]
pub struct DeliveryQueue {
    state: Mutex<QueueState>,
    notify: Notify,
    capacity: usize,
    overflow: OverflowPolicy,
}

impl DeliveryQueue {
    pub fn new(
        capacity: usize,
        overflow: OverflowPolicy,
    ) -> Self {
        Self {
            state: Mutex::new(QueueState::default()),
            notify: Notify::new(),
            capacity: capacity.max(1),
            overflow,
        }
    }

    pub fn push(
        &self,
        event: Arc<DomainEvent>,
    ) -> PushOutcome {
        let outcome = {
            let mut state = self.state.lock();
            if state.closed {
                return PushOutcome::Closed(event);
            }

            if state.items.len() < self.capacity {
                state.items.push_back(event);
                PushOutcome::Queued
            } else {
                match self.overflow {
                    OverflowPolicy::DropNewest => return PushOutcome::Rejected(event),
                    OverflowPolicy::DropOldest => {
                        let evicted = state.items.pop_front();
                        state.items.push_back(event);
                        match evicted {
                            Some(evicted) => PushOutcome::Evicted(evicted),
                            None => PushOutcome::Queued,
                        }
                    }
                }
            }
        };

        self.notify.notify_one();
        outcome
    }

    /// Waits for the next event. Returns `None` once the queue is closed and drained.
    pub async fn pop(&self) -> Option<Arc<DomainEvent>> {
        loop {
            let notified = self.notify.notified();
            {
                let mut state = self.state.lock();
                if let Some(event) = state.items.pop_front() {
                    return Some(event);
                }
                if state.closed {
                    return None;
                }
            }
            notified.await;
        }
    }

    /// Stops accepting events; queued ones can still be popped.
    pub fn close(&self) {
        self.state.lock().closed = true;
        self.notify.notify_one();
    }

    /// Removes and returns everything still queued.
    pub fn drain(&self) -> Vec<Arc<DomainEvent>> {
        self.state.lock().items.drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.state.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
