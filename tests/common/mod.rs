use std::collections::VecDeque;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use parking_lot::Mutex;
use release_relay::BackoffPolicy;
use release_relay::DomainEvent;
use release_relay::Listing;
use release_relay::RelayConfig;
use release_relay::Sink;
use release_relay::SinkError;
use release_relay::SourceClient;
use release_relay::SourceError;
use release_relay::SourceObject;
use release_relay::WatchEvent;
use release_relay::WatchStream;
use serde_json::json;
use tokio::sync::Notify;

static LOGGER_INIT: once_cell::sync::Lazy<()> = once_cell::sync::Lazy::new(|| {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
});

pub fn enable_logger() {
    *LOGGER_INIT;
}

pub const NAMESPACE: &str = "jx";

pub fn release(
    name: &str,
    resource_version: u64,
) -> SourceObject {
    SourceObject::from_json(json!({
        "apiVersion": "jenkins.io/v1",
        "kind": "Release",
        "metadata": {
            "name": name,
            "namespace": NAMESPACE,
            "resourceVersion": resource_version.to_string(),
        },
        "spec": {
            "name": name,
            "version": format!("0.{resource_version}.0"),
            "gitOwner": "acme",
            "commits": [{ "sha": format!("{resource_version:040}") }],
        },
    }))
    .expect("release fixture")
}

pub fn listing(
    objects: Vec<SourceObject>,
    checkpoint: u64,
) -> Listing {
    Listing {
        objects,
        checkpoint: checkpoint.to_string(),
    }
}

/// Relay configuration with short retry and drain bounds
pub fn fast_config() -> RelayConfig {
    let fast = BackoffPolicy {
        max_retries: 3,
        timeout_ms: 500,
        base_delay_ms: 10,
        max_delay_ms: 50,
    };
    let mut config = RelayConfig::default();
    config.retry.list = fast;
    config.retry.watch = fast;
    config.retry.sink = fast;
    config.dispatch.shutdown_grace_ms = 2_000;
    config
}

/// In-memory list/watch source.
///
/// Each scripted watch yields its events and then ends, which makes the engine
/// resync. Past the script, listings repeat the last one and watches stay open.
#[derive(Default)]
pub struct ScriptedSource {
    lists: Mutex<VecDeque<Listing>>,
    watches: Mutex<VecDeque<Vec<WatchEvent>>>,
    last_listing: Mutex<Listing>,
    list_calls: AtomicUsize,
}

impl ScriptedSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn list(
        self,
        listing: Listing,
    ) -> Self {
        self.lists.lock().push_back(listing);
        self
    }

    pub fn watch(
        self,
        events: Vec<WatchEvent>,
    ) -> Self {
        self.watches.lock().push_back(events);
        self
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SourceClient for ScriptedSource {
    async fn list(&self) -> Result<Listing, SourceError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        let next = self.lists.lock().pop_front();
        let mut last = self.last_listing.lock();
        if let Some(listing) = next {
            *last = listing;
        }
        Ok(last.clone())
    }

    async fn watch(
        &self,
        _checkpoint: &str,
    ) -> Result<WatchStream, SourceError> {
        match self.watches.lock().pop_front() {
            Some(events) => Ok(futures::stream::iter(events.into_iter().map(Ok)).boxed()),
            None => Ok(futures::stream::pending().boxed()),
        }
    }
}

/// Sink that records accepted events, or refuses every attempt.
pub struct CollectingSink {
    fail: bool,
    latency: Duration,
    events: Mutex<Vec<DomainEvent>>,
    attempts: AtomicUsize,
    received: Notify,
}

impl CollectingSink {
    pub fn healthy() -> Self {
        Self::build(false, Duration::ZERO)
    }

    pub fn failing() -> Self {
        Self::build(true, Duration::ZERO)
    }

    pub fn slow(latency: Duration) -> Self {
        Self::build(false, latency)
    }

    fn build(
        fail: bool,
        latency: Duration,
    ) -> Self {
        Self {
            fail,
            latency,
            events: Mutex::new(Vec::new()),
            attempts: AtomicUsize::new(0),
            received: Notify::new(),
        }
    }

    pub fn events(&self) -> Vec<DomainEvent> {
        self.events.lock().clone()
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    pub async fn wait_for_events(
        &self,
        n: usize,
    ) {
        loop {
            let notified = self.received.notified();
            if self.events.lock().len() >= n {
                return;
            }
            notified.await;
        }
    }
}

#[async_trait]
impl Sink for CollectingSink {
    async fn send_event(
        &self,
        event: &DomainEvent,
    ) -> Result<(), SinkError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        if self.fail {
            return Err(SinkError::Unavailable("backend down".into()));
        }
        self.events.lock().push(event.clone());
        self.received.notify_waiters();
        Ok(())
    }
}
