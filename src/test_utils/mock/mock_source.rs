use std::collections::VecDeque;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;

use async_trait::async_trait;
use futures::StreamExt;
use parking_lot::Mutex;

use crate::Listing;
use crate::SourceClient;
use crate::SourceError;
use crate::SourceObject;
use crate::WatchEvent;
use crate::WatchStream;

/// One scripted answer to `SourceClient::watch`
pub enum ScriptedWatch {
    /// Yields the events, then the stream ends
    Closes(Vec<Result<WatchEvent, SourceError>>),
    /// Yields the events, then stays open until dropped
    Hangs(Vec<Result<WatchEvent, SourceError>>),
    /// Opening the watch fails
    Fails(SourceError),
}

/// Scripted list/watch source.
///
/// Once the list script is used up the last successful listing is served
/// again; once the watch script is used up every watch stays open silently.
#[derive(Default)]
pub struct MockSource {
    pub expected_lists: Mutex<VecDeque<Result<Listing, SourceError>>>,
    pub expected_watches: Mutex<VecDeque<ScriptedWatch>>,
    last_listing: Mutex<Option<Listing>>,
    list_calls: AtomicUsize,
    watch_calls: AtomicUsize,
    watch_checkpoints: Mutex<Vec<String>>,
}

impl MockSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_list(
        self,
        response: Result<Listing, SourceError>,
    ) -> Self {
        self.expected_lists.lock().push_back(response);
        self
    }

    pub fn with_watch(
        self,
        response: ScriptedWatch,
    ) -> Self {
        self.expected_watches.lock().push_back(response);
        self
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    pub fn watch_calls(&self) -> usize {
        self.watch_calls.load(Ordering::SeqCst)
    }

    pub fn watch_checkpoints(&self) -> Vec<String> {
        self.watch_checkpoints.lock().clone()
    }
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

#[async_trait]
impl SourceClient for MockSource {
    async fn list(&self) -> Result<Listing, SourceError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        let scripted = self.expected_lists.lock().pop_front();
        match scripted {
            Some(Ok(listing)) => {
                *self.last_listing.lock() = Some(listing.clone());
                Ok(listing)
            }
            Some(Err(e)) => Err(e),
            None => Ok(self.last_listing.lock().clone().unwrap_or_default()),
        }
    }

    async fn watch(
        &self,
        checkpoint: &str,
    ) -> Result<WatchStream, SourceError> {
        self.watch_calls.fetch_add(1, Ordering::SeqCst);
        self.watch_checkpoints.lock().push(checkpoint.to_string());
        let scripted = self.expected_watches.lock().pop_front();
        match scripted {
            Some(ScriptedWatch::Closes(events)) => Ok(futures::stream::iter(events).boxed()),
            Some(ScriptedWatch::Hangs(events)) => {
                Ok(futures::stream::iter(events).chain(futures::stream::pending()).boxed())
            }
            Some(ScriptedWatch::Fails(e)) => Err(e),
            None => Ok(futures::stream::pending().boxed()),
        }
    }
}
