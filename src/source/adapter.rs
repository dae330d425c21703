use std::collections::BTreeSet;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use tokio::time::sleep_until;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::error;
use tracing::info;
use tracing::warn;

use super::ChangeNotification;
use super::Listing;
use super::SourceClient;
use super::WatchEvent;
use super::WatchStream;
use crate::utils::async_task::task_with_timeout_and_exponential_backoff;
use crate::utils::async_task::RetryError;
use crate::BackoffPolicy;
use crate::ObjectKey;
use crate::Result;
use crate::SourceError;

/// Why the current watch session ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestartReason {
    StreamClosed,
    StreamError,
    Expired,
    MaxDurationReached,
    WatchUnavailable,
}

/// Turns a [`SourceClient`] into an endless sequence of [`ChangeNotification`]s.
///
/// The first call to [`next`](Self::next) lists the source and replays every
/// object as `Added`, then follows the incremental watch. Whenever the watch
/// ends the adapter relists and rewatches; objects that vanished meanwhile are
/// reported as `Deleted`, unchanged ones are replayed as duplicate `Added`.
pub struct ChangeSourceAdapter<C>
where C: SourceClient
{
    client: Arc<C>,
    list_policy: BackoffPolicy,
    watch_policy: BackoffPolicy,
    max_watch_duration: Duration,
    cancel: CancellationToken,

    /// Notifications ready to be handed out
    pending: VecDeque<ChangeNotification>,
    /// Keys emitted and not deleted since, used to detect vanished objects on relist
    known: BTreeSet<ObjectKey>,
    /// Resume point of the next watch, `None` forces a relist
    checkpoint: Option<String>,
    stream: Option<WatchStream>,
    watch_deadline: Option<Instant>,
    relists: u64,
}

impl<C> ChangeSourceAdapter<C>
where C: SourceClient
{
    pub fn new(
        client: Arc<C>,
        list_policy: BackoffPolicy,
        watch_policy: BackoffPolicy,
        max_watch_duration: Duration,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            client,
            list_policy,
            watch_policy,
            max_watch_duration,
            cancel,
            pending: VecDeque::new(),
            known: BTreeSet::new(),
            checkpoint: None,
            stream: None,
            watch_deadline: None,
            relists: 0,
        }
    }

    /// Number of full listings performed so far
    pub fn relist_count(&self) -> u64 {
        self.relists
    }

    /// Returns the next notification.
    ///
    /// `Ok(None)` means the subscription was cancelled. An error is fatal:
    /// listing is impossible and the mirror can no longer be trusted.
    pub async fn next(&mut self) -> Result<Option<ChangeNotification>> {
        loop {
            if self.cancel.is_cancelled() {
                self.close();
                return Ok(None);
            }

            if let Some(notification) = self.pending.pop_front() {
                return Ok(Some(notification));
            }

            if self.checkpoint.is_none() {
                match self.relist().await {
                    Ok(()) => continue,
                    Err(SourceError::Cancelled) => {
                        self.close();
                        return Ok(None);
                    }
                    Err(e) => {
                        error!("source listing failed permanently: {}", e);
                        return Err(e.into());
                    }
                }
            }

            if self.stream.is_none() {
                match self.open_watch().await {
                    Ok(()) => {}
                    Err(SourceError::Cancelled) => {
                        self.close();
                        return Ok(None);
                    }
                    Err(e @ SourceError::Unauthorized { .. }) => {
                        error!("source rejected watch: {}", e);
                        return Err(e.into());
                    }
                    Err(e) if e.is_expired() => {
                        info!("watch checkpoint expired: {}", e);
                        self.restart(RestartReason::Expired);
                    }
                    Err(e) => {
                        warn!("cannot open watch: {}", e);
                        self.restart(RestartReason::WatchUnavailable);
                    }
                }
                continue;
            }

            self.poll_watch().await?;
        }
    }

    /// Lists once and hands out the resulting notifications without watching.
    ///
    /// `Ok(None)` means the listing was cancelled.
    pub async fn list_once(&mut self) -> Result<Option<Vec<ChangeNotification>>> {
        match self.relist().await {
            Ok(()) => Ok(Some(self.pending.drain(..).collect())),
            Err(SourceError::Cancelled) => Ok(None),
            Err(e) => {
                error!("source listing failed permanently: {}", e);
                Err(e.into())
            }
        }
    }

    /// Performs a full listing (with backoff) and queues the resulting notifications.
    pub async fn relist(&mut self) -> std::result::Result<(), SourceError> {
        let client = self.client.clone();
        let retry = task_with_timeout_and_exponential_backoff(
            || client.list(),
            &self.list_policy,
            &self.cancel,
            SourceError::is_retryable,
            SourceError::Timeout,
        );

        let listing = tokio::select! {
            _ = self.cancel.cancelled() => return Err(SourceError::Cancelled),
            r = retry => r.map_err(|e| flatten("list", e))?,
        };

        self.apply_listing(listing);
        Ok(())
    }

    fn apply_listing(
        &mut self,
        listing: Listing,
    ) {
        let Listing {
            mut objects,
            checkpoint,
        } = listing;
        objects.sort_by(|a, b| a.key.cmp(&b.key));

        let listed: BTreeSet<ObjectKey> = objects.iter().map(|o| o.key.clone()).collect();
        let vanished: Vec<ObjectKey> = self.known.difference(&listed).cloned().collect();

        self.relists += 1;
        info!(
            objects = objects.len(),
            vanished = vanished.len(),
            checkpoint = %checkpoint,
            relists = self.relists,
            "source listed"
        );

        for key in vanished {
            self.pending.push_back(ChangeNotification::Deleted(key));
        }
        for obj in objects {
            self.pending.push_back(ChangeNotification::Added(obj));
        }

        self.known = listed;
        self.checkpoint = Some(checkpoint);
    }

    async fn open_watch(&mut self) -> std::result::Result<(), SourceError> {
        let checkpoint = self.checkpoint.clone().unwrap_or_default();
        let client = self.client.clone();
        let retry = task_with_timeout_and_exponential_backoff(
            || client.watch(&checkpoint),
            &self.watch_policy,
            &self.cancel,
            SourceError::is_retryable,
            SourceError::Timeout,
        );

        let stream = tokio::select! {
            _ = self.cancel.cancelled() => return Err(SourceError::Cancelled),
            r = retry => r.map_err(|e| flatten("watch", e))?,
        };

        debug!(checkpoint = %checkpoint, "watch opened");
        self.stream = Some(stream);
        self.watch_deadline = Some(Instant::now() + self.max_watch_duration);
        Ok(())
    }

    async fn poll_watch(&mut self) -> Result<()> {
        let deadline = self
            .watch_deadline
            .unwrap_or_else(|| Instant::now() + self.max_watch_duration);
        let Some(stream) = self.stream.as_mut() else {
            return Ok(());
        };

        tokio::select! {
            biased;
            // P0: shutdown requested
            _ = self.cancel.cancelled() => {
                self.close();
            }

            // Bound long-lived sessions to force a periodic relist
            _ = sleep_until(deadline) => {
                info!("max watch duration reached");
                self.restart(RestartReason::MaxDurationReached);
            }

            item = stream.next() => match item {
                None => self.restart(RestartReason::StreamClosed),
                Some(Ok(event)) => self.on_watch_event(event),
                Some(Err(e @ SourceError::Unauthorized { .. })) => {
                    error!("watch stream failed permanently: {}", e);
                    self.close();
                    return Err(e.into());
                }
                Some(Err(e)) if e.is_expired() => {
                    info!("watch checkpoint expired: {}", e);
                    self.restart(RestartReason::Expired);
                }
                Some(Err(e)) => {
                    warn!("watch stream failed: {}", e);
                    self.restart(RestartReason::StreamError);
                }
            }
        }
        Ok(())
    }

    fn on_watch_event(
        &mut self,
        event: WatchEvent,
    ) {
        match event {
            WatchEvent::Added(obj) => {
                self.advance(obj.generation);
                self.known.insert(obj.key.clone());
                self.pending.push_back(ChangeNotification::Added(obj));
            }
            WatchEvent::Modified(obj) => {
                self.advance(obj.generation);
                self.known.insert(obj.key.clone());
                self.pending.push_back(ChangeNotification::Updated(obj));
            }
            WatchEvent::Deleted(obj) => {
                self.advance(obj.generation);
                self.known.remove(&obj.key);
                self.pending.push_back(ChangeNotification::Deleted(obj.key));
            }
            WatchEvent::Bookmark(checkpoint) => {
                debug!(checkpoint = %checkpoint, "bookmark");
                self.checkpoint = Some(checkpoint);
            }
            WatchEvent::Expired => self.restart(RestartReason::Expired),
            WatchEvent::Malformed(reason) => {
                warn!("skipping malformed source object: {}", reason);
            }
        }
    }

    fn advance(
        &mut self,
        generation: u64,
    ) {
        self.checkpoint = Some(generation.to_string());
    }

    /// Drops the current session; the next call relists.
    fn restart(
        &mut self,
        reason: RestartReason,
    ) {
        info!(?reason, "watch session ended, resyncing");
        self.close();
        self.checkpoint = None;
    }

    fn close(&mut self) {
        // Dropping the stream closes the underlying connection
        self.stream = None;
        self.watch_deadline = None;
    }
}

fn flatten(
    operation: &'static str,
    e: RetryError<SourceError>,
) -> SourceError {
    match e {
        RetryError::Exhausted { attempts, last } => SourceError::RetryExhausted {
            operation,
            attempts,
            last: last.to_string(),
        },
        RetryError::Aborted(e) => e,
        RetryError::Cancelled { .. } => SourceError::Cancelled,
    }
}
