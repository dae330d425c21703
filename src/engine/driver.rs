use std::sync::Arc;

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::error;
use tracing::info;
use tracing::warn;

use super::EngineHandle;
use super::EngineState;
use crate::translate;
use crate::ChangeNotification;
use crate::ChangeSourceAdapter;
use crate::MirrorCache;
use crate::Reconciled;
use crate::RelayConfig;
use crate::Result;
use crate::SinkDispatcher;
use crate::SinkRegistration;
use crate::SinkStats;
use crate::SourceClient;

/// How long the engine follows the source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunMode {
    /// List, then watch until stopped
    #[default]
    Watch,
    /// List once, relay the result, then stop
    Once,
}

/// Summary of one engine run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EngineReport {
    /// Notifications received from the source
    pub notifications: u64,
    /// Events handed to the dispatcher
    pub relayed: u64,
    /// Notifications the mirror recognised as duplicate or stale
    pub suppressed: u64,
    /// Changed objects that could not be translated
    pub skipped: u64,
    pub sinks: Vec<SinkStats>,
}

/// Watch-and-relay engine.
///
/// One value performs exactly one run: [`run`](Self::run) consumes it, so a
/// `Failed` engine cannot be restarted.
pub struct Engine<C>
where C: SourceClient
{
    config: RelayConfig,
    client: Arc<C>,
    sinks: Vec<SinkRegistration>,

    cancel: CancellationToken,
    state_tx: watch::Sender<EngineState>,
    state_rx: watch::Receiver<EngineState>,
}

impl<C> Engine<C>
where C: SourceClient
{
    /// `config` is expected to be validated already.
    pub fn new(
        config: RelayConfig,
        client: Arc<C>,
        sinks: Vec<SinkRegistration>,
    ) -> Self {
        let (state_tx, state_rx) = watch::channel(EngineState::Idle);
        Self {
            config,
            client,
            sinks,
            cancel: CancellationToken::new(),
            state_tx,
            state_rx,
        }
    }

    pub fn handle(&self) -> EngineHandle {
        EngineHandle {
            cancel: self.cancel.clone(),
            state_rx: self.state_rx.clone(),
        }
    }

    pub fn state(&self) -> EngineState {
        *self.state_rx.borrow()
    }

    fn set_state(
        &self,
        state: EngineState,
    ) {
        debug!(?state, "engine state");
        self.state_tx.send_replace(state);
    }

    /// Runs until stopped (watch mode), until the single listing is relayed
    /// (once mode), or until the source fails unrecoverably.
    ///
    /// Pending deliveries get `dispatch.shutdown_grace_ms` to drain before
    /// this returns, in every case.
    pub async fn run(
        self,
        mode: RunMode,
    ) -> Result<EngineReport> {
        self.set_state(EngineState::Running);
        info!(
            ?mode,
            namespace = %self.config.source.namespace,
            resource = %self.config.source.resource,
            sinks = self.sinks.len(),
            "Engine started"
        );

        let dispatcher = SinkDispatcher::start(self.sinks.clone());
        let mut relay = Relay {
            mirror: MirrorCache::new(self.config.engine.delete_policy),
            dispatcher: &dispatcher,
            report: EngineReport::default(),
        };
        let mut adapter = ChangeSourceAdapter::new(
            self.client.clone(),
            self.config.retry.list,
            self.config.retry.watch,
            self.config.source.max_watch_duration(),
            self.cancel.clone(),
        );

        let outcome = match mode {
            RunMode::Watch => Self::watch_loop(&mut adapter, &mut relay).await,
            RunMode::Once => Self::relay_once(&mut adapter, &mut relay).await,
        };
        let mut report = relay.report;
        // Dropping the adapter closes the watch before draining sinks
        drop(adapter);

        if outcome.is_ok() {
            self.set_state(EngineState::Stopping);
        }
        report.sinks = dispatcher.shutdown(self.config.dispatch.shutdown_grace()).await;

        match outcome {
            Ok(()) => {
                self.set_state(EngineState::Stopped);
                info!(
                    notifications = report.notifications,
                    relayed = report.relayed,
                    suppressed = report.suppressed,
                    skipped = report.skipped,
                    "Engine stopped"
                );
                Ok(report)
            }
            Err(e) => {
                self.set_state(EngineState::Failed);
                error!("Engine failed: {}", e);
                Err(e)
            }
        }
    }

    async fn watch_loop(
        adapter: &mut ChangeSourceAdapter<C>,
        relay: &mut Relay<'_>,
    ) -> Result<()> {
        while let Some(notification) = adapter.next().await? {
            relay.handle(notification);
        }
        Ok(())
    }

    async fn relay_once(
        adapter: &mut ChangeSourceAdapter<C>,
        relay: &mut Relay<'_>,
    ) -> Result<()> {
        if let Some(notifications) = adapter.list_once().await? {
            for notification in notifications {
                relay.handle(notification);
            }
        }
        Ok(())
    }
}

/// Per-run state of the watch loop
struct Relay<'a> {
    mirror: MirrorCache,
    dispatcher: &'a SinkDispatcher,
    report: EngineReport,
}

impl Relay<'_> {
    fn handle(
        &mut self,
        notification: ChangeNotification,
    ) {
        self.report.notifications += 1;
        let key = notification.key().clone();

        match self.mirror.reconcile(notification) {
            Reconciled::Suppressed => {
                self.report.suppressed += 1;
            }
            Reconciled::Changed { kind, object } => match translate(kind, &object) {
                Ok(event) => {
                    debug!(?kind, %key, generation = event.generation, "relaying");
                    self.dispatcher.deliver(event);
                    self.report.relayed += 1;
                }
                Err(e) => {
                    warn!("skipping malformed source object {}: {}", key, e);
                    self.report.skipped += 1;
                }
            },
        }
    }
}
