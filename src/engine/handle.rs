use serde::Serialize;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::Error;
use crate::Result;

/// Lifecycle of an [`Engine`](crate::Engine)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineState {
    Idle,
    Running,
    /// Stop requested; pending deliveries are draining
    Stopping,
    Stopped,
    /// Terminal: the source failed unrecoverably
    Failed,
}

impl EngineState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, EngineState::Stopped | EngineState::Failed)
    }
}

/// Cloneable remote control for a running engine
#[derive(Debug, Clone)]
pub struct EngineHandle {
    pub(crate) cancel: CancellationToken,
    pub(crate) state_rx: watch::Receiver<EngineState>,
}

impl EngineHandle {
    /// Requests a graceful stop. Idempotent; also valid before `run`.
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    pub fn state(&self) -> EngineState {
        *self.state_rx.borrow()
    }

    /// Raw state channel for callers that want to observe every transition
    pub fn subscribe(&self) -> watch::Receiver<EngineState> {
        self.state_rx.clone()
    }

    /// Waits until the engine reaches `state`, or a terminal state.
    pub async fn wait_for(
        &mut self,
        state: EngineState,
    ) -> Result<EngineState> {
        let reached = self
            .state_rx
            .wait_for(|s| *s == state || s.is_terminal())
            .await
            .map_err(|_| Error::Fatal("engine dropped before reaching the requested state".into()))?;
        Ok(*reached)
    }
}
