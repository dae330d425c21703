use async_trait::async_trait;
use tracing::info;

use super::Sink;
use crate::DomainEvent;
use crate::SinkError;

/// Writes every event as one structured `info` record.
///
/// Default sink of the `report` command; useful to see what a real backend
/// would receive.
#[derive(Debug, Clone, Default)]
pub struct LogSink {
    /// Include the full event as JSON in the record
    verbose: bool,
}

impl LogSink {
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }
}

#[async_trait]
impl Sink for LogSink {
    async fn send_event(
        &self,
        event: &DomainEvent,
    ) -> Result<(), SinkError> {
        if self.verbose {
            let payload = serde_json::to_string(event).map_err(|e| SinkError::Rejected(e.to_string()))?;
            info!(kind = ?event.kind, key = %event.key, generation = event.generation, %payload, "release event");
        } else {
            info!(
                kind = ?event.kind,
                key = %event.key,
                generation = event.generation,
                application = %event.release.application,
                version = %event.release.version,
                "release event"
            );
        }
        Ok(())
    }
}
