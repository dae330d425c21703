//! Watch-and-relay engine for CI/CD release records.
//!
//! A [`ChangeSourceAdapter`] follows a list/watch [`SourceClient`], the
//! [`MirrorCache`] decides which notifications are real changes, the
//! translator turns them into [`DomainEvent`]s and the [`SinkDispatcher`]
//! fans them out to every registered [`Sink`]. [`Engine`] wires it together.
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use release_relay::{DeliveryPolicy, Engine, KubeClient, LogSink, RelayConfig, RunMode, SinkRegistration};
//!
//! # async fn run() -> release_relay::Result<()> {
//! let config = RelayConfig::new()?.validate()?;
//! let client = Arc::new(KubeClient::new(&config.source)?);
//! let sinks = vec![SinkRegistration::new(
//!     "log",
//!     Arc::new(LogSink::default()),
//!     DeliveryPolicy::from_config(&config),
//! )];
//!
//! let engine = Engine::new(config, client, sinks);
//! let handle = engine.handle();
//! tokio::spawn(async move {
//!     let _ = tokio::signal::ctrl_c().await;
//!     handle.stop();
//! });
//! engine.run(RunMode::Watch).await?;
//! # Ok(())
//! # }
//! ```
mod config;
mod engine;
mod errors;
mod mirror;
mod sink;
mod source;
mod translate;
pub(crate) mod utils;

pub use self::config::*;
pub use engine::*;
pub use errors::*;
pub use mirror::*;
pub use sink::*;
pub use source::*;
pub use translate::*;

//-----------------------------------------------------------
// Test utils

#[cfg(test)]
pub mod test_utils;
