//! Scripted collaborators for unit tests.
//!
//! [`MockSource`] replays a script of list and watch responses, and
//! [`RecordingSink`] records every event it receives while failing on demand.
//! Interaction counting that needs exact expectations uses the mockall
//! generated `MockSink` / `MockSourceClient` instead.
mod mock_sink;
mod mock_source;

pub use mock_sink::*;
pub use mock_source::*;
