//! Engine driver: wires the change source, the mirror, the translator and the
//! sink dispatcher into one cancellable run loop.
//!
//! ```text
//!   Idle ──run()──► Running ──stop()──► Stopping ──drained──► Stopped
//!                      │
//!                      └── unrecoverable source failure ──► Failed
//! ```
mod driver;
mod handle;
pub use driver::*;
pub use handle::*;
