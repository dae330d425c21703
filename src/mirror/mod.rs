//! In-memory mirror of the last observed state of every source object.
//!
//! The mirror is the only de-duplication point of the engine: a notification
//! turns into an event only when its generation is strictly newer than the
//! mirrored one. Resync replays therefore vanish here.
mod mirror_cache;
pub use mirror_cache::*;
