//! Maps source objects onto the narrow event shape sinks consume, so sink
//! code never depends on the source's native schema.
mod translator;
pub use translator::*;
