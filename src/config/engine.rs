use serde::Deserialize;
use serde::Serialize;

/// What the engine does when the source reports a deletion
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum DeletePolicy {
    /// Forget the mirrored object, relay nothing
    #[default]
    Ignore,
    /// Relay a `Deleted` event carrying the last known state
    Tombstone,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct EngineConfig {
    #[serde(default)]
    pub delete_policy: DeletePolicy,
}
