use std::collections::HashMap;
use std::sync::Arc;

use tracing::trace;

use crate::ChangeNotification;
use crate::DeletePolicy;
use crate::EventKind;
use crate::ObjectKey;
use crate::SourceObject;

/// Last observed copy of one object
#[derive(Debug, Clone)]
pub struct MirrorEntry {
    pub object: Arc<SourceObject>,
    pub generation: u64,
}

/// Outcome of reconciling one notification
#[derive(Debug, Clone, PartialEq)]
pub enum Reconciled {
    /// Duplicate, stale, or a deletion that is not relayed
    Suppressed,
    Changed {
        kind: EventKind,
        object: Arc<SourceObject>,
    },
}

/// Keyed mirror owned by the engine's watch loop.
///
/// Not shared: the loop is the only writer, so there is no locking.
#[derive(Debug, Default)]
pub struct MirrorCache {
    entries: HashMap<ObjectKey, MirrorEntry>,
    delete_policy: DeletePolicy,
}

impl MirrorCache {
    pub fn new(delete_policy: DeletePolicy) -> Self {
        Self {
            entries: HashMap::new(),
            delete_policy,
        }
    }

    pub fn reconcile(
        &mut self,
        notification: ChangeNotification,
    ) -> Reconciled {
        match notification {
            ChangeNotification::Added(object) | ChangeNotification::Updated(object) => self.upsert(object),
            ChangeNotification::Deleted(key) => self.remove(&key),
        }
    }

    fn upsert(
        &mut self,
        object: SourceObject,
    ) -> Reconciled {
        let kind = match self.entries.get(&object.key) {
            None => EventKind::Created,
            Some(entry) if entry.generation < object.generation => EventKind::Updated,
            Some(entry) => {
                trace!(
                    key = %object.key,
                    mirrored = entry.generation,
                    incoming = object.generation,
                    "suppressed stale or duplicate notification"
                );
                return Reconciled::Suppressed;
            }
        };

        let object = Arc::new(object);
        self.entries.insert(
            object.key.clone(),
            MirrorEntry {
                object: object.clone(),
                generation: object.generation,
            },
        );
        Reconciled::Changed { kind, object }
    }

    fn remove(
        &mut self,
        key: &ObjectKey,
    ) -> Reconciled {
        let removed = self.entries.remove(key);
        match (self.delete_policy, removed) {
            (DeletePolicy::Tombstone, Some(entry)) => Reconciled::Changed {
                kind: EventKind::Deleted,
                object: entry.object,
            },
            _ => Reconciled::Suppressed,
        }
    }

    pub fn get(
        &self,
        key: &ObjectKey,
    ) -> Option<&MirrorEntry> {
        self.entries.get(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
