//! Change source: the remote list/watch collaborator and the adapter that
//! turns it into an endless, restartable sequence of [`ChangeNotification`]s.
//!
//! ```text
//! SourceClient::list()  ──► Added × N (sorted by key) ─┐
//!                                                      ├──► ChangeNotification
//! SourceClient::watch() ──► Added/Updated/Deleted ─────┘
//!        ▲                        │ stream ends / expires / max duration
//!        └──── relist + rewatch ◄─┘
//! ```
mod adapter;
mod kube_client;
pub use adapter::*;
pub use kube_client::*;


use std::fmt;

use async_trait::async_trait;
use futures::stream::BoxStream;
#[cfg(test)]
use mockall::automock;
use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

use crate::SourceError;
use crate::TranslateError;

/// Stable identity of a source object
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ObjectKey {
    pub namespace: String,
    pub name: String,
}

impl ObjectKey {
    pub fn new(
        namespace: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// Read-only copy of a record owned by the source
#[derive(Debug, Clone, PartialEq)]
pub struct SourceObject {
    pub key: ObjectKey,
    /// Resource version of this copy; strictly increases with every change
    pub generation: u64,
    /// Raw object as returned by the source
    pub payload: Value,
}

impl SourceObject {
    /// Classifies a raw object. Fails when the identity or the generation
    /// marker cannot be read.
    pub fn from_json(payload: Value) -> std::result::Result<Self, TranslateError> {
        let metadata = payload.get("metadata").ok_or_else(|| unclassifiable("no metadata"))?;

        let name = metadata
            .get("name")
            .and_then(Value::as_str)
            .filter(|n| !n.is_empty())
            .ok_or_else(|| unclassifiable("metadata.name missing"))?;
        let namespace = metadata.get("namespace").and_then(Value::as_str).unwrap_or_default();

        let generation = match metadata.get("resourceVersion") {
            Some(Value::String(rv)) => rv.parse::<u64>().ok(),
            Some(Value::Number(rv)) => rv.as_u64(),
            _ => None,
        }
        .ok_or_else(|| unclassifiable(format!("{namespace}/{name}: unusable metadata.resourceVersion")))?;

        Ok(Self {
            key: ObjectKey::new(namespace, name),
            generation,
            payload,
        })
    }
}

fn unclassifiable(reason: impl Into<String>) -> TranslateError {
    TranslateError::Unclassifiable {
        reason: reason.into(),
    }
}

/// Uniform change notification handed to the mirror
#[derive(Debug, Clone, PartialEq)]
pub enum ChangeNotification {
    Added(SourceObject),
    Updated(SourceObject),
    Deleted(ObjectKey),
}

impl ChangeNotification {
    pub fn key(&self) -> &ObjectKey {
        match self {
            ChangeNotification::Added(obj) | ChangeNotification::Updated(obj) => &obj.key,
            ChangeNotification::Deleted(key) => key,
        }
    }
}

/// Result of a full listing
#[derive(Debug, Clone, Default)]
pub struct Listing {
    pub objects: Vec<SourceObject>,
    /// Resume point for the incremental watch
    pub checkpoint: String,
}

/// Raw event read from an open watch
#[derive(Debug, Clone, PartialEq)]
pub enum WatchEvent {
    Added(SourceObject),
    Modified(SourceObject),
    Deleted(SourceObject),
    /// Progress marker without an object change
    Bookmark(String),
    /// The checkpoint is too old; a relist is required
    Expired,
    /// An event that could not be classified
    Malformed(String),
}

pub type WatchStream = BoxStream<'static, std::result::Result<WatchEvent, SourceError>>;

/// Remote list/watch API.
///
/// Dropping a [`WatchStream`] must cancel the underlying watch.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait SourceClient: Send + Sync + 'static {
    /// Lists every current object together with a resume checkpoint.
    async fn list(&self) -> std::result::Result<Listing, SourceError>;

    /// Opens an incremental watch starting after `checkpoint`.
    async fn watch(
        &self,
        checkpoint: &str,
    ) -> std::result::Result<WatchStream, SourceError>;
}
