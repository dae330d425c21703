use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

use crate::ObjectKey;
use crate::SourceObject;
use crate::TranslateError;

/// What happened to the release
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Created,
    Updated,
    /// Only produced under the tombstone delete policy
    Deleted,
}

/// Normalized release fields
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseInfo {
    pub application: String,
    pub version: String,
    pub git_http_url: Option<String>,
    pub git_owner: Option<String>,
    pub git_repository: Option<String>,
    pub release_notes_url: Option<String>,
    pub commit_count: usize,
    pub issue_count: usize,
    pub pull_request_count: usize,
    pub created_at: Option<String>,
}

/// Sink-facing event. Immutable once built and shared between sinks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainEvent {
    pub kind: EventKind,
    pub key: ObjectKey,
    /// Generation of the source object the event was built from; sinks can
    /// deduplicate redeliveries on `(key, generation)`
    pub generation: u64,
    pub release: ReleaseInfo,
}

/// Builds the domain event for `object`. Fails only when a required field
/// (`spec.name`, `spec.version`) is missing.
pub fn translate(
    kind: EventKind,
    object: &SourceObject,
) -> Result<DomainEvent, TranslateError> {
    let payload = &object.payload;
    let spec = payload.get("spec").unwrap_or(&Value::Null);

    let required = |field: &'static str| {
        str_field(spec, field).ok_or_else(|| TranslateError::MissingField {
            key: object.key.clone(),
            field,
        })
    };

    let release = ReleaseInfo {
        application: required("name")?,
        version: required("version")?,
        git_http_url: str_field(spec, "gitHttpUrl"),
        git_owner: str_field(spec, "gitOwner"),
        git_repository: str_field(spec, "gitRepository"),
        release_notes_url: str_field(spec, "releaseNotesURL"),
        commit_count: array_len(spec, "commits"),
        issue_count: array_len(spec, "issues"),
        pull_request_count: array_len(spec, "pullRequests"),
        created_at: payload
            .pointer("/metadata/creationTimestamp")
            .and_then(Value::as_str)
            .map(str::to_string),
    };

    Ok(DomainEvent {
        kind,
        key: object.key.clone(),
        generation: object.generation,
        release,
    })
}

fn str_field(
    value: &Value,
    field: &str,
) -> Option<String> {
    value
        .get(field)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn array_len(
    value: &Value,
    field: &str,
) -> usize {
    value.get(field).and_then(Value::as_array).map(Vec::len).unwrap_or(0)
}
