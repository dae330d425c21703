use serde_json::json;
use serde_json::Value;

use crate::translate;
use crate::DomainEvent;
use crate::EventKind;
use crate::ObjectKey;
use crate::SourceObject;

pub const TEST_NAMESPACE: &str = "jx";

static LOGGER_INIT: once_cell::sync::Lazy<()> = once_cell::sync::Lazy::new(|| {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
});

pub fn enable_logger() {
    *LOGGER_INIT;
    println!("setup logger for unit test.");
}

/// Raw release object as a Kubernetes-style API would return it
pub fn release_json(
    name: &str,
    resource_version: u64,
) -> Value {
    json!({
        "apiVersion": "jenkins.io/v1",
        "kind": "Release",
        "metadata": {
            "name": name,
            "namespace": TEST_NAMESPACE,
            "resourceVersion": resource_version.to_string(),
            "creationTimestamp": "2026-01-02T03:04:05Z",
        },
        "spec": {
            "name": format!("app-{name}"),
            "version": format!("1.0.{resource_version}"),
            "gitHttpUrl": format!("https://github.com/acme/app-{name}"),
            "gitOwner": "acme",
            "gitRepository": format!("app-{name}"),
            "releaseNotesURL": format!("https://github.com/acme/app-{name}/releases/tag/v1.0.{resource_version}"),
            "commits": [
                { "sha": "a1", "message": "fix" },
                { "sha": "b2", "message": "feat" },
            ],
            "issues": [ { "id": "7" } ],
            "pullRequests": [],
        },
    })
}

pub fn release(
    name: &str,
    generation: u64,
) -> SourceObject {
    SourceObject::from_json(release_json(name, generation)).expect("fixture must be classifiable")
}

pub fn key(name: &str) -> ObjectKey {
    ObjectKey::new(TEST_NAMESPACE, name)
}

/// Created event for the `release(name, generation)` fixture
pub fn release_event(
    name: &str,
    generation: u64,
) -> DomainEvent {
    translate(EventKind::Created, &release(name, generation)).expect("fixture must translate")
}
