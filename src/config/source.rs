use std::fmt::Debug;
use std::path::PathBuf;
use std::time::Duration;

use config::ConfigError;
use serde::Deserialize;
use serde::Serialize;

use crate::Error;
use crate::Result;

/// Remote list/watch source parameters
///
/// The resource path is assembled as
/// `{api_server}/apis/{group}/{version}/namespaces/{namespace}/{resource}`.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SourceConfig {
    /// Base URL of the API server, e.g. `https://kubernetes.default.svc`
    #[serde(default = "default_api_server")]
    pub api_server: String,

    /// Namespace whose releases are watched
    #[serde(default = "default_namespace")]
    pub namespace: String,

    /// API group of the watched resource
    #[serde(default = "default_group")]
    pub group: String,

    /// API version of the watched resource
    #[serde(default = "default_version")]
    pub version: String,

    /// Plural resource name
    #[serde(default = "default_resource")]
    pub resource: String,

    /// File holding a bearer token (service account token when running in cluster)
    #[serde(default)]
    pub token_path: Option<PathBuf>,

    /// Server side watch timeout requested per watch call (unit: seconds)
    #[serde(default = "default_watch_timeout_secs")]
    pub watch_timeout_secs: u64,

    /// Upper bound on the lifetime of one watch session before a forced
    /// relist (unit: seconds)
    #[serde(default = "default_max_watch_duration_secs")]
    pub max_watch_duration_secs: u64,

    /// Connect timeout for the HTTP client (unit: milliseconds)
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            api_server: default_api_server(),
            namespace: default_namespace(),
            group: default_group(),
            version: default_version(),
            resource: default_resource(),
            token_path: None,
            watch_timeout_secs: default_watch_timeout_secs(),
            max_watch_duration_secs: default_max_watch_duration_secs(),
            connect_timeout_ms: default_connect_timeout_ms(),
        }
    }
}

impl SourceConfig {
    pub fn max_watch_duration(&self) -> Duration {
        Duration::from_secs(self.max_watch_duration_secs)
    }

    pub fn resource_path(&self) -> String {
        format!(
            "{}/apis/{}/{}/namespaces/{}/{}",
            self.api_server.trim_end_matches('/'),
            self.group,
            self.version,
            self.namespace,
            self.resource
        )
    }

    pub fn validate(&self) -> Result<()> {
        if self.api_server.is_empty() {
            return Err(Error::Config(ConfigError::Message(
                "source.api_server cannot be empty".into(),
            )));
        }

        if self.namespace.is_empty() {
            return Err(Error::Config(ConfigError::Message(
                "source.namespace cannot be empty".into(),
            )));
        }

        if self.resource.is_empty() || self.group.is_empty() || self.version.is_empty() {
            return Err(Error::Config(ConfigError::Message(
                "source.group, source.version and source.resource are required".into(),
            )));
        }

        if self.watch_timeout_secs == 0 {
            return Err(Error::Config(ConfigError::Message(
                "source.watch_timeout_secs must be greater than 0".into(),
            )));
        }

        if self.max_watch_duration_secs < self.watch_timeout_secs {
            return Err(Error::Config(ConfigError::Message(format!(
                "source.max_watch_duration_secs ({}) is shorter than source.watch_timeout_secs ({})",
                self.max_watch_duration_secs, self.watch_timeout_secs
            ))));
        }

        Ok(())
    }
}

fn default_api_server() -> String {
    "https://kubernetes.default.svc".to_string()
}
fn default_namespace() -> String {
    "jx".to_string()
}
fn default_group() -> String {
    "jenkins.io".to_string()
}
fn default_version() -> String {
    "v1".to_string()
}
fn default_resource() -> String {
    "releases".to_string()
}
fn default_watch_timeout_secs() -> u64 {
    300
}
// 24 hours: forces a periodic relist to bound drift
fn default_max_watch_duration_secs() -> u64 {
    86_400
}
fn default_connect_timeout_ms() -> u64 {
    5_000
}
