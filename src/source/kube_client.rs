use std::pin::Pin;
use std::time::Duration;

use async_trait::async_trait;
use futures::Stream;
use futures::StreamExt;
use reqwest::header;
use reqwest::StatusCode;
use serde_json::Value;
use tracing::debug;
use tracing::warn;

use super::Listing;
use super::SourceClient;
use super::SourceObject;
use super::WatchEvent;
use super::WatchStream;
use crate::Error;
use crate::Result;
use crate::SourceConfig;
use crate::SourceError;
use crate::SystemError;

/// HTTP 410: the requested resource version is no longer available
const STATUS_GONE: u64 = 410;
/// Longest watch line accepted before the stream is treated as corrupt
const MAX_WATCH_LINE_BYTES: usize = 8 * 1024 * 1024;

/// List/watch client for a Kubernetes-style REST API
pub struct KubeClient {
    http: reqwest::Client,
    pub(crate) resource_url: String,
    watch_timeout_secs: u64,
    pub(crate) token: Option<String>,
}

impl KubeClient {
    pub fn new(config: &SourceConfig) -> Result<Self> {
        let token = match &config.token_path {
            Some(path) => {
                let raw = std::fs::read_to_string(path).map_err(SystemError::Io)?;
                Some(raw.trim().to_string())
            }
            None => None,
        };

        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_millis(config.connect_timeout_ms))
            .build()
            .map_err(|e| Error::Source(SourceError::Http(e)))?;

        Ok(Self {
            http,
            resource_url: config.resource_path(),
            watch_timeout_secs: config.watch_timeout_secs,
            token,
        })
    }

    fn get(
        &self,
        query: &[(&str, String)],
    ) -> reqwest::RequestBuilder {
        let mut request = self
            .http
            .get(&self.resource_url)
            .header(header::ACCEPT, "application/json")
            .query(query);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }
        request
    }
}

#[async_trait]
impl SourceClient for KubeClient {
    async fn list(&self) -> std::result::Result<Listing, SourceError> {
        let response = check_status(self.get(&[]).send().await?).await?;
        let body: Value = response
            .json()
            .await
            .map_err(|e| SourceError::Decode(e.to_string()))?;
        parse_listing(body)
    }

    async fn watch(
        &self,
        checkpoint: &str,
    ) -> std::result::Result<WatchStream, SourceError> {
        let query = [
            ("watch", "1".to_string()),
            ("resourceVersion", checkpoint.to_string()),
            ("timeoutSeconds", self.watch_timeout_secs.to_string()),
            ("allowWatchBookmarks", "true".to_string()),
        ];
        let response = check_status(self.get(&query).send().await?).await?;
        debug!(checkpoint, "watch stream established");

        Ok(decode_watch_lines(response.bytes_stream()))
    }
}

async fn check_status(response: reqwest::Response) -> std::result::Result<reqwest::Response, SourceError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return Err(SourceError::Unauthorized { code: status.as_u16() });
    }
    let body = response.text().await.unwrap_or_default();
    Err(SourceError::Status {
        code: status.as_u16(),
        body,
    })
}

/// Reads a list response: `{ metadata: { resourceVersion }, items: [...] }`.
/// Items that cannot be classified are skipped.
pub(crate) fn parse_listing(body: Value) -> std::result::Result<Listing, SourceError> {
    let checkpoint = body
        .pointer("/metadata/resourceVersion")
        .and_then(Value::as_str)
        .ok_or_else(|| SourceError::Decode("list response without metadata.resourceVersion".into()))?
        .to_string();

    let items = match body.get("items") {
        Some(Value::Array(items)) => items.clone(),
        Some(Value::Null) | None => Vec::new(),
        Some(_) => return Err(SourceError::Decode("list response items is not an array".into())),
    };

    let mut objects = Vec::with_capacity(items.len());
    for item in items {
        match SourceObject::from_json(item) {
            Ok(obj) => objects.push(obj),
            Err(e) => warn!("skipping listed object: {}", e),
        }
    }

    Ok(Listing { objects, checkpoint })
}

/// Decodes one line of a watch response: `{ "type": ..., "object": {...} }`.
pub(crate) fn parse_watch_line(line: &[u8]) -> std::result::Result<WatchEvent, SourceError> {
    let raw: Value = serde_json::from_slice(line).map_err(|e| SourceError::Decode(e.to_string()))?;
    let kind = raw.get("type").and_then(Value::as_str).unwrap_or_default().to_string();
    let object = raw.get("object").cloned().unwrap_or(Value::Null);

    let classify = |object: Value| SourceObject::from_json(object).map_err(|e| e.to_string());

    let event = match kind.as_str() {
        "ADDED" => classify(object).map_or_else(WatchEvent::Malformed, WatchEvent::Added),
        "MODIFIED" => classify(object).map_or_else(WatchEvent::Malformed, WatchEvent::Modified),
        "DELETED" => classify(object).map_or_else(WatchEvent::Malformed, WatchEvent::Deleted),
        "BOOKMARK" => match object.pointer("/metadata/resourceVersion").and_then(Value::as_str) {
            Some(rv) => WatchEvent::Bookmark(rv.to_string()),
            None => WatchEvent::Malformed("bookmark without resourceVersion".into()),
        },
        "ERROR" => {
            let code = object.get("code").and_then(Value::as_u64).unwrap_or_default();
            if code == STATUS_GONE {
                WatchEvent::Expired
            } else {
                let message = object
                    .get("message")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string();
                return Err(SourceError::Status {
                    code: u16::try_from(code).unwrap_or_default(),
                    body: message,
                });
            }
        }
        other => WatchEvent::Malformed(format!("unknown watch event type `{other}`")),
    };
    Ok(event)
}

struct LineState<S> {
    body: Pin<Box<S>>,
    buf: Vec<u8>,
    done: bool,
}

/// Splits a chunked body into newline-delimited watch events.
pub(crate) fn decode_watch_lines<S, B, E>(body: S) -> WatchStream
where
    S: Stream<Item = std::result::Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: Into<SourceError> + Send + 'static,
{
    decode_bounded_watch_lines(body, MAX_WATCH_LINE_BYTES)
}

/// Like [`decode_watch_lines`], failing with [`SourceError::Decode`] once a
/// single line grows past `max_line_bytes`.
pub(crate) fn decode_bounded_watch_lines<S, B, E>(
    body: S,
    max_line_bytes: usize,
) -> WatchStream
where
    S: Stream<Item = std::result::Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: Into<SourceError> + Send + 'static,
{
    let state = LineState {
        body: Box::pin(body),
        buf: Vec::new(),
        done: false,
    };

    futures::stream::unfold(state, move |mut state| async move {
        loop {
            if let Some(pos) = state.buf.iter().position(|b| *b == b'\n') {
                let line: Vec<u8> = state.buf.drain(..=pos).collect();
                let line = trim_line(&line);
                if line.is_empty() {
                    continue;
                }
                return Some((parse_watch_line(line), state));
            }

            if state.done {
                if state.buf.is_empty() {
                    return None;
                }
                let rest = std::mem::take(&mut state.buf);
                let line = trim_line(&rest);
                if line.is_empty() {
                    return None;
                }
                return Some((parse_watch_line(line), state));
            }

            if state.buf.len() > max_line_bytes {
                state.done = true;
                let len = std::mem::take(&mut state.buf).len();
                return Some((
                    Err(SourceError::Decode(format!(
                        "watch line exceeds {max_line_bytes} bytes ({len} buffered)"
                    ))),
                    state,
                ));
            }

            match state.body.next().await {
                Some(Ok(chunk)) => state.buf.extend_from_slice(chunk.as_ref()),
                Some(Err(e)) => {
                    state.done = true;
                    state.buf.clear();
                    return Some((Err(e.into()), state));
                }
                None => state.done = true,
            }
        }
    })
    .boxed()
}

fn trim_line(line: &[u8]) -> &[u8] {
    let mut end = line.len();
    while end > 0 && line[end - 1].is_ascii_whitespace() {
        end -= 1;
    }
    let mut start = 0;
    while start < end && line[start].is_ascii_whitespace() {
        start += 1;
    }
    &line[start..end]
}
