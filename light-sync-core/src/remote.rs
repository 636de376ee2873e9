//! # remote: interface to the server holding the synchronised content
//!
//! The sync engine only needs two operations from the server: the current
//! id→content map for a kind, and an idempotent create-or-replace of a single
//! id. [`RemoteSink`] captures exactly that; [`Authenticator`] covers the
//! login that yields the bearer [`Token`] the real client attaches to every
//! subsequent call.
//!
//! Both traits are annotated for `mockall` so the engine and the CLI can be
//! tested without a server. [`InMemorySink`] is a stateful stand-in for tests
//! that need the server to remember earlier writes.

use std::collections::HashMap;
use std::fmt;

use async_trait::async_trait;
#[cfg(any(test, feature = "test-export-mocks"))]
use mockall::automock;

use crate::artifact::ArtifactKind;
use crate::error::SinkError;

/// Remote snapshot of id→content, used only for change detection.
pub type ContentMap = HashMap<String, String>;

/// Opaque bearer credential returned by login. Never printed.
#[derive(Clone, PartialEq, Eq)]
pub struct Token(String);

impl Token {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Token(***)")
    }
}

#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait Authenticator: Send + Sync {
    /// Sign in once for the run. There is no refresh.
    async fn login(
        &self,
        user: &str,
        password: &str,
        client_id: &str,
    ) -> Result<Token, SinkError>;
}

/// The server side of a sync run.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait RemoteSink: Send + Sync {
    /// Fetch the current id→content map for `kind`.
    async fn fetch_content_map(&self, kind: ArtifactKind) -> Result<ContentMap, SinkError>;

    /// Create or fully replace the content stored under `id`.
    ///
    /// Must be idempotent: repeating a call with the same arguments leaves
    /// the server in the same state.
    async fn upsert(
        &self,
        kind: ArtifactKind,
        id: &str,
        content: &str,
    ) -> Result<(), SinkError>;
}

/// A [`RemoteSink`] backed by in-process maps. Upserts are visible to later
/// fetches, which makes it suitable for multi-run tests.
#[cfg(any(test, feature = "test-export-mocks"))]
#[derive(Debug, Default)]
pub struct InMemorySink {
    maps: std::sync::Mutex<HashMap<ArtifactKind, ContentMap>>,
    upserts: std::sync::Mutex<Vec<(ArtifactKind, String)>>,
}

#[cfg(any(test, feature = "test-export-mocks"))]
impl InMemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_map(kind: ArtifactKind, map: ContentMap) -> Self {
        let sink = Self::default();
        sink.lock_maps().insert(kind, map);
        sink
    }

    /// Every upsert received so far, in call order.
    pub fn upserts(&self) -> Vec<(ArtifactKind, String)> {
        self.upserts
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn content(&self, kind: ArtifactKind, id: &str) -> Option<String> {
        self.lock_maps().get(&kind).and_then(|m| m.get(id).cloned())
    }

    fn lock_maps(&self) -> std::sync::MutexGuard<'_, HashMap<ArtifactKind, ContentMap>> {
        self.maps
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(any(test, feature = "test-export-mocks"))]
#[async_trait]
impl RemoteSink for InMemorySink {
    async fn fetch_content_map(&self, kind: ArtifactKind) -> Result<ContentMap, SinkError> {
        Ok(self.lock_maps().get(&kind).cloned().unwrap_or_default())
    }

    async fn upsert(
        &self,
        kind: ArtifactKind,
        id: &str,
        content: &str,
    ) -> Result<(), SinkError> {
        self.lock_maps()
            .entry(kind)
            .or_default()
            .insert(id.to_string(), content.to_string());
        self.upserts
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push((kind, id.to_string()));
        Ok(())
    }
}
